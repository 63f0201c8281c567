use super::metrics::LoadTestMetrics;
use super::mock_api::{self, MockBotApi};
use super::report::Report;
use super::updates::UpdateFactory;
use super::{Args, Scenario, Store};
use crate::config::from_env_or_panic;
use crate::db::{self, MemoryDb};
use crate::prelude::*;
use crate::referral::{ReferralCodec, ReferralService};
use crate::user::{self, Database, UpsertUser, UserId};
use crate::{tg, Result};
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;
use teloxide::requests::Requester;
use tokio::sync::Semaphore;

pub async fn run(args: Args) -> Result {
    let name = args.name();

    let db: Arc<dyn Database> = match args.store {
        Store::Memory => Arc::new(MemoryDb::default()),
        Store::Postgres => Arc::new(db::init(from_env_or_panic("DATABASE_")).await?),
    };

    let mock_api = MockBotApi::start().await?;
    let api_url = mock_api.url()?;

    let bot = tg::create_bot(mock_api::BOT_TOKEN.to_owned(), Some(api_url.clone()));
    let me = bot.get_me().await?;

    let codec = ReferralCodec::new(&args.referral_secret);
    let referral_code = match args.scenario {
        Scenario::StartReferral => Some(register_referrer(&*db, &codec, args.base_user_id).await?),
        Scenario::Start | Scenario::CallbackLanguage | Scenario::Referral => None,
    };

    let ctx = Arc::new(tg::Ctx {
        bot,
        db,
        cfg: Arc::new(tg::Config {
            bot_token: mock_api::BOT_TOKEN.to_owned(),
            admin_ids: vec![],
            api_url: Some(api_url),
        }),
        referrals: Arc::new(ReferralService::new(codec)),
        bot_username: tg::bot_username(&me)?,
    });

    let factory = UpdateFactory {
        scenario: args.scenario,
        user_pool_size: args.user_pool_size,
        base_user_id: args.base_user_id,
        referral_code,
    };

    let updates = (0..u64::from(args.total))
        .map(|i| factory.update(i))
        .collect::<Result<Vec<_>>>()?;

    println!(
        "\nStarting: {} updates, concurrency={}, handler={}\nTest: {name}",
        args.total,
        args.concurrency,
        args.scenario.as_str(),
    );

    let handler = Arc::new(tg::handler_schema());
    let semaphore = Arc::new(Semaphore::new(args.concurrency.max(1)));
    let metrics = Arc::new(Mutex::new(LoadTestMetrics::default()));

    let wall_start = Instant::now();

    let tasks = updates.into_iter().map(|update| {
        let handler = handler.clone();
        let semaphore = semaphore.clone();
        let metrics = metrics.clone();
        let deps = dptree::deps![ctx.clone(), me.clone(), update];

        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .fatal_ctx(|| "Load test semaphore was closed")?;

            let start = Instant::now();
            let result = handler.dispatch(deps).await;
            let latency = start.elapsed();

            let mut metrics = metrics.lock();
            match result {
                ControlFlow::Break(Ok(())) => metrics.record_success(latency),
                ControlFlow::Break(Err(err)) => {
                    warn!(err = %err.display_chain(), "Update processing failed");
                    metrics.record_error(latency, &*err);
                }
                ControlFlow::Continue(_) => {
                    let err = fatal!("No handler accepted the update");
                    metrics.record_error(latency, &err);
                }
            }

            Ok::<_, crate::Error>(())
        })
    });

    for task in futures::future::join_all(tasks).await {
        task.fatal_ctx(|| "Load test task panicked")??;
    }

    let wall_time = wall_start.elapsed();

    let metrics = metrics.lock();
    let report = Report {
        name: &name,
        scenario: args.scenario,
        concurrency: args.concurrency,
        wall_time,
        metrics: &metrics,
    };

    println!("\n{report}");

    let path = report.save(&args.reports_dir, chrono::Local::now())?;
    println!("\nReport saved: {}", path.display());

    Ok(())
}

/// The referrer must exist, otherwise every referral is rejected as unknown
async fn register_referrer(
    db: &dyn Database,
    codec: &ReferralCodec,
    raw_id: u64,
) -> Result<crate::referral::ReferralCode> {
    let id = UserId::try_new(raw_id)?;
    let input = UpsertUser {
        id,
        first_name: format!("LoadTestUser_{raw_id}"),
        last_name: None,
        username: None,
        bio: None,
        is_premium: false,
    };

    user::register(&mut *db.session(), input).await?;

    Ok(codec.encode(id))
}

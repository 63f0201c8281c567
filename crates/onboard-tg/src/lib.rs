mod api;
mod auth;
mod config;
mod db;
mod error;
mod i18n;
mod load_test;
mod observability;
mod referral;
mod tg;
mod user;
mod util;

pub use crate::error::*;
pub use config::*;
pub use load_test::Args as LoadTestArgs;
pub use observability::*;

use crate::auth::{InitDataValidator, TokenIssuer};
use crate::referral::{ReferralCodec, ReferralService};
use crate::user::Database;
use std::sync::Arc;
use teloxide::requests::Requester;

#[allow(unused_imports)]
mod prelude {
    pub(crate) use crate::error::prelude::*;
    pub(crate) use crate::observability::logging::prelude::*;
    pub(crate) use crate::util::prelude::*;
}

/// Telegram bot that onboards users and rewards them for inviting friends
#[derive(clap::Parser, Debug)]
#[clap(version)]
pub struct Cli {
    #[clap(subcommand)]
    pub cmd: Option<Cmd>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Cmd {
    /// Run the telegram bot together with the HTTP API (default)
    Run,

    LoadTest(LoadTestArgs),
}

/// Run the telegram bot processing loop and the HTTP API
pub async fn run(config: Config) -> Result {
    let Config {
        tg: tg_cfg,
        db: db_cfg,
        auth: auth_cfg,
        referral: referral_cfg,
        api: api_cfg,
    } = config;

    let db: Arc<dyn Database> = Arc::new(db::init(db_cfg).await?);

    let bot = tg::create_bot(tg_cfg.bot_token.clone(), tg_cfg.api_url.clone());
    let bot_username = tg::bot_username(&bot.get_me().await?)?;

    let referrals = Arc::new(ReferralService::new(ReferralCodec::new(
        &referral_cfg.secret_key,
    )));

    let api_state = Arc::new(api::ApiState {
        db: db.clone(),
        tokens: TokenIssuer::new(&auth_cfg.secret_key, auth_cfg.access_token_expire_minutes),
        init_data: InitDataValidator::new(
            tg_cfg.bot_token.clone(),
            auth_cfg.init_data_max_age_secs,
        ),
        referrals: referrals.clone(),
        bot_username: bot_username.clone(),
    });

    let ctx = Arc::new(tg::Ctx {
        bot,
        db,
        cfg: Arc::new(tg_cfg),
        referrals,
        bot_username,
    });

    futures::try_join!(tg::run_bot(ctx), api::serve(&api_cfg, api_state))?;

    Ok(())
}

/// Feed fake updates through the bot's handlers and report the latencies
pub async fn run_load_test(args: LoadTestArgs) -> Result {
    load_test::run(args).await
}

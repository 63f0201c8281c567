//! Telegram bot root module

mod callback;
mod cmd;
mod echo;
mod keyboards;
mod user_ctx;

use crate::i18n::{Lang, Translator};
use crate::prelude::*;
use crate::referral::ReferralService;
use crate::user::{Database, UserId};
use crate::util::DynError;
use crate::Result;
use dptree::di::DependencyMap;
use serde::Deserialize;
use std::sync::Arc;
use teloxide::adaptors::DefaultParseMode;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{Me, ParseMode};
use teloxide::utils::command::BotCommands;

pub(crate) use callback::CallbackData;
pub(crate) use user_ctx::UserCtx;

pub(crate) type Bot = DefaultParseMode<teloxide::Bot>;

pub(crate) const TG_UPDATES_TOTAL: &str = "tg_updates_total";
pub(crate) const TG_UPDATES_SKIPPED_TOTAL: &str = "tg_updates_skipped_total";

#[derive(Deserialize)]
pub(crate) struct Config {
    pub(crate) bot_token: String,

    /// Telegram ids of the users that may see the referral statistics
    #[serde(default)]
    pub(crate) admin_ids: Vec<u64>,

    /// Overrides the default `https://api.telegram.org`
    pub(crate) api_url: Option<url::Url>,
}

impl Config {
    pub(crate) fn is_admin(&self, user: teloxide::types::UserId) -> bool {
        self.admin_ids.contains(&user.0)
    }
}

pub(crate) struct Ctx {
    pub(crate) bot: Bot,
    pub(crate) db: Arc<dyn Database>,
    pub(crate) cfg: Arc<Config>,
    pub(crate) referrals: Arc<ReferralService>,

    /// Username of the bot itself, used in the referral links
    pub(crate) bot_username: String,
}

pub(crate) fn create_bot(token: String, api_url: Option<url::Url>) -> Bot {
    let bot = teloxide::Bot::new(token);
    let bot = match api_url {
        Some(url) => bot.set_api_url(url),
        None => bot,
    };
    bot.parse_mode(ParseMode::Html)
}

/// Dispatching tree shared by the real bot and the load test
pub(crate) fn handler_schema() -> UpdateHandler<Box<DynError>> {
    dptree::entry()
        .inspect(|update: Update| {
            metrics::increment_counter!(TG_UPDATES_TOTAL, "kind" => update.kind.discriminator());
        })
        .branch(
            Update::filter_message()
                .filter_command::<cmd::regular::Cmd>()
                .endpoint(cmd::handle::<cmd::regular::Cmd>()),
        )
        .branch(
            Update::filter_message()
                .filter_command::<cmd::admin::Cmd>()
                .endpoint(cmd::handle::<cmd::admin::Cmd>()),
        )
        .branch(
            Update::filter_callback_query()
                .filter_map(callback::parse)
                .endpoint(callback::handle),
        )
        .branch(
            Update::filter_message()
                .filter(cmd::filter_pm_with_bot)
                .endpoint(echo::handle),
        )
        .inspect(|update: Update| {
            metrics::increment_counter!(
                TG_UPDATES_SKIPPED_TOTAL,
                "kind" => update.kind.discriminator()
            );
        })
}

pub(crate) async fn run_bot(ctx: Arc<Ctx>) -> Result {
    let bot = ctx.bot.clone();

    info!("Starting bot...");

    bot.set_my_commands(cmd::regular::Cmd::bot_commands())
        .await?;

    notify_admins(&ctx).await;

    let mut di = DependencyMap::new();
    di.insert(ctx);

    Dispatcher::builder(bot, handler_schema())
        .dependencies(di)
        // We don't handle all possible updates that users send,
        // so to suppress the warning that we don't do this we have
        // a noop default handler here
        .default_handler(|_| std::future::ready(()))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");

    Ok(())
}

/// Lets the admins know that the bot is alive after a restart
async fn notify_admins(ctx: &Ctx) {
    let text = Translator::new(Lang::default()).tr("admin-bot-started");

    for &admin in &ctx.cfg.admin_ids {
        let Some(admin) = UserId::new(admin) else {
            warn!(admin, "Admin id is out of range, skipping it");
            continue;
        };

        if let Err(err) = ctx.bot.send_message(ChatId::from(admin), &text).await {
            warn!(
                err = tracing_err(&err),
                %admin,
                "Failed to notify the admin about the startup"
            );
        }
    }
}

/// Username of the bot that is required for the deep links to work
pub(crate) fn bot_username(me: &Me) -> Result<String> {
    me.user
        .username
        .clone()
        .fatal_ctx(|| "The bot doesn't have a username")
}

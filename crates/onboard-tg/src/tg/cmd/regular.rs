use crate::i18n::FluentArg;
use crate::prelude::*;
use crate::referral;
use crate::tg::{self, keyboards, UserCtx};
use crate::user::UserId;
use crate::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use teloxide::utils::html;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase")]
pub(crate) enum Cmd {
    #[command(description = "start the bot")]
    Start(String),

    #[command(description = "get your referral link")]
    Referral,

    #[command(description = "open the settings")]
    Settings,

    #[command(description = "show the list of commands")]
    Help,
}

#[async_trait]
impl tg::cmd::Command for Cmd {
    async fn handle(self, ctx: &tg::Ctx, msg: &Message, user: &UserCtx) -> Result {
        match self {
            Cmd::Start(payload) => start(ctx, msg, user, &payload).await,
            Cmd::Referral => referral(ctx, msg, user).await,
            Cmd::Settings => {
                ctx.bot
                    .send_message(msg.chat.id, user.tr.tr("settings-title"))
                    .reply_markup(keyboards::settings(&user.tr))
                    .await?;
                Ok(())
            }
            Cmd::Help => {
                let mut text = format!(
                    "{}\n\n{}",
                    user.tr.tr("help-header"),
                    html::escape(&Cmd::descriptions().to_string()),
                );

                if msg.from.as_ref().is_some_and(|from| ctx.cfg.is_admin(from.id)) {
                    let admin = tg::cmd::admin::Cmd::descriptions().to_string();
                    text = format!("{text}\n\n{}", html::escape(&admin));
                }

                ctx.bot.send_message(msg.chat.id, text).await?;
                Ok(())
            }
        }
    }
}

async fn start(ctx: &tg::Ctx, msg: &Message, user: &UserCtx, payload: &str) -> Result {
    // Only the very first `/start` may credit the referrer
    if user.is_new {
        if let Some(code) = referral::parse_start_payload(payload) {
            credit_referrer(ctx, user.user.id, code).await;
        }
    }

    let name = html::escape(&user.user.first_name);

    if user.user.lang().is_none() {
        let text = user
            .tr
            .tr_args("onboarding-choose-language", [("name", name)]);

        ctx.bot
            .send_message(msg.chat.id, text)
            .reply_markup(keyboards::onboarding_languages(&user.tr))
            .await?;

        return Ok(());
    }

    ctx.bot
        .send_message(msg.chat.id, user.tr.tr_args("welcome", [("name", name)]))
        .reply_markup(keyboards::main_menu(&user.tr))
        .await?;

    Ok(())
}

/// The user must be greeted even if crediting the referrer fails,
/// so the error is only logged here
async fn credit_referrer(ctx: &tg::Ctx, new_user_id: UserId, code: &str) {
    let result = ctx
        .referrals
        .process(&mut *ctx.db.session(), new_user_id, code)
        .await;

    match result {
        Ok(credited) => debug!(credited, "Referral code handled"),
        Err(err) => warn!(
            err = tracing_err(&err),
            "Failed to credit the referrer of a new user"
        ),
    }
}

async fn referral(ctx: &tg::Ctx, msg: &Message, user: &UserCtx) -> Result {
    let info = ctx
        .referrals
        .get_info(&mut *ctx.db.session(), user.user.id)
        .await?;

    let text = match info {
        Some(info) => {
            let link = referral::referral_link(&ctx.bot_username, &info.referral_code);
            user.tr.tr_args(
                "referral-info",
                [
                    ("link", FluentArg::from(link)),
                    ("count", FluentArg::from(info.referral_count)),
                ],
            )
        }
        None => user.tr.tr("referral-not-found"),
    };

    ctx.bot.send_message(msg.chat.id, text).await?;

    Ok(())
}

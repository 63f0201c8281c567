use crate::i18n::{FluentArg, Translator};
use crate::referral::{self, ReferralStats, TopReferrer};
use crate::tg::{self, keyboards, UserCtx};
use crate::Result;
use async_trait::async_trait;
use itertools::Itertools;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use teloxide::utils::html;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase")]
pub(crate) enum Cmd {
    #[command(description = "show referral statistics (admins only)")]
    Stats,
}

#[async_trait]
impl tg::cmd::Command for Cmd {
    async fn handle(self, ctx: &tg::Ctx, msg: &Message, user: &UserCtx) -> Result {
        let is_admin = msg.from.as_ref().is_some_and(|from| ctx.cfg.is_admin(from.id));
        if !is_admin {
            ctx.bot
                .send_message(msg.chat.id, user.tr.tr("forbidden"))
                .await?;
            return Ok(());
        }

        match self {
            Cmd::Stats => {
                let stats = referral::referral_stats(&mut *ctx.db.session()).await?;

                ctx.bot
                    .send_message(msg.chat.id, stats_text(&user.tr, &stats))
                    .reply_markup(keyboards::top_referrers(&user.tr))
                    .await?;
            }
        }
        Ok(())
    }
}

pub(crate) fn stats_text(tr: &Translator, stats: &ReferralStats) -> String {
    tr.tr_args(
        "stats-overview",
        [
            ("total", FluentArg::from(stats.total_users)),
            ("referred", FluentArg::from(stats.referred_users)),
            ("organic", FluentArg::from(stats.organic_users)),
            // Preformatted so that Fluent doesn't drop the trailing `.0`
            ("referred_pct", FluentArg::from(format!("{:.1}", stats.referred_percentage))),
            ("organic_pct", FluentArg::from(format!("{:.1}", stats.organic_percentage))),
        ],
    )
}

pub(crate) fn top_referrers_text(tr: &Translator, top: &[TopReferrer]) -> String {
    if top.is_empty() {
        return tr.tr("stats-no-inviters");
    }

    let lines = top
        .iter()
        .enumerate()
        .map(|(i, referrer)| {
            let name = match &referrer.username {
                Some(username) => format!("@{}", html::escape(username)),
                None => html::escape(&referrer.first_name),
            };
            format!("{}. {name} — {}", i + 1, referrer.referral_count)
        })
        .join("\n");

    format!("{}\n\n{lines}", tr.tr("stats-top-inviters-header"))
}

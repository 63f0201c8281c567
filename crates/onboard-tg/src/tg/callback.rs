//! Inline keyboard button presses

use crate::i18n::{Lang, Translator};
use crate::prelude::*;
use crate::referral;
use crate::tg::{self, cmd, keyboards, UserCtx};
use crate::user;
use crate::util::DynResult;
use crate::Result;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MaybeInaccessibleMessage, User};
use teloxide::utils::html;

/// Payload of the inline keyboard buttons of the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallbackData {
    SettingsMenu,
    SettingsLanguage,
    SettingsBack,
    SetLang(Lang),
    Onboard(Lang),
    TopReferrers,
}

impl fmt::Display for CallbackData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SettingsMenu => f.write_str("settings:menu"),
            Self::SettingsLanguage => f.write_str("settings:language"),
            Self::SettingsBack => f.write_str("settings:back"),
            Self::SetLang(lang) => write!(f, "lang:{}", lang.code()),
            Self::Onboard(lang) => write!(f, "onboard:{}", lang.code()),
            Self::TopReferrers => f.write_str("ref_top"),
        }
    }
}

impl FromStr for CallbackData {
    type Err = ();

    fn from_str(data: &str) -> Result<Self, ()> {
        let parsed = match data {
            "settings:menu" => Self::SettingsMenu,
            "settings:language" => Self::SettingsLanguage,
            "settings:back" => Self::SettingsBack,
            "ref_top" => Self::TopReferrers,
            _ => {
                let (kind, code) = data.split_once(':').ok_or(())?;
                let lang = code.parse::<Lang>().map_err(drop)?;
                match kind {
                    "lang" => Self::SetLang(lang),
                    "onboard" => Self::Onboard(lang),
                    _ => return Err(()),
                }
            }
        };
        Ok(parsed)
    }
}

pub(crate) fn parse(query: CallbackQuery) -> Option<CallbackData> {
    query.data?.parse().ok()
}

pub(crate) async fn handle(
    ctx: Arc<tg::Ctx>,
    query: CallbackQuery,
    data: CallbackData,
) -> DynResult {
    let span = info_span!(
        "handle_callback_query",
        sender = %query.from.debug_id(),
        ?data,
    );

    async move {
        debug!("Processing callback query");

        let result = async {
            let user = UserCtx::load(&ctx, &query.from).await?;
            let notice = on_callback(&ctx, &query, &user, data).await?;

            let mut answer = ctx.bot.answer_callback_query(query.id.clone());
            if let Some(notice) = notice {
                answer = answer.text(notice);
            }
            answer.await?;

            Ok::<_, crate::Error>(())
        }
        .await;

        if let Err(err) = &result {
            let tr = UserCtx::fallback_translator(&query.from);
            cmd::report_error(&ctx, ChatId::from(query.from.id), &tr, err).await;
        }

        result.map_err(Into::into)
    }
    .instrument(span)
    .await
}

/// Returns the text of the notification for the button press if any
async fn on_callback(
    ctx: &tg::Ctx,
    query: &CallbackQuery,
    user: &UserCtx,
    data: CallbackData,
) -> Result<Option<String>> {
    let tr = &user.tr;

    match data {
        CallbackData::SettingsMenu | CallbackData::SettingsBack => {
            edit_or_send(ctx, query, tr.tr("settings-title"), keyboards::settings(tr)).await?;
        }
        CallbackData::SettingsLanguage => {
            let text = tr.tr("settings-language-title");
            edit_or_send(ctx, query, text, keyboards::languages(tr)).await?;
        }
        CallbackData::SetLang(lang) => {
            user::set_language(&mut *ctx.db.session(), user.user.id, lang).await?;

            let tr = Translator::new(lang);
            edit_or_send(ctx, query, tr.tr("settings-title"), keyboards::settings(&tr)).await?;

            return Ok(Some(tr.tr("settings-language-changed")));
        }
        CallbackData::Onboard(lang) => {
            user::set_language(&mut *ctx.db.session(), user.user.id, lang).await?;

            let tr = Translator::new(lang);
            let name = html::escape(&user.user.first_name);
            let text = tr.tr_args("welcome", [("name", name)]);

            edit_or_send(ctx, query, text, keyboards::main_menu(&tr)).await?;
        }
        CallbackData::TopReferrers => {
            if !ctx.cfg.is_admin(query.from.id) {
                return Ok(Some(tr.tr("forbidden")));
            }

            let top = referral::top_referrers(
                &mut *ctx.db.session(),
                referral::DEFAULT_TOP_REFERRERS_LIMIT,
            )
            .await?;

            let text = cmd::admin::top_referrers_text(tr, &top);
            ctx.bot.send_message(sender_chat(&query.from), text).await?;
        }
    }

    Ok(None)
}

/// Replaces the message with the pressed button. If the message is too old
/// to be edited, a new one is sent instead.
async fn edit_or_send(
    ctx: &tg::Ctx,
    query: &CallbackQuery,
    text: String,
    markup: InlineKeyboardMarkup,
) -> Result {
    if let Some(MaybeInaccessibleMessage::Regular(message)) = &query.message {
        let result = ctx
            .bot
            .edit_message_text(message.chat.id, message.id, &text)
            .reply_markup(markup.clone())
            .await;

        match result {
            Ok(_) => return Ok(()),
            Err(err) => debug!(
                err = tracing_err(&err),
                "Couldn't edit the message, sending a new one"
            ),
        }
    }

    ctx.bot
        .send_message(sender_chat(&query.from), text)
        .reply_markup(markup)
        .await?;

    Ok(())
}

fn sender_chat(user: &User) -> ChatId {
    ChatId::from(user.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_variant_survives_the_button_payload() {
        let langs = Lang::iter().flat_map(|lang| [CallbackData::SetLang(lang), CallbackData::Onboard(lang)]);

        let all = [
            CallbackData::SettingsMenu,
            CallbackData::SettingsLanguage,
            CallbackData::SettingsBack,
            CallbackData::TopReferrers,
        ]
        .into_iter()
        .chain(langs);

        for data in all {
            let payload = data.to_string();
            // Telegram limits the callback data to 64 bytes
            assert!(payload.len() <= 64, "{payload}");
            assert_eq!(payload.parse::<CallbackData>(), Ok(data));
        }
    }

    #[test]
    fn wire_format() {
        assert_eq!("lang:ru".parse(), Ok(CallbackData::SetLang(Lang::Ru)));
        assert_eq!("onboard:en".parse(), Ok(CallbackData::Onboard(Lang::En)));
        assert_eq!("ref_top".parse(), Ok(CallbackData::TopReferrers));
    }

    #[test]
    fn rejects_unknown_payloads() {
        for data in ["", "settings", "settings:", "lang:de", "lang:", "onboard", "theme:en", "ref_top:1"] {
            assert_eq!(data.parse::<CallbackData>(), Err(()), "{data}");
        }
    }
}

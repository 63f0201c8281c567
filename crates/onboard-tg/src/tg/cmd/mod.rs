pub(crate) mod admin;
pub(crate) mod regular;

use crate::i18n::Translator;
use crate::prelude::*;
use crate::tg::{self, UserCtx};
use crate::util::DynResult;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::User;

#[async_trait]
pub(crate) trait Command: fmt::Debug + Send + Sync + 'static {
    async fn handle(self, ctx: &tg::Ctx, msg: &Message, user: &UserCtx) -> Result;
}

pub(crate) fn handle<'a, C: Command>(
) -> impl Fn(Arc<tg::Ctx>, Message, C) -> BoxFuture<'a, DynResult> {
    move |ctx, msg, cmd| {
        let info = info_span!(
            "handle_message",
            sender = msg.from.as_ref().map(User::debug_id).as_deref(),
            chat = %msg.chat.debug_id(),
            cmd = format_args!("{cmd:?}")
        );

        let fut = async move {
            debug!("Processing command");

            // Messages in channels have no sender, we don't serve them
            let Some(from) = msg.from.clone() else {
                return Ok(());
            };

            let result = async {
                let user = UserCtx::load(&ctx, &from).await?;
                cmd.handle(&ctx, &msg, &user).await
            }
            .await;

            if let Err(err) = &result {
                let tr = UserCtx::fallback_translator(&from);
                report_error(&ctx, msg.chat.id, &tr, err).await;
            }

            result.map_err(Into::into)
        };

        Box::pin(fut.instrument(info))
    }
}

/// Logs the error and tells the user its id, so they can refer to it
/// when asking for help
pub(crate) async fn report_error(ctx: &tg::Ctx, chat_id: ChatId, tr: &Translator, err: &Error) {
    let span = warn_span!("err", err = tracing_err(err), id = err.id());
    async {
        if !err.is_user_error() {
            warn!("Update handler returned an error");
        }

        let reply = tr.tr_args("error-generic", [("id", err.id().to_owned())]);

        if let Err(err) = ctx.bot.send_message(chat_id, reply).await {
            warn!(
                err = tracing_err(&err),
                "Failed to reply with the error message to the user"
            );
        }
    }
    .instrument(span)
    .await;
}

pub(crate) fn filter_pm_with_bot(msg: Message) -> bool {
    msg.chat.is_private()
}

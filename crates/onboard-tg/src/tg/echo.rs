use crate::prelude::*;
use crate::tg::{self, cmd, UserCtx};
use crate::util::DynResult;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::User;

/// Answers any private message that isn't a known command with a hint
pub(crate) async fn handle(ctx: Arc<tg::Ctx>, msg: Message) -> DynResult {
    let span = info_span!(
        "handle_unknown_message",
        sender = msg.from.as_ref().map(User::debug_id).as_deref(),
    );

    async move {
        let Some(from) = msg.from.clone() else {
            return Ok(());
        };

        let result = async {
            let user = UserCtx::load(&ctx, &from).await?;
            ctx.bot
                .send_message(msg.chat.id, user.tr.tr("echo-unknown-message"))
                .await?;
            Ok::<_, crate::Error>(())
        }
        .await;

        if let Err(err) = &result {
            let tr = UserCtx::fallback_translator(&from);
            cmd::report_error(&ctx, msg.chat.id, &tr, err).await;
        }

        result.map_err(Into::into)
    }
    .instrument(span)
    .await
}

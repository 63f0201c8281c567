use crate::i18n::{self, Translator};
use crate::tg;
use crate::user::{self, UpsertUser, UpsertedUser, User};
use crate::Result;
use teloxide::types as tg_api;

/// The sender of the update, registered or refreshed in the database
/// before any handler logic runs
pub(crate) struct UserCtx {
    pub(crate) user: User,

    /// `true` if this update is the first one we have ever seen from the user
    pub(crate) is_new: bool,

    pub(crate) tr: Translator,
}

impl UserCtx {
    pub(crate) async fn load(ctx: &tg::Ctx, from: &tg_api::User) -> Result<Self> {
        let input = UpsertUser::from_tg(from)?;
        let UpsertedUser { user, is_new } = user::register(&mut *ctx.db.session(), input).await?;

        let lang = i18n::resolve_lang(
            user.language_code.as_deref(),
            from.language_code.as_deref(),
        );

        Ok(Self {
            user,
            is_new,
            tr: Translator::new(lang),
        })
    }

    /// Language used before the user is loaded from the database
    pub(crate) fn fallback_translator(from: &tg_api::User) -> Translator {
        Translator::new(i18n::resolve_lang(None, from.language_code.as_deref()))
    }
}

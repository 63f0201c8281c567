use super::{Session, UpsertUser, UpsertedUser, User, UserError, UserId};
use crate::i18n::Lang;
use crate::prelude::*;
use crate::Result;

/// Creates or refreshes the user and commits right away, so that
/// the user is registered even if whatever follows fails.
#[instrument(skip_all, fields(user_id = %input.id))]
pub(crate) async fn register<S: Session + ?Sized>(
    session: &mut S,
    input: UpsertUser,
) -> Result<UpsertedUser> {
    input.validate()?;

    let upserted = session.upsert_user(input).await?;
    session.commit().await?;

    if upserted.is_new {
        info!("Registered a new user");
    }

    Ok(upserted)
}

pub(crate) async fn profile<S: Session + ?Sized>(session: &mut S, user_id: UserId) -> Result<User> {
    session
        .get_user(user_id)
        .await?
        .ok_or_else(|| err!(UserError::NotFound { user_id }))
}

#[instrument(skip(session))]
pub(crate) async fn set_language<S: Session + ?Sized>(
    session: &mut S,
    user_id: UserId,
    lang: Lang,
) -> Result {
    if !session.update_language(user_id, lang).await? {
        return Err(err!(UserError::NotFound { user_id }));
    }
    session.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use crate::error::ErrorKind;
    use crate::referral::UserStore;
    use crate::user::test_util::*;
    use crate::user::Database;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn register_reports_new_users_once() {
        let db = MemoryDb::default();

        let first = register(&mut *db.session(), upsert_user(1)).await.unwrap();
        assert!(first.is_new);

        let renamed = UpsertUser {
            first_name: "Renamed".to_owned(),
            ..upsert_user(1)
        };
        let second = register(&mut *db.session(), renamed).await.unwrap();
        assert!(!second.is_new);
        assert_eq!(second.user.first_name, "Renamed");
        assert_eq!(second.user.created_at, first.user.created_at);
    }

    #[tokio::test]
    async fn register_rejects_invalid_input() {
        let db = MemoryDb::default();
        let input = UpsertUser {
            first_name: String::new(),
            ..upsert_user(1)
        };

        let err = register(&mut *db.session(), input).await.unwrap_err();
        assert!(err.is_user_error());

        let user = db.session().get_user(user_id(1)).await.unwrap();
        assert_eq!(user, None);
    }

    #[tokio::test]
    async fn profile_of_unknown_user() {
        let db = MemoryDb::default();
        let err = profile(&mut *db.session(), user_id(5)).await.unwrap_err();

        assert_matches!(
            err.kind(),
            ErrorKind::User {
                source: UserError::NotFound { user_id }
            } if user_id.get() == 5
        );
    }

    #[tokio::test]
    async fn language_survives_profile_refresh() {
        let db = MemoryDb::default();

        register(&mut *db.session(), upsert_user(1)).await.unwrap();
        set_language(&mut *db.session(), user_id(1), Lang::Ru)
            .await
            .unwrap();
        register(&mut *db.session(), upsert_user(1)).await.unwrap();

        let user = profile(&mut *db.session(), user_id(1)).await.unwrap();
        assert_eq!(user.lang(), Some(Lang::Ru));

        let err = set_language(&mut *db.session(), user_id(2), Lang::En)
            .await
            .unwrap_err();
        assert!(err.is_user_error());
    }
}

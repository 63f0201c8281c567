//! Localized texts of the bot

use crate::prelude::*;
use fluent_templates::fluent_bundle::FluentValue;
use fluent_templates::{static_loader, Loader};
use std::collections::HashMap;
use unic_langid::LanguageIdentifier;

/// Value of a placeholder in a translation
pub(crate) type FluentArg = FluentValue<'static>;

static_loader! {
    static LOCALES = {
        locales: "./locales",
        fallback_language: "en",
        // Unicode isolation marks around the arguments break the links
        // and HTML markup in Telegram messages
        customise: |bundle| bundle.set_use_isolating(false),
    };
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum::EnumIter,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Lang {
    #[default]
    En,
    Ru,
}

impl Lang {
    pub(crate) fn code(self) -> &'static str {
        self.into()
    }

    /// Accepts both plain (`ru`) and regional (`ru-RU`) codes.
    pub(crate) fn from_code(code: &str) -> Option<Self> {
        let primary = code.split('-').next()?.trim().to_lowercase();
        primary.parse().ok()
    }

    fn langid(self) -> LanguageIdentifier {
        // Unparsable ids fall back to the loader's fallback language anyway
        self.code().parse().unwrap_or_default()
    }
}

/// The language explicitly chosen by the user wins over the language of
/// the Telegram client.
pub(crate) fn resolve_lang(saved: Option<&str>, telegram: Option<&str>) -> Lang {
    saved
        .and_then(Lang::from_code)
        .or_else(|| telegram.and_then(Lang::from_code))
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub(crate) struct Translator {
    lang: Lang,
    langid: LanguageIdentifier,
}

impl Translator {
    pub(crate) fn new(lang: Lang) -> Self {
        Self {
            lang,
            langid: lang.langid(),
        }
    }

    pub(crate) fn lang(&self) -> Lang {
        self.lang
    }

    /// Missing keys are rendered as the key itself.
    ///
    /// # Panics
    ///
    /// `fluent_templates` panics if the message references an argument, so
    /// such keys must go through [`Translator::tr_args`].
    pub(crate) fn tr(&self, key: &str) -> String {
        let text = LOCALES.lookup(&self.langid, key);
        self.or_key(text, key)
    }

    /// # Panics
    ///
    /// If `args` lacks any argument that the message references.
    pub(crate) fn tr_args<'a, V>(&self, key: &str, args: impl IntoIterator<Item = (&'a str, V)>) -> String
    where
        V: Into<FluentValue<'static>>,
    {
        let args: HashMap<String, FluentValue<'static>> = args
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value.into()))
            .collect();

        let text = LOCALES.lookup_with_args(&self.langid, key, &args);
        self.or_key(text, key)
    }

    fn or_key(&self, text: Option<String>, key: &str) -> String {
        text.unwrap_or_else(|| {
            warn!(lang = self.lang.code(), key, "Missing translation");
            key.to_owned()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;
    use strum::IntoEnumIterator;

    #[test]
    fn lang_codes() {
        assert_eq!(Lang::from_code("en"), Some(Lang::En));
        assert_eq!(Lang::from_code("ru-RU"), Some(Lang::Ru));
        assert_eq!(Lang::from_code("RU"), Some(Lang::Ru));
        assert_eq!(Lang::from_code("de"), None);
        assert_eq!(Lang::from_code(""), None);
        assert_eq!(Lang::Ru.code(), "ru");
    }

    #[test]
    fn saved_language_wins() {
        assert_eq!(resolve_lang(Some("ru"), Some("en-US")), Lang::Ru);
        assert_eq!(resolve_lang(None, Some("ru-RU")), Lang::Ru);
        assert_eq!(resolve_lang(Some("fr"), Some("ru")), Lang::Ru);
        assert_eq!(resolve_lang(None, Some("de")), Lang::En);
        assert_eq!(resolve_lang(None, None), Lang::En);
    }

    #[test]
    fn every_language_has_every_key() {
        let keys = [
            "welcome",
            "onboarding-choose-language",
            "btn-settings",
            "btn-language",
            "btn-back",
            "lang-en",
            "lang-ru",
            "settings-title",
            "settings-language-title",
            "settings-language-changed",
            "referral-info",
            "referral-not-found",
            "echo-unknown-message",
            "help-header",
            "stats-overview",
            "stats-top-inviters-btn",
            "stats-no-inviters",
            "stats-top-inviters-header",
            "admin-bot-started",
            "error-generic",
            "forbidden",
        ];

        // Extra arguments are ignored, missing ones make the lookup panic
        let args: HashMap<&str, FluentArg> = [
            "name",
            "link",
            "count",
            "total",
            "referred",
            "referred_pct",
            "organic",
            "organic_pct",
            "id",
        ]
        .into_iter()
        .map(|name| (name, FluentArg::from(name)))
        .collect();

        for lang in Lang::iter() {
            for key in keys {
                // No fallback to english here, every language must be complete
                let text = LOCALES.lookup_single_language(&lang.langid(), key, Some(&args));
                assert!(text.is_some(), "{lang:?}: {key}");
            }
        }
    }

    #[test]
    fn interpolation() {
        let en = Translator::new(Lang::En);
        let ru = Translator::new(Lang::Ru);

        expect![[r#"
            Hello, Alice! 👋
            Invite your friends with /referral and tune the bot with /settings."#]]
        .assert_eq(&en.tr_args("welcome", [("name", "Alice")]));

        expect!["Привет, Алиса! Выбери язык:"]
            .assert_eq(&ru.tr_args("onboarding-choose-language", [("name", "Алиса")]));
    }

    #[test]
    fn texts_without_arguments_render_with_tr() {
        let ru = Translator::new(Lang::Ru);
        assert_eq!(ru.tr("lang-ru"), "Русский");
    }

    #[test]
    #[should_panic(expected = "Failed to format a message")]
    fn missing_argument_panics() {
        Translator::new(Lang::En).tr("welcome");
    }

    #[test]
    fn missing_key_renders_itself() {
        let en = Translator::new(Lang::En);
        assert_eq!(en.tr("no-such-key"), "no-such-key");
    }
}

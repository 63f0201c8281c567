use crate::i18n::{Lang, Translator};
use crate::tg::CallbackData;
use strum::IntoEnumIterator;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

fn button(text: String, data: CallbackData) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, data.to_string())
}

pub(crate) fn main_menu(tr: &Translator) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[button(tr.tr("btn-settings"), CallbackData::SettingsMenu)]])
}

pub(crate) fn settings(tr: &Translator) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[button(
        tr.tr("btn-language"),
        CallbackData::SettingsLanguage,
    )]])
}

/// Language picker shown from the settings, marks the current language
pub(crate) fn languages(tr: &Translator) -> InlineKeyboardMarkup {
    let rows = Lang::iter().map(|lang| {
        let name = tr.tr(&format!("lang-{}", lang.code()));
        let name = if lang == tr.lang() {
            format!("✓ {name}")
        } else {
            name
        };
        vec![button(name, CallbackData::SetLang(lang))]
    });

    let back = [button(tr.tr("btn-back"), CallbackData::SettingsBack)];

    InlineKeyboardMarkup::new(rows.chain([back.to_vec()]))
}

/// Language picker for the users that haven't chosen a language yet
pub(crate) fn onboarding_languages(tr: &Translator) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(Lang::iter().map(|lang| {
        let name = tr.tr(&format!("lang-{}", lang.code()));
        [button(name, CallbackData::Onboard(lang))]
    }))
}

pub(crate) fn top_referrers(tr: &Translator) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[button(
        tr.tr("stats-top-inviters-btn"),
        CallbackData::TopReferrers,
    )]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn rows(markup: &InlineKeyboardMarkup) -> Vec<Vec<(String, String)>> {
        markup
            .inline_keyboard
            .iter()
            .map(|row| {
                row.iter()
                    .map(|button| {
                        let data = match &button.kind {
                            InlineKeyboardButtonKind::CallbackData(data) => data.clone(),
                            kind => panic!("Unexpected button kind: {kind:?}"),
                        };
                        (button.text.clone(), data)
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn languages_mark_the_current_one() {
        let tr = Translator::new(Lang::Ru);

        assert_eq!(
            rows(&languages(&tr)),
            [
                vec![("English".to_owned(), "lang:en".to_owned())],
                vec![("✓ Русский".to_owned(), "lang:ru".to_owned())],
                vec![("⬅️ Назад".to_owned(), "settings:back".to_owned())],
            ]
        );
    }

    #[test]
    fn onboarding_offers_every_language() {
        let tr = Translator::new(Lang::En);

        assert_eq!(
            rows(&onboarding_languages(&tr)),
            [
                vec![("English".to_owned(), "onboard:en".to_owned())],
                vec![("Русский".to_owned(), "onboard:ru".to_owned())],
            ]
        );
    }
}

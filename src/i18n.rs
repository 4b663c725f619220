//! Internationalization (i18n) support
//!
//! Provides language selection and translation functions.
//!
//! The `i18n!` macro is initialized at the crate root (lib.rs).

use crate::types::{FeedStatus, Role};

/// Supported languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Language {
    #[default]
    English,
    Spanish,
}

impl Language {
    /// Get the locale code for this language
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
        }
    }

    /// Get the display name for this language (in its own language)
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Español",
        }
    }

    /// Get all available languages
    pub fn all() -> &'static [Language] {
        &[Language::English, Language::Spanish]
    }

    /// Parse a language from its locale code
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Language::English),
            "es" => Some(Language::Spanish),
            _ => None,
        }
    }
}

/// Set the current language
pub fn set_language(lang: Language) {
    rust_i18n::set_locale(lang.code());
}

/// Get the current language
pub fn current_language() -> Language {
    let locale = rust_i18n::locale();
    Language::from_code(&locale).unwrap_or_default()
}

/// Translate a key computed at runtime
pub fn tr(key: &str) -> String {
    rust_i18n::t!(key).into_owned()
}

pub fn role_label(role: Role) -> String {
    tr(&format!("users.role.{}", role.as_str()))
}

pub fn feed_status_label(status: FeedStatus) -> String {
    let key = match status {
        FeedStatus::Disconnected => "status.feed.disconnected",
        FeedStatus::Connecting => "status.feed.connecting",
        FeedStatus::Live => "status.feed.live",
        FeedStatus::Error => "status.feed.error",
    };
    tr(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes_round_trip() {
        for lang in Language::all() {
            assert_eq!(Language::from_code(lang.code()), Some(*lang));
        }
        assert_eq!(Language::from_code("zh-CN"), None);
    }

    #[test]
    #[serial_test::serial]
    fn test_translations_follow_locale() {
        set_language(Language::Spanish);
        assert_eq!(tr("nav.sign_out"), "Cerrar sesión");
        assert_eq!(tr("history.window.week"), "7 días");
        assert_eq!(current_language(), Language::Spanish);

        set_language(Language::English);
        assert_eq!(tr("nav.sign_out"), "Sign out");
        assert_eq!(role_label(Role::Operator), "Operator");
    }
}

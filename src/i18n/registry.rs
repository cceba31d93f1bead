//! Language registry: single source of truth for the languages a project can
//! be translated into.
//!
//! The registry is initialized once behind a `OnceLock` and is immutable
//! afterwards.

use std::sync::OnceLock;

/// Configuration for a known language.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// ISO 639-1 language code (e.g., "en", "de")
    pub code: &'static str,

    /// English name, also used in AI translation prompts (e.g., "German")
    pub name: &'static str,

    /// Whether this is the language base documents are written in
    pub is_canonical: bool,

    /// Whether translation documents may be stored for this language
    pub enabled: bool,
}

/// Global language registry.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global language registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Look up a language by its code, enabled or not.
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// Codes of the enabled languages.
    pub fn enabled_codes(&self) -> Vec<&'static str> {
        self.languages
            .iter()
            .filter(|lang| lang.enabled)
            .map(|lang| lang.code)
            .collect()
    }
}

/// English is the base language; German, Italian, French and Spanish are the
/// translation targets. Polish and Slovak are known to the translator but not
/// offered for documents yet.
fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig {
            code: "en",
            name: "English",
            is_canonical: true,
            enabled: true,
        },
        LanguageConfig {
            code: "de",
            name: "German",
            is_canonical: false,
            enabled: true,
        },
        LanguageConfig {
            code: "it",
            name: "Italian",
            is_canonical: false,
            enabled: true,
        },
        LanguageConfig {
            code: "fr",
            name: "French",
            is_canonical: false,
            enabled: true,
        },
        LanguageConfig {
            code: "es",
            name: "Spanish",
            is_canonical: false,
            enabled: true,
        },
        LanguageConfig {
            code: "pl",
            name: "Polish",
            is_canonical: false,
            enabled: false,
        },
        LanguageConfig {
            code: "sk",
            name: "Slovak",
            is_canonical: false,
            enabled: false,
        },
    ]
}

//! Quality checks for AI-suggested translations.
//!
//! UI strings carry interpolation placeholders, inline markup and links that
//! must survive translation untouched. The validator compares what it finds in
//! the source text against the suggestion and reports anything that went
//! missing or appeared from nowhere.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Validation report containing errors and warnings about a suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    /// The suggestion is unusable as-is
    pub errors: Vec<String>,

    /// The suggestion may have lost something from the source
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

pub struct SuggestionValidator;

static BRACE_PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();
static PRINTF_PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();
static HTML_TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static URL_REGEX: OnceLock<Regex> = OnceLock::new();

impl SuggestionValidator {
    /// Check a suggested translation against its source text.
    ///
    /// Placeholders (`{name}`, `{{count}}`, `%s`, `%1$d`) and HTML tags are
    /// compared as multisets, since their order legitimately changes between
    /// languages. URLs are compared by count.
    pub fn validate(source: &str, suggestion: &str) -> ValidationReport {
        let mut report = ValidationReport::new();

        if suggestion.trim().is_empty() {
            report.errors.push("Suggestion is empty".to_string());
            return report;
        }

        let orig_placeholders = Self::extract_placeholders(source);
        let sugg_placeholders = Self::extract_placeholders(suggestion);
        if multiset(&orig_placeholders) != multiset(&sugg_placeholders) {
            report.warnings.push(format!(
                "Placeholder mismatch: source has {:?}, suggestion has {:?}",
                orig_placeholders, sugg_placeholders
            ));
        }

        let orig_tags = Self::extract_html_tags(source);
        let sugg_tags = Self::extract_html_tags(suggestion);
        if multiset(&orig_tags) != multiset(&sugg_tags) {
            report.warnings.push(format!(
                "HTML tag mismatch: source has {:?}, suggestion has {:?}",
                orig_tags, sugg_tags
            ));
        }

        let orig_urls = Self::extract_urls(source);
        let sugg_urls = Self::extract_urls(suggestion);
        if orig_urls.len() != sugg_urls.len() {
            report.warnings.push(format!(
                "URL mismatch: source has {} URLs, suggestion has {} URLs",
                orig_urls.len(),
                sugg_urls.len()
            ));
        }

        report
    }

    /// Extract `{name}`, `{{name}}` and printf-style placeholders.
    fn extract_placeholders(text: &str) -> Vec<String> {
        let braces = BRACE_PLACEHOLDER_REGEX
            .get_or_init(|| Regex::new(r"\{\{\s*[\w.]+\s*\}\}|\{[\w.]+\}").unwrap());
        let printf = PRINTF_PLACEHOLDER_REGEX
            .get_or_init(|| Regex::new(r"%(?:\d+\$)?[sdif@]").unwrap());

        braces
            .find_iter(text)
            .chain(printf.find_iter(text))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn extract_html_tags(text: &str) -> Vec<String> {
        let regex = HTML_TAG_REGEX.get_or_init(|| Regex::new(r"</?([a-zA-Z][a-zA-Z0-9]*)[^>]*>").unwrap());

        regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn extract_urls(text: &str) -> Vec<String> {
        let regex = URL_REGEX.get_or_init(|| Regex::new(r#"https?://[^\s)\]"'<]+"#).unwrap());

        regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

fn multiset(items: &[String]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for item in items {
        *counts.entry(item.as_str()).or_insert(0) += 1;
    }
    counts
}

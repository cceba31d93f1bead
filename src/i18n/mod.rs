//! Languages and suggestion quality checks.
//!
//! - `registry`: every known language and its metadata
//! - `language`: validated `Language` handle built from the registry
//! - `validator`: checks AI suggestions keep placeholders, markup and links
//!
//! ```rust,ignore
//! use crate::i18n::Language;
//!
//! let french = Language::from_code("fr")?;
//! assert!(!french.is_canonical());
//! ```

mod language;
mod registry;
mod validator;

pub use language::Language;
pub use registry::{LanguageConfig, LanguageRegistry};
pub use validator::{SuggestionValidator, ValidationReport};

//! Reconcile a translation file against its base document offline.
//!
//! Usage:
//!   cargo run --bin reconcile -- base.json                   # Print the base as a blank translation
//!   cargo run --bin reconcile -- base.json fr.json           # Print the merged translation
//!   cargo run --bin reconcile -- base.json fr.json > out.json
//!
//! The merged document goes to stdout; completeness goes to stderr.

use anyhow::{bail, Result};
use std::path::PathBuf;
use translation_manager::completeness::Completeness;
use translation_manager::merge::{merge, same_shape};
use translation_manager::tree::read_document;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (base_path, translation_path) = match args.as_slice() {
        [base] => (PathBuf::from(base), None),
        [base, translation] => (PathBuf::from(base), Some(PathBuf::from(translation))),
        _ => bail!("Usage: reconcile <base.json> [translation.json]"),
    };

    let base = read_document(&base_path)?;
    let translation = translation_path
        .as_deref()
        .map(read_document)
        .transpose()?;

    let merged = merge(&base, translation.as_ref());
    println!("{}", merged.to_pretty_string());

    if let Some(translation) = &translation {
        if !same_shape(&base, translation) {
            eprintln!("Note: translation shape differed from base and was reconciled");
        }
    }

    let completeness = Completeness::measure(&base, translation.as_ref());
    eprintln!(
        "Translated {}/{} leaves ({}%)",
        completeness.translated, completeness.total, completeness.percent
    );

    Ok(())
}

//! Translation manager: keeps per-language translations of a base JSON
//! document aligned with the base's shape, and serves them over HTTP.

pub mod cache;
pub mod completeness;
pub mod config;
pub mod db;
pub mod editor;
pub mod error;
pub mod i18n;
pub mod merge;
pub mod metrics;
pub mod path;
pub mod security;
pub mod server;
pub mod service;
pub mod store;
pub mod suggest;
pub mod tree;

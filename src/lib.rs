//! safezip library
//!
//! An async pipeline that fetches remote files, checks their SHA-256 digest
//! against a reputation service and stores vetted content as zip archives
//! keyed by digest, so identical content is only scanned and archived once.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

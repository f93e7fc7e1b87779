//! Command-line interface components
//!
//! This module contains CLI-specific code for the safezip application:
//! argument parsing and the command handlers.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, ConfigAction, ConfigArgs, FetchArgs, GlobalArgs};
pub use commands::{handle_config, handle_fetch, UrlOutcome};

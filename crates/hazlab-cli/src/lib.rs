//! # hazlab-cli
//!
//! Command-line front end for the hazard curve cache: argument parsing,
//! YAML configuration, and the command handlers behind the `hazlab` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{ArchiveCommand, ArchiveTarget, Cli, Command};
pub use commands::{run, Context};
pub use config::{Config, StoreConfig, STORE_URL_ENV};
pub use error::{CliError, Result};

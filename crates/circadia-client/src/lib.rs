//! CLI, store editing, bus publishing, history rendering
//!
//! This crate provides the `circadia` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use commands::bus::BusClient;
pub use error::{ClientError, ClientResult};

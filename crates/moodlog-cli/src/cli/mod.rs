pub mod commands;
pub mod config;

pub use commands::{execute, CliCommand};
pub use config::CliConfig;

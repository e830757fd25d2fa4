//! CLI command handlers

pub mod commands;

pub use commands::{dump, headers, load, sheets, OutputFormat, StringRecord};

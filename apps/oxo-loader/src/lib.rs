//! # oxo-loader
//!
//! Command-line front end of the OxO ingestion engine: clap commands, TOML
//! configuration and external metadata fetching around `oxo-core`.

pub mod cli;
pub mod config;
pub mod remote;

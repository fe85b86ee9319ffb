//! # prattle-cli
//!
//! Command-line interface for the Prattle responder.
//!
//! ## Commands
//!
//! - `prattle chat`: talk to the responder in the terminal
//! - `prattle serve`: run the HTTP API
//! - `prattle reset <channel>`: forget a channel
//! - `prattle config`: print the effective configuration
//! - `prattle check`: validate the configuration and lexicon

pub mod commands;

pub use commands::Cli;

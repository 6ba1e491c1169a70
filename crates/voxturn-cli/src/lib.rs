//! Command-line front end for voxturn: `serve` runs the turn server, `talk`
//! sends one turn to it and plays the answer.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

// Used by main.rs binary
use dotenvy as _;
use tracing_subscriber as _;

pub mod commands;
pub mod handlers;
pub mod parser;

pub use commands::{Commands, ServeArgs, TalkArgs};
pub use parser::Cli;

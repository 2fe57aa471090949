//! # hubmesh-cli
//!
//! Command-line interface for hub-and-spoke WireGuard overlays.
//!
//! The topology comes from a JSON manifest (see [`manifest`]). Commands:
//! - `render` - print each hub's `wg-quick` config
//! - `export` - print spoke configs for end-user devices
//! - `apply` - push hub configs over SSH and print the spoke exports
//!
//! Logs go to stderr; stdout only carries command output.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod manifest;
pub mod output;
pub mod state;

pub use cli::{ApplyArgs, Cli, Commands, Format};
pub use error::CliError;
pub use manifest::{HubEntry, Manifest};
pub use state::KeyState;

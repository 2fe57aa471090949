//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Hubmesh - hub-and-spoke WireGuard overlays.
#[derive(Parser, Debug, Clone)]
#[command(name = "hubmesh")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Topology manifest (JSON).
    #[arg(short, long, env = "HUBMESH_MANIFEST", default_value = "hubmesh.json")]
    pub manifest: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, env = "HUBMESH_FORMAT", default_value_t = Format::Wg)]
    pub format: Format,

    /// Overrides the hub listen port from the manifest.
    #[arg(long, env = "HUBMESH_LISTEN_PORT")]
    pub listen_port: Option<u16>,

    /// Overrides the WireGuard interface name from the manifest.
    #[arg(long, env = "HUBMESH_INTERFACE")]
    pub interface: Option<String>,

    /// Key state file; defaults to `<manifest>.state.json` next to the manifest.
    #[arg(long, env = "HUBMESH_STATE")]
    pub state: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// `wg-quick` configuration files.
    #[default]
    Wg,
    /// JSON for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print each hub's rendered WireGuard config.
    Render {
        /// Only render this hub.
        #[arg(long)]
        hub: Option<String>,
    },

    /// Print the configuration of every spoke.
    Export,

    /// Push configs to every hub over SSH, then print spoke exports.
    ///
    /// Keys come from the state file, so repeated runs push the same configs.
    Apply(ApplyArgs),
}

/// Arguments for the apply command.
#[derive(Parser, Debug, Clone)]
pub struct ApplyArgs {
    /// Print the setup scripts instead of running them.
    #[arg(long)]
    pub dry_run: bool,

    /// SSH client binary.
    #[arg(long, env = "HUBMESH_SSH", default_value = "ssh")]
    pub ssh: PathBuf,

    /// SSH port on the hubs.
    #[arg(long, env = "HUBMESH_SSH_PORT")]
    pub ssh_port: Option<u16>,

    /// SSH connect timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub connect_timeout: u64,
}

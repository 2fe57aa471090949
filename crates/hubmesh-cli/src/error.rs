//! CLI error types.

use std::path::PathBuf;

use hubmesh::MeshError;
use hubmesh_wireguard::WireGuardError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The manifest could not be read or parsed.
    #[error("manifest {}: {reason}", .path.display())]
    Manifest {
        /// Manifest path.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// An SSH key referenced by the manifest could not be read.
    #[error("cannot read ssh key for hub '{hub}' at {}: {source}", .path.display())]
    SshKey {
        /// Hub the key belongs to.
        hub: String,
        /// Key path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The key state file could not be read or written.
    #[error("key state {}: {reason}", .path.display())]
    State {
        /// State file path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Topology or provisioning failed.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// Rendering a spoke config failed.
    #[error(transparent)]
    WireGuard(#[from] WireGuardError),

    /// Some hubs could not be provisioned.
    #[error("{failed} of {total} hubs failed to apply")]
    ApplyFailed {
        /// Number of failed hubs.
        failed: usize,
        /// Number of hubs.
        total: usize,
    },

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Creates a `Manifest` error.
    #[must_use]
    pub fn manifest(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Manifest {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `State` error.
    #[must_use]
    pub fn state(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::State {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

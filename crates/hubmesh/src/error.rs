//! Error types for topology and provisioning operations.

use hubmesh_wireguard::WireGuardError;
use thiserror::Error;

/// Result type alias for hubmesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;

/// Failure to resolve a [`Deferred`](crate::Deferred) value.
///
/// Cloneable because every clone of a deferred value observes the same
/// outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The resolver was dropped without supplying a value.
    #[error("'{label}' was never resolved")]
    Dropped {
        /// Label of the deferred value.
        label: String,
    },

    /// Producing the value failed.
    #[error("'{label}' failed to resolve: {reason}")]
    Failed {
        /// Label of the deferred value.
        label: String,
        /// Why it failed.
        reason: String,
    },
}

impl ResolveError {
    /// Creates a `Failed` error.
    #[must_use]
    pub fn failed(label: impl Into<String>, reason: impl ToString) -> Self {
        Self::Failed {
            label: label.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors that can occur while building or provisioning a topology.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Key generation, addressing or config rendering failed.
    #[error(transparent)]
    WireGuard(#[from] WireGuardError),

    /// A deferred input never became available.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A hub with the same name is already registered.
    #[error("hub '{0}' already exists")]
    DuplicateHub(String),

    /// No hub with this name is registered.
    #[error("hub not found: {0}")]
    HubNotFound(String),

    /// The remote transport could not run the script at all.
    #[error("remote execution on '{node}' failed: {reason}")]
    Transport {
        /// Node the script was meant for.
        node: String,
        /// Transport-level cause.
        reason: String,
    },

    /// The remote script ran and exited non-zero.
    #[error("setup script on '{node}' exited with {exit_code}: {stderr}")]
    CommandFailed {
        /// Node the script ran on.
        node: String,
        /// Exit code of the script, `-1` if killed by a signal.
        exit_code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// IO error (temporary key files, process pipes).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MeshError {
    /// Creates a `Transport` error.
    #[must_use]
    pub fn transport(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `CommandFailed` error.
    #[must_use]
    pub fn command_failed(
        node: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            node: node.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Returns true if the failure happened on the remote side.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::CommandFailed { .. })
    }
}

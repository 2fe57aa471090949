//! Remote machines and how to reach them.

use std::fmt;

use crate::deferred::Deferred;
use crate::error::ResolveError;

/// Credentials for running commands on a remote machine.
///
/// The host is deferred because it is usually assigned by whatever created
/// the machine. The bundle is forwarded to a
/// [`RemoteExecutor`](crate::RemoteExecutor) as-is and never interpreted here.
#[derive(Clone)]
pub struct Connection {
    /// Login user.
    pub user: String,
    /// Public hostname or IP address.
    pub host: Deferred<String>,
    /// PEM-encoded SSH private key.
    pub private_key: String,
}

impl Connection {
    /// Creates a connection whose host is already known.
    #[must_use]
    pub fn new(
        user: impl Into<String>,
        host: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        let host = host.into();
        Self {
            user: user.into(),
            host: Deferred::ready(format!("{host}.host"), host),
            private_key: private_key.into(),
        }
    }

    /// Creates a connection whose host resolves later.
    #[must_use]
    pub fn deferred(
        user: impl Into<String>,
        host: Deferred<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            host,
            private_key: private_key.into(),
        }
    }

    /// Waits for the host and returns a fully resolved connection.
    pub async fn resolve(&self) -> Result<ResolvedConnection, ResolveError> {
        Ok(ResolvedConnection {
            user: self.user.clone(),
            host: self.host.resolve().await?,
            private_key: self.private_key.clone(),
        })
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// A [`Connection`] whose host is known.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    /// Login user.
    pub user: String,
    /// Public hostname or IP address.
    pub host: String,
    /// PEM-encoded SSH private key.
    pub private_key: String,
}

impl ResolvedConnection {
    /// `user@host` as understood by ssh.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl fmt::Debug for ResolvedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConnection")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// A provisioned remote machine.
#[derive(Debug, Clone)]
pub struct Node {
    /// Machine name; becomes the hub name.
    pub name: String,
    /// How to reach it.
    pub connection: Connection,
}

impl Node {
    /// Creates a node.
    #[must_use]
    pub fn new(name: impl Into<String>, connection: Connection) -> Self {
        Self {
            name: name.into(),
            connection,
        }
    }
}

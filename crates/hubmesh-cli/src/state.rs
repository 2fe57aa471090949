//! Key pairs kept between runs.
//!
//! A node registered without a stored key pair gets a fresh one, which is
//! then written back. Hubs and exported spokes therefore keep their keys
//! across `render`, `export` and `apply`. The file holds private keys and is
//! only readable by its owner.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use hubmesh_wireguard::KeyPair;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::CliError;

/// Stored key pairs by hub or spoke name (`spoke-<name>` for spokes).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyState {
    /// Key pairs by node name.
    #[serde(default)]
    pub keys: BTreeMap<String, KeyPair>,
}

impl KeyState {
    /// Reads the state file; a missing file is an empty state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| CliError::state(path, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no key state yet");
                Ok(Self::default())
            }
            Err(e) => Err(CliError::state(path, e)),
        }
    }

    /// Replaces the state file atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), CliError> {
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut file = NamedTempFile::new_in(dir).map_err(|e| CliError::state(path, e))?;
        serde_json::to_writer_pretty(&mut file, self)?;
        writeln!(file)?;
        file.persist(path).map_err(|e| CliError::state(path, e.error))?;

        info!(path = %path.display(), keys = self.keys.len(), "saved key state");
        Ok(())
    }

    /// Adds or replaces entries.
    pub fn merge(&mut self, keys: impl IntoIterator<Item = (String, KeyPair)>) {
        self.keys.extend(keys);
    }
}

//! Installing and applying rendered configs on hubs.
//!
//! Each hub gets one operation whose script installs WireGuard, writes the
//! rendered config inline and restarts the interface. The trigger token is a
//! constant; because the config text is embedded in the script, the script
//! changes whenever the config does, so an orchestrator keyed on script text
//! re-runs it exactly then.
//!
//! There is no retry and no rollback. A script that fails halfway can leave
//! the host with a partially applied config.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::deferred::Deferred;
use crate::error::{MeshError, Result};
use crate::node::{Connection, Node};
use crate::remote::{CommandOutput, RemoteCommand, RemoteExecutor};
use crate::settings::MeshSettings;

/// Builds the idempotent setup script for a rendered config.
#[must_use]
pub fn setup_script(settings: &MeshSettings, config: &str) -> String {
    let unit = settings.unit_name();
    format!(
        "sudo bash<<__EOF__\n\
         set -xeuo pipefail\n\
         export DEBIAN_FRONTEND=noninteractive\n\
         apt-get update\n\
         apt-get install -qy wireguard\n\
         cat<<EOF > {path}\n\
         {config}\n\
         EOF\n\
         systemctl enable {unit}\n\
         systemctl restart {unit}\n\
         __EOF__\n",
        path = settings.config_path(),
    )
}

/// Creates provisioning operations for hubs.
#[derive(Debug)]
pub struct Provisioner<E> {
    executor: Arc<E>,
    settings: MeshSettings,
}

impl<E: RemoteExecutor> Provisioner<E> {
    /// Creates a provisioner running scripts through `executor`.
    pub fn new(executor: E, settings: MeshSettings) -> Self {
        Self::with_shared(Arc::new(executor), settings)
    }

    /// Creates a provisioner over an executor shared with other callers.
    pub fn with_shared(executor: Arc<E>, settings: MeshSettings) -> Self {
        Self { executor, settings }
    }

    /// Settings used for script generation.
    #[must_use]
    pub fn settings(&self) -> &MeshSettings {
        &self.settings
    }

    /// Prepares the operation that applies `rendered` on `node`.
    ///
    /// Nothing runs until [`ProvisionOperation::execute`] is awaited. The
    /// operation waits for the node's connection and for the config before
    /// touching the remote host.
    pub fn apply(&self, node: &Node, rendered: Deferred<String>) -> ProvisionOperation<E> {
        let settings = self.settings.clone();
        let script = rendered.map(move |config| setup_script(&settings, &config));
        ProvisionOperation {
            name: format!("{}-setup", node.name),
            node: node.name.clone(),
            connection: node.connection.clone(),
            triggers: vec![self.settings.trigger_token.clone()],
            script,
            executor: Arc::clone(&self.executor),
        }
    }
}

/// A pending setup of one hub.
pub struct ProvisionOperation<E> {
    name: String,
    node: String,
    connection: Connection,
    triggers: Vec<String>,
    script: Deferred<String>,
    executor: Arc<E>,
}

impl<E: RemoteExecutor> ProvisionOperation<E> {
    /// Operation name, `<node>-setup`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the node the script targets.
    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Re-run tokens.
    #[must_use]
    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    /// The script, once the config is rendered.
    #[must_use]
    pub fn script(&self) -> &Deferred<String> {
        &self.script
    }

    /// Connection the script runs over.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Runs the script on the node.
    ///
    /// # Errors
    ///
    /// Fails if the connection or config never resolves, if the executor
    /// cannot reach the node, or if the script exits non-zero.
    pub async fn execute(&self) -> Result<CommandOutput> {
        let connection = self.connection.resolve().await?;
        let script = self.script.resolve().await?;

        info!(
            operation = %self.name,
            node = %self.node,
            host = %connection.host,
            "applying wireguard config"
        );

        let command = RemoteCommand {
            name: self.name.clone(),
            node: self.node.clone(),
            connection,
            script,
            triggers: self.triggers.clone(),
        };
        let output = self.executor.run(&command).await?;

        if !output.success() {
            warn!(
                operation = %self.name,
                exit_code = output.exit_code,
                "setup script failed; host may hold a partial config"
            );
            return Err(MeshError::command_failed(
                &self.node,
                output.exit_code,
                output.stderr.trim(),
            ));
        }

        info!(operation = %self.name, "wireguard config applied");
        Ok(output)
    }
}

impl<E> std::fmt::Debug for ProvisionOperation<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionOperation")
            .field("name", &self.name)
            .field("node", &self.node)
            .field("triggers", &self.triggers)
            .finish_non_exhaustive()
    }
}

/// Outcome of one operation in a batch.
#[derive(Debug)]
pub struct ProvisionReport {
    /// Operation name.
    pub name: String,
    /// Node name.
    pub node: String,
    /// Result of the run.
    pub result: Result<CommandOutput>,
}

/// Runs all operations concurrently; one report per operation, in input order.
///
/// Operations are independent: one failing does not stop the others.
pub async fn execute_all<E: RemoteExecutor>(
    operations: &[ProvisionOperation<E>],
) -> Vec<ProvisionReport> {
    join_all(operations.iter().map(|op| async move {
        ProvisionReport {
            name: op.name().to_string(),
            node: op.node().to_string(),
            result: op.execute().await,
        }
    }))
    .await
}

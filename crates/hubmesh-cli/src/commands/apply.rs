//! Apply command implementation.
//!
//! Pushes every hub's config over SSH, then prints the spoke exports. Keys are
//! generated per run, so those exports are the only copy matching the hubs.

use std::io::Write;

use hubmesh::{execute_all, Coordinator, MeshError, Provisioner, RemoteExecutor, SshExecutor};
use tracing::{error, info};

use crate::cli::ApplyArgs;
use crate::error::CliError;
use crate::output::{write_json, write_sections, Section};

/// Provisions hubs.
pub struct ApplyCommand<'a> {
    coordinator: &'a Coordinator,
}

impl<'a> ApplyCommand<'a> {
    /// Create a new apply command.
    #[must_use]
    pub fn new(coordinator: &'a Coordinator) -> Self {
        Self { coordinator }
    }

    /// Execute the apply command over the system ssh client.
    ///
    /// # Errors
    ///
    /// Returns an error if any hub fails to apply or output fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        args: &ApplyArgs,
    ) -> Result<(), CliError> {
        let mut ssh = SshExecutor::new()
            .with_program(args.ssh.clone())
            .with_connect_timeout(args.connect_timeout);
        if let Some(port) = args.ssh_port {
            ssh = ssh.with_port(port);
        }
        self.execute_with(writer, ssh, args.dry_run).await
    }

    /// Execute the apply command through `executor`.
    ///
    /// With `dry_run` the setup scripts are printed and nothing runs.
    /// Otherwise every hub is provisioned concurrently and the spoke exports
    /// are printed even if some hubs failed.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::ApplyFailed`] if any hub failed, or an error if
    /// output fails.
    pub async fn execute_with<W: Write, E: RemoteExecutor>(
        &self,
        writer: &mut W,
        executor: E,
        dry_run: bool,
    ) -> Result<(), CliError> {
        let provisioner = Provisioner::new(executor, self.coordinator.settings().clone());
        let operations = self.coordinator.configure_hubs(&provisioner);

        if dry_run {
            let mut sections = Vec::with_capacity(operations.len());
            for op in &operations {
                let script = op.script().resolve().await.map_err(MeshError::from)?;
                sections.push(Section::new(op.name(), script));
            }
            return write_sections(writer, &sections);
        }

        let reports = execute_all(&operations).await;
        let mut failed = 0;
        for report in &reports {
            match &report.result {
                Ok(_) => info!(hub = %report.node, "applied"),
                Err(e) => {
                    failed += 1;
                    error!(hub = %report.node, error = %e, "apply failed");
                }
            }
        }

        let exports = self.coordinator.spoke_config().await?;
        write_json(writer, &exports)?;

        if failed > 0 {
            return Err(CliError::ApplyFailed {
                failed,
                total: reports.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::coordinator;
    use hubmesh::{CommandOutput, RemoteCommand, SpokeExport};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeExecutor {
        ran: Mutex<Vec<String>>,
        fail_node: Option<String>,
    }

    impl RemoteExecutor for FakeExecutor {
        async fn run(&self, command: &RemoteCommand) -> hubmesh::Result<CommandOutput> {
            self.ran.lock().expect("lock").push(command.node.clone());
            let exit_code = i32::from(self.fail_node.as_deref() == Some(command.node.as_str()));
            Ok(CommandOutput {
                exit_code,
                ..CommandOutput::default()
            })
        }
    }

    #[tokio::test]
    async fn applies_every_hub_and_prints_exports() {
        let mesh = coordinator(2, 1);
        let mut out = Vec::new();
        ApplyCommand::new(&mesh)
            .execute_with(&mut out, FakeExecutor::default(), false)
            .await
            .expect("apply");

        let exports: Vec<SpokeExport> = serde_json::from_slice(&out).expect("json");
        assert_eq!(exports.len(), 1);
        assert_eq!(&exports[0].key_pair, mesh.spokes()[0].key_pair());
    }

    #[tokio::test]
    async fn dry_run_prints_scripts_without_running() {
        let mesh = coordinator(2, 0);
        let mut out = Vec::new();
        ApplyCommand::new(&mesh)
            .execute_with(&mut out, FakeExecutor::default(), true)
            .await
            .expect("dry run");

        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("# hub-1-setup\nsudo bash<<__EOF__\n"));
        assert!(text.contains("# hub-2-setup\n"));
        assert_eq!(text.matches("systemctl restart wg-quick@wg0").count(), 2);
    }

    #[tokio::test]
    async fn failed_hub_still_prints_exports() {
        let mesh = coordinator(3, 1);
        let executor = FakeExecutor {
            fail_node: Some("hub-2".into()),
            ..FakeExecutor::default()
        };
        let mut out = Vec::new();
        let err = ApplyCommand::new(&mesh)
            .execute_with(&mut out, executor, false)
            .await
            .expect_err("hub-2 fails");

        assert!(matches!(err, CliError::ApplyFailed { failed: 1, total: 3 }));
        let exports: Vec<SpokeExport> = serde_json::from_slice(&out).expect("json");
        assert_eq!(exports.len(), 1);
    }
}

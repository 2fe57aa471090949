//! Running setup scripts on remote machines.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MeshError, Result};
use crate::node::ResolvedConnection;

/// Exit status ssh uses for its own failures.
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// A script to run on a named node.
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    /// Operation name, e.g. `hub-a-setup`.
    pub name: String,
    /// Node the script targets.
    pub node: String,
    /// Credentials, forwarded untouched.
    pub connection: ResolvedConnection,
    /// Shell script fed to the remote shell.
    pub script: String,
    /// Re-run tokens for the orchestrator.
    pub triggers: Vec<String>,
}

/// What the remote script produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `-1` if terminated by a signal.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns true on exit code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Capability to run a shell script on a remote node.
///
/// Implementations own timeouts and cancellation. A script that runs and
/// exits non-zero is reported through [`CommandOutput::exit_code`], not as an
/// error; errors are reserved for failing to run it at all.
pub trait RemoteExecutor: Send + Sync {
    /// Runs the command and collects its output.
    fn run(&self, command: &RemoteCommand) -> impl Future<Output = Result<CommandOutput>> + Send;
}

/// [`RemoteExecutor`] driving the system `ssh` client.
///
/// The connection's private key is written to a temporary file readable only
/// by the current user for the lifetime of the call. The script is piped to
/// `bash -s` on the remote side.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    program: PathBuf,
    port: Option<u16>,
    connect_timeout_secs: u64,
    options: Vec<String>,
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ssh"),
            port: None,
            connect_timeout_secs: 30,
            options: vec![
                "BatchMode=yes".to_string(),
                "StrictHostKeyChecking=accept-new".to_string(),
                "IdentitiesOnly=yes".to_string(),
            ],
        }
    }
}

impl SshExecutor {
    /// Creates an executor using `ssh` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a different ssh binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Connects to a non-default SSH port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Adds an `-o` option.
    #[must_use]
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    fn args(&self, key_path: &Path, connection: &ResolvedConnection) -> Vec<String> {
        let mut args = vec!["-i".to_string(), key_path.display().to_string()];
        for option in &self.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args.push("-o".to_string());
        args.push(format!("ConnectTimeout={}", self.connect_timeout_secs));
        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push(connection.destination());
        args.push("bash".to_string());
        args.push("-s".to_string());
        args
    }
}

impl RemoteExecutor for SshExecutor {
    async fn run(&self, command: &RemoteCommand) -> Result<CommandOutput> {
        let mut key_file = tempfile::NamedTempFile::new()?;
        key_file.write_all(command.connection.private_key.as_bytes())?;
        if !command.connection.private_key.ends_with('\n') {
            key_file.write_all(b"\n")?;
        }
        key_file.flush()?;

        let args = self.args(key_file.path(), &command.connection);
        debug!(node = %command.node, program = %self.program.display(), "spawning ssh");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MeshError::transport(&command.node, format!("failed to spawn ssh: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(command.script.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        let exit_code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if exit_code == SSH_TRANSPORT_FAILURE {
            return Err(MeshError::transport(&command.node, stderr.trim().to_string()));
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
        })
    }
}

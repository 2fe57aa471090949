//! Hubmesh CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hubmesh_cli::cli::{Cli, Commands};
use hubmesh_cli::commands::{ApplyCommand, ExportCommand, RenderCommand};
use hubmesh_cli::manifest::Manifest;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), hubmesh_cli::CliError> {
    let mut manifest = Manifest::load(&cli.manifest)?;
    manifest.override_settings(cli.listen_port, cli.interface);
    let state_path = cli.state.unwrap_or_else(|| manifest.state_path());
    let coordinator = manifest.open(&state_path)?;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Render { hub } => {
            let cmd = RenderCommand::new(&coordinator);
            cmd.execute(&mut stdout, cli.format, hub.as_deref()).await?;
        }
        Commands::Export => {
            let cmd = ExportCommand::new(&coordinator);
            cmd.execute(&mut stdout, cli.format).await?;
        }
        Commands::Apply(args) => {
            let cmd = ApplyCommand::new(&coordinator);
            cmd.execute(&mut stdout, &args).await?;
        }
    }

    Ok(())
}

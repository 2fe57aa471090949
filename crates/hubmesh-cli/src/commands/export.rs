//! Export command implementation.

use std::io::Write;

use hubmesh::Coordinator;

use crate::cli::Format;
use crate::error::CliError;
use crate::output::{write_json, write_sections, Section};

/// Prints spoke configurations.
pub struct ExportCommand<'a> {
    coordinator: &'a Coordinator,
}

impl<'a> ExportCommand<'a> {
    /// Create a new export command.
    #[must_use]
    pub fn new(coordinator: &'a Coordinator) -> Self {
        Self { coordinator }
    }

    /// Execute the export command.
    ///
    /// JSON prints the exports as data; `wg` prints a ready-to-install
    /// config file per spoke.
    ///
    /// # Errors
    ///
    /// Returns an error if a hub endpoint is unavailable or writing fails.
    pub async fn execute<W: Write>(&self, writer: &mut W, format: Format) -> Result<(), CliError> {
        let exports = self.coordinator.spoke_config().await?;
        match format {
            Format::Json => write_json(writer, &exports),
            Format::Wg => {
                let sections = exports
                    .iter()
                    .map(|export| Ok(Section::new(&export.name, export.render()?)))
                    .collect::<Result<Vec<_>, CliError>>()?;
                write_sections(writer, &sections)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::coordinator;
    use hubmesh::SpokeExport;

    #[tokio::test]
    async fn json_round_trips_to_exports() {
        let mesh = coordinator(2, 2);
        let mut out = Vec::new();
        ExportCommand::new(&mesh).execute(&mut out, Format::Json).await.expect("export");

        let exports: Vec<SpokeExport> = serde_json::from_slice(&out).expect("json");
        assert_eq!(exports.len(), 2);
        assert_eq!(exports[1].name, "spoke-s2");
        assert_eq!(&exports[0].key_pair, mesh.spokes()[0].key_pair());
        assert_eq!(exports[0].peers.len(), 2);
    }

    #[tokio::test]
    async fn wg_prints_one_device_config_per_spoke() {
        let mesh = coordinator(1, 2);
        let mut out = Vec::new();
        ExportCommand::new(&mesh).execute(&mut out, Format::Wg).await.expect("export");

        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("# spoke-s1\n[Interface]\nAddress = 10.169.1.1/16\n"));
        assert!(text.contains("# spoke-s2\n[Interface]\nAddress = 10.169.2.1/16\n"));
        assert_eq!(text.matches("Endpoint = 203.0.113.1:55121").count(), 2);
        assert!(!text.contains("ListenPort"));
    }

    #[tokio::test]
    async fn no_spokes_prints_empty_array() {
        let mesh = coordinator(1, 0);
        let mut out = Vec::new();
        ExportCommand::new(&mesh).execute(&mut out, Format::Json).await.expect("export");
        assert_eq!(String::from_utf8(out).expect("utf8"), "[]\n");
    }
}

//! Render command implementation.

use std::io::Write;

use hubmesh::{Coordinator, Hub, MeshError};

use crate::cli::Format;
use crate::error::CliError;
use crate::output::{write_json, write_sections, Section};

/// Prints hub configs.
pub struct RenderCommand<'a> {
    coordinator: &'a Coordinator,
}

impl<'a> RenderCommand<'a> {
    /// Create a new render command.
    #[must_use]
    pub fn new(coordinator: &'a Coordinator) -> Self {
        Self { coordinator }
    }

    /// Renders every hub, or only `hub` if given.
    ///
    /// # Errors
    ///
    /// Returns an error if the named hub does not exist or rendering fails.
    pub async fn configs(&self, hub: Option<&str>) -> Result<Vec<Section>, CliError> {
        let hubs: Vec<&Hub> = match hub {
            Some(name) => vec![self
                .coordinator
                .hub(name)
                .ok_or_else(|| MeshError::HubNotFound(name.to_string()))?],
            None => self.coordinator.hubs().iter().collect(),
        };

        let mut sections = Vec::with_capacity(hubs.len());
        for hub in hubs {
            let config = self
                .coordinator
                .hub_config(hub)
                .resolve()
                .await
                .map_err(MeshError::from)?;
            sections.push(Section::new(hub.name(), config));
        }
        Ok(sections)
    }

    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: Format,
        hub: Option<&str>,
    ) -> Result<(), CliError> {
        let sections = self.configs(hub).await?;
        match format {
            Format::Wg => write_sections(writer, &sections),
            Format::Json => write_json(writer, &sections),
        }
    }
}

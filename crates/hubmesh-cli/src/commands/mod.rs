//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`render`] - Hub configs
//! - [`export`] - Spoke configs
//! - [`apply`] - Remote provisioning of hubs

pub mod apply;
pub mod export;
pub mod render;

pub use apply::ApplyCommand;
pub use export::ExportCommand;
pub use render::RenderCommand;

//! Output formatting for CLI commands.
//!
//! Config files go out as `# <name>`-headed sections separated by a blank
//! line; everything else is pretty-printed JSON.

use std::io::Write;

use serde::Serialize;

use crate::error::CliError;

/// A named block of text, e.g. one hub's config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Hub or spoke name.
    pub name: String,
    /// File contents.
    pub config: String,
}

impl Section {
    /// Creates a section.
    #[must_use]
    pub fn new(name: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: config.into(),
        }
    }
}

/// Writes a value as pretty JSON followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write, T: Serialize + ?Sized>(
    writer: &mut W,
    value: &T,
) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}

/// Writes sections as `# <name>` headers followed by their text.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_sections<W: Write>(writer: &mut W, sections: &[Section]) -> Result<(), CliError> {
    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            writeln!(writer)?;
        }
        writeln!(writer, "# {}", section.name)?;
        writer.write_all(section.config.as_bytes())?;
        if !section.config.ends_with('\n') {
            writeln!(writer)?;
        }
    }
    Ok(())
}

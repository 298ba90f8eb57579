use std::process::Command;

use crate::building::tools;
use crate::config::{ImageConfig, ToolsConfig};
use crate::errors::FixtureError;

/// Lays a filesystem down inside an allocated image file.
pub trait FilesystemFormatter {
    fn format(&self, image: &ImageConfig) -> Result<(), FixtureError>;
}

/// Formats with `mkntfs`.
#[derive(Clone, Debug)]
pub struct MkntfsFormatter {
    program: String,
}

impl MkntfsFormatter {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            program: tools.mkntfs.clone(),
        }
    }

    /// `-F` is required because the target is a regular file, not a block
    /// device. `--` keeps an output path starting with `-` from being read
    /// as an option.
    pub fn command(&self, image: &ImageConfig) -> Command {
        let mut cmd = tools::command(&self.program, None);
        cmd.arg("-F")
            .arg("-s")
            .arg(image.sector_size.to_string())
            .arg("-L")
            .arg(&image.label)
            .arg("--")
            .arg(&image.output);
        cmd
    }
}

impl FilesystemFormatter for MkntfsFormatter {
    fn format(&self, image: &ImageConfig) -> Result<(), FixtureError> {
        tools::run(self.command(image), &self.program).map_err(|source| FixtureError::Format {
            path: image.output.clone(),
            source,
        })
    }
}

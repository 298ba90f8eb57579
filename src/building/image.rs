use std::ffi::OsString;
use std::fs;

use crate::building::tools;
use crate::config::{ImageConfig, ToolsConfig};
use crate::errors::{FixtureError, StepFailure};

/// Produces the zero-filled image file described by an [`ImageConfig`].
pub trait ImageAllocator {
    fn allocate(&self, image: &ImageConfig) -> Result<(), FixtureError>;
}

/// Allocates the image with `dd if=/dev/zero`.
#[derive(Clone, Debug)]
pub struct DdAllocator {
    program: String,
}

impl DdAllocator {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            program: tools.dd.clone(),
        }
    }
}

/// Arguments handed to `dd` for `image`. The output path is kept as raw
/// OS bytes so `dd` writes exactly the file that is checked afterwards.
pub fn dd_args(image: &ImageConfig) -> Vec<OsString> {
    let mut of = OsString::from("of=");
    of.push(&image.output);
    vec![
        OsString::from("if=/dev/zero"),
        of,
        OsString::from(format!("bs={}", image.sector_size)),
        OsString::from(format!("count={}", image.sector_count())),
    ]
}

impl ImageAllocator for DdAllocator {
    fn allocate(&self, image: &ImageConfig) -> Result<(), FixtureError> {
        let fail = |source: StepFailure| FixtureError::Allocation {
            path: image.output.clone(),
            source,
        };

        let mut cmd = tools::command(&self.program, None);
        cmd.args(dd_args(image));
        tools::run(cmd, &self.program).map_err(fail)?;

        check_size(image).map_err(fail)
    }
}

/// Confirm the file on disk has exactly the configured size.
pub fn check_size(image: &ImageConfig) -> Result<(), StepFailure> {
    let len = fs::metadata(&image.output)?.len();
    if len != image.total_bytes {
        return Err(StepFailure::Precondition(format!(
            "image is {} bytes, expected {}",
            len, image.total_bytes
        )));
    }
    Ok(())
}

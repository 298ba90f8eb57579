use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Why a single pipeline step failed.
#[derive(Error, Debug)]
pub enum StepFailure {
    /// The external program could not be started at all.
    #[error("could not run `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The external program ran and reported failure.
    #[error("`{program}` exited with {status}")]
    Exit { program: String, status: ExitStatus },

    /// Local I/O around the step.
    #[error("I/O error")]
    Io(#[from] io::Error),

    /// The step's inputs or outputs were not in the expected state.
    #[error("{0}")]
    Precondition(String),
}

impl StepFailure {
    /// Exit code reported by the failing tool, if it exited with one.
    pub fn tool_exit_code(&self) -> Option<i32> {
        match self {
            StepFailure::Exit { status, .. } => status.code(),
            _ => None,
        }
    }
}

/// Errors produced while building or verifying the fixture image.
///
/// Each variant corresponds to one pipeline step so callers can tell
/// which stage aborted the run. Messages name the step only; the cause is
/// available through `source()`.
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("failed to allocate image `{path}`")]
    Allocation {
        path: PathBuf,
        #[source]
        source: StepFailure,
    },

    #[error("failed to format `{path}` as NTFS")]
    Format {
        path: PathBuf,
        #[source]
        source: StepFailure,
    },

    #[error("failed to mount `{image}` at `{mount_point}`")]
    Mount {
        image: PathBuf,
        mount_point: PathBuf,
        #[source]
        source: StepFailure,
    },

    #[error("failed to write fixture entry `{path}`")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to unmount `{mount_point}`")]
    Unmount {
        mount_point: PathBuf,
        #[source]
        source: StepFailure,
    },

    #[error("failed to read back `{path}`")]
    Verify {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FixtureError {
    /// Process exit code for this error: the failing tool's own code when
    /// there is one, otherwise 1.
    pub fn exit_code(&self) -> i32 {
        let step = match self {
            FixtureError::Allocation { source, .. }
            | FixtureError::Format { source, .. }
            | FixtureError::Mount { source, .. }
            | FixtureError::Unmount { source, .. } => Some(source),
            FixtureError::Write { .. } | FixtureError::Verify { .. } | FixtureError::Config(_) => None,
        };
        step.and_then(StepFailure::tool_exit_code)
            .filter(|code| *code != 0)
            .unwrap_or(1)
    }
}

use std::ffi::OsStr;
use std::process::Command;

use crate::errors::StepFailure;

/// Start building a command for `program`, optionally behind `sudo`.
pub fn command(program: &str, sudo: Option<&str>) -> Command {
    match sudo {
        Some(sudo) => {
            let mut cmd = Command::new(sudo);
            cmd.arg(program);
            cmd
        }
        None => Command::new(program),
    }
}

/// Run `cmd` to completion. Standard streams are inherited so the tool's
/// own diagnostics reach the user unchanged.
pub fn run(mut cmd: Command, program: &str) -> Result<(), StepFailure> {
    tracing::debug!("running {}", describe(&cmd));
    let status = cmd.status().map_err(|source| StepFailure::Spawn {
        program: program.to_string(),
        source,
    })?;
    if !status.success() {
        return Err(StepFailure::Exit {
            program: program.to_string(),
            status,
        });
    }
    Ok(())
}

/// Render a command line for logs.
pub fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

use std::process::ExitCode;

use ntfs_fixture::building::mount::LoopMountManager;
use ntfs_fixture::{verify_image, FixtureError, GeneratorConfig};

pub fn run(config: &GeneratorConfig) -> Result<ExitCode, FixtureError> {
    config.validate()?;
    let mounts = LoopMountManager::new(&config.mount, &config.tools);
    let report = verify_image(config, &mounts)?;
    if report.is_clean() {
        println!("{} matches the fixture set", report.image.display());
        return Ok(ExitCode::SUCCESS);
    }
    for m in &report.mismatches {
        eprintln!("{}: {}", report.image.display(), m);
    }
    Ok(ExitCode::FAILURE)
}

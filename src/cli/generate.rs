use ntfs_fixture::{generate, FixtureError, GeneratorConfig, SystemTools};

pub fn run(config: &GeneratorConfig) -> Result<(), FixtureError> {
    let tools = SystemTools::new(config);
    let summary = generate(config, &tools.collaborators())?;
    println!(
        "Wrote {} entries to {}",
        summary.entries_written,
        summary.image.display()
    );
    Ok(())
}

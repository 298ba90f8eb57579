// make_ntfs_fixture.rs: builds the NTFS fixture image (test_data/ntfs.raw) used
// by the file-system tests, and checks existing images against the fixture set.
// Usage: cargo run --bin make_ntfs_fixture -- [generate|verify|print-config]

mod args;
mod generate;
mod logging;
mod verify;

use std::process::ExitCode;

use clap::Parser;

use args::{Cli, Command, GenerateArgs};
use ntfs_fixture::{FixtureError, GeneratorConfig};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            let code = u8::try_from(e.exit_code()).unwrap_or(1);
            eprintln!("make_ntfs_fixture: {:#}", anyhow::Error::new(e));
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, FixtureError> {
    let mut config = GeneratorConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or_else(|| Command::Generate(GenerateArgs::default())) {
        Command::Generate(args) => {
            args.apply(&mut config);
            generate::run(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify(args) => {
            args.apply(&mut config);
            verify::run(&config)
        }
        Command::PrintConfig => {
            config.validate()?;
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

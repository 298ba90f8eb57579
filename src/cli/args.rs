use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use ntfs_fixture::GeneratorConfig;

/// Build the NTFS test fixture image used by the file-system tests.
#[derive(Debug, Parser)]
#[command(name = "make_ntfs_fixture", version, about)]
pub struct Cli {
    /// TOML file overriding the built-in image, mount and tool settings.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create and populate the image (the default when no command is given).
    Generate(GenerateArgs),
    /// Mount an existing image read-only and check its contents.
    Verify(VerifyArgs),
    /// Print the effective configuration as TOML.
    PrintConfig,
}

#[derive(Debug, Default, Args)]
pub struct MountArgs {
    /// Mount at this directory instead of a temporary one. Must be empty.
    #[arg(long, value_name = "DIR")]
    pub mount_point: Option<PathBuf>,

    /// Run mount and umount through sudo.
    #[arg(long)]
    pub sudo: bool,
}

#[derive(Debug, Default, Args)]
pub struct GenerateArgs {
    /// Where to write the image.
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// NTFS volume label.
    #[arg(long)]
    pub label: Option<String>,

    #[command(flatten)]
    pub mount: MountArgs,
}

#[derive(Debug, Default, Args)]
pub struct VerifyArgs {
    /// Image to check.
    #[arg(long, short, value_name = "FILE")]
    pub image: Option<PathBuf>,

    #[command(flatten)]
    pub mount: MountArgs,
}

impl MountArgs {
    fn apply(&self, cfg: &mut GeneratorConfig) {
        if let Some(p) = &self.mount_point {
            cfg.mount.mount_point = Some(p.clone());
        }
        if self.sudo {
            cfg.mount.use_sudo = true;
        }
    }
}

impl GenerateArgs {
    /// Layer these flags over `cfg`.
    pub fn apply(&self, cfg: &mut GeneratorConfig) {
        if let Some(p) = &self.output {
            cfg.image.output = p.clone();
        }
        if let Some(l) = &self.label {
            cfg.image.label = l.clone();
        }
        self.mount.apply(cfg);
    }
}

impl VerifyArgs {
    pub fn apply(&self, cfg: &mut GeneratorConfig) {
        if let Some(p) = &self.image {
            cfg.image.output = p.clone();
        }
        self.mount.apply(cfg);
    }
}

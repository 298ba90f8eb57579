//! Immutable run configuration.
//!
//! Defaults describe the canonical fixture image. A TOML file may override
//! any key; the binary applies command-line overrides on top and then calls
//! [`GeneratorConfig::validate`] before handing the value to the pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::FixtureError;

pub const DEFAULT_OUTPUT: &str = "test_data/ntfs.raw";
pub const DEFAULT_TOTAL_BYTES: u64 = 4096 * 1024;
pub const DEFAULT_SECTOR_SIZE: u32 = 512;
pub const DEFAULT_LABEL: &str = "ntfs_test";

/// Smallest volume `mkntfs` will agree to create.
const MIN_TOTAL_BYTES: u64 = 1024 * 1024;
/// NTFS volume labels hold at most 128 UTF-16 code units.
const MAX_LABEL_UNITS: usize = 128;

/// Parameters of the image file itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    pub output: PathBuf,
    pub total_bytes: u64,
    pub sector_size: u32,
    pub label: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            total_bytes: DEFAULT_TOTAL_BYTES,
            sector_size: DEFAULT_SECTOR_SIZE,
            label: DEFAULT_LABEL.to_string(),
        }
    }
}

impl ImageConfig {
    /// Number of sectors in the image, derived from the total size.
    pub fn sector_count(&self) -> u64 {
        self.total_bytes / u64::from(self.sector_size)
    }
}

/// How and where the image is attached while it is populated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MountConfig {
    /// Fixed mount point. When unset a temporary directory is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<PathBuf>,
    /// Run `mount`/`umount` through `sudo`.
    pub use_sudo: bool,
    /// Explicit `-t` filesystem type, e.g. `ntfs-3g`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs_type: Option<String>,
    pub unmount_attempts: u32,
    pub unmount_retry_delay_ms: u64,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            mount_point: None,
            use_sudo: false,
            fs_type: None,
            unmount_attempts: 3,
            unmount_retry_delay_ms: 500,
        }
    }
}

/// Names (or paths) of the external programs the pipeline runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub dd: String,
    pub mkntfs: String,
    pub mount: String,
    pub umount: String,
    pub sudo: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            dd: "dd".into(),
            mkntfs: "mkntfs".into(),
            mount: "mount".into(),
            umount: "umount".into(),
            sudo: "sudo".into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    pub image: ImageConfig,
    pub mount: MountConfig,
    pub tools: ToolsConfig,
}

impl GeneratorConfig {
    /// Parse a configuration from TOML text. Missing keys keep their defaults.
    pub fn from_toml(s: &str) -> Result<Self, FixtureError> {
        toml::from_str(s).map_err(|e| FixtureError::Config(e.to_string()))
    }

    /// Load the configuration from `path`, or the defaults when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, FixtureError> {
        match path {
            Some(p) => {
                let text = fs::read_to_string(p).map_err(|e| {
                    FixtureError::Config(format!("cannot read {}: {}", p.display(), e))
                })?;
                Self::from_toml(&text)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml(&self) -> Result<String, FixtureError> {
        toml::to_string_pretty(self).map_err(|e| FixtureError::Config(e.to_string()))
    }

    /// Reject parameter combinations the formatter or the pipeline cannot honour.
    pub fn validate(&self) -> Result<(), FixtureError> {
        let image = &self.image;
        if !image.sector_size.is_power_of_two() || !(256..=4096).contains(&image.sector_size) {
            return Err(FixtureError::Config(format!(
                "sector size {} must be a power of two between 256 and 4096",
                image.sector_size
            )));
        }
        if image.total_bytes % u64::from(image.sector_size) != 0 {
            return Err(FixtureError::Config(format!(
                "image size {} is not a multiple of the sector size {}",
                image.total_bytes, image.sector_size
            )));
        }
        if image.total_bytes < MIN_TOTAL_BYTES {
            return Err(FixtureError::Config(format!(
                "image size {} is below the {} byte minimum",
                image.total_bytes, MIN_TOTAL_BYTES
            )));
        }
        if image.label.encode_utf16().count() > MAX_LABEL_UNITS {
            return Err(FixtureError::Config(format!(
                "volume label is longer than {} characters",
                MAX_LABEL_UNITS
            )));
        }
        if image.output.as_os_str().is_empty() {
            return Err(FixtureError::Config("output path is empty".into()));
        }
        if self.mount.unmount_attempts == 0 {
            return Err(FixtureError::Config("unmount_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

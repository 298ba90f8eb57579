//! The fixture pipeline: allocate, format, mount, populate, unmount.
//!
//! Steps run strictly in order and the first failure aborts the run. Only
//! the mount is cleaned up on failure; a partially built image stays on disk.

use std::fs;
use std::path::PathBuf;

use crate::building::format::{FilesystemFormatter, MkntfsFormatter};
use crate::building::image::{DdAllocator, ImageAllocator};
use crate::building::mount::{LoopMountManager, MountGuard, MountManager, MountMode, MountPoint, RetryPolicy};
use crate::building::populate::{populate, FileWriter, StdFileWriter};
use crate::config::GeneratorConfig;
use crate::errors::FixtureError;

/// The external collaborators the pipeline drives.
pub struct Collaborators<'a> {
    pub allocator: &'a dyn ImageAllocator,
    pub formatter: &'a dyn FilesystemFormatter,
    pub mounts: &'a dyn MountManager,
    pub writer: &'a dyn FileWriter,
}

/// Real implementations backed by the system tools named in the config.
pub struct SystemTools {
    pub allocator: DdAllocator,
    pub formatter: MkntfsFormatter,
    pub mounts: LoopMountManager,
    pub writer: StdFileWriter,
}

impl SystemTools {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            allocator: DdAllocator::new(&config.tools),
            formatter: MkntfsFormatter::new(&config.tools),
            mounts: LoopMountManager::new(&config.mount, &config.tools),
            writer: StdFileWriter,
        }
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            allocator: &self.allocator,
            formatter: &self.formatter,
            mounts: &self.mounts,
            writer: &self.writer,
        }
    }
}

/// What a successful run produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerateSummary {
    pub image: PathBuf,
    pub total_bytes: u64,
    pub sector_count: u64,
    pub entries_written: usize,
}

/// Build the fixture image described by `config`.
pub fn generate(
    config: &GeneratorConfig,
    tools: &Collaborators<'_>,
) -> Result<GenerateSummary, FixtureError> {
    config.validate()?;
    let image = &config.image;

    if let Some(dir) = image.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| FixtureError::Allocation {
            path: image.output.clone(),
            source: e.into(),
        })?;
    }

    tracing::info!(
        "allocating {} ({} sectors of {} bytes)",
        image.output.display(),
        image.sector_count(),
        image.sector_size
    );
    tools.allocator.allocate(image)?;

    tracing::info!("formatting {} as NTFS, label {:?}", image.output.display(), image.label);
    tools.formatter.format(image)?;

    let mount_point = MountPoint::provision(&config.mount, &image.output)?;
    let guard = MountGuard::acquire(
        tools.mounts,
        &image.output,
        mount_point,
        MountMode::ReadWrite,
        RetryPolicy::from(&config.mount),
    )?;

    let entries_written = populate(tools.writer, guard.path())?;
    guard.release()?;

    tracing::info!("wrote {} entries to {}", entries_written, image.output.display());
    Ok(GenerateSummary {
        image: image.output.clone(),
        total_bytes: image.total_bytes,
        sector_count: image.sector_count(),
        entries_written,
    })
}

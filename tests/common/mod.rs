// Fake collaborators shared by the integration tests. They record every call
// in a shared log so tests can assert on step order.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::io;
use std::path::Path;
use std::rc::Rc;

use ntfs_fixture::building::format::FilesystemFormatter;
use ntfs_fixture::building::image::ImageAllocator;
use ntfs_fixture::building::mount::{MountManager, MountMode};
use ntfs_fixture::building::populate::{populate, FileWriter, StdFileWriter};
use ntfs_fixture::config::ImageConfig;
use ntfs_fixture::{FixtureError, StepFailure};

pub type CallLog = Rc<RefCell<Vec<String>>>;

pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Creates a sparse file of the configured size instead of running `dd`.
pub struct FakeAllocator {
    pub log: CallLog,
}

impl ImageAllocator for FakeAllocator {
    fn allocate(&self, image: &ImageConfig) -> Result<(), FixtureError> {
        self.log.borrow_mut().push("allocate".into());
        let f = fs::File::create(&image.output).map_err(|e| FixtureError::Allocation {
            path: image.output.clone(),
            source: e.into(),
        })?;
        f.set_len(image.total_bytes).map_err(|e| FixtureError::Allocation {
            path: image.output.clone(),
            source: e.into(),
        })
    }
}

pub struct FakeFormatter {
    pub log: CallLog,
    pub fail: bool,
}

impl FilesystemFormatter for FakeFormatter {
    fn format(&self, image: &ImageConfig) -> Result<(), FixtureError> {
        self.log.borrow_mut().push(format!("format {}", image.label));
        if self.fail {
            return Err(FixtureError::Format {
                path: image.output.clone(),
                source: StepFailure::Precondition("mkntfs not installed".into()),
            });
        }
        Ok(())
    }
}

/// Pretends to mount: the mount point directory itself stands in for the
/// mounted volume.
#[derive(Default)]
pub struct FakeMounts {
    pub log: CallLog,
    pub deny_mount: bool,
    pub busy_unmounts: Cell<u32>,
    pub mounted: Cell<bool>,
    /// Lay the fixture set down in the mount point, as a generated volume would hold.
    pub populated: bool,
    /// Remove the mount point after mounting, so reading it back fails.
    pub vanish: bool,
}

impl MountManager for FakeMounts {
    fn mount(&self, _image: &Path, mount_point: &Path, mode: MountMode) -> Result<(), StepFailure> {
        self.log.borrow_mut().push(format!("mount {:?}", mode));
        if self.deny_mount {
            return Err(StepFailure::Precondition(
                "only root can use \"--options\" option".into(),
            ));
        }
        if self.populated {
            populate(&StdFileWriter, mount_point)
                .map_err(|e| StepFailure::Precondition(e.to_string()))?;
        }
        if self.vanish {
            fs::remove_dir(mount_point)?;
        }
        self.mounted.set(true);
        Ok(())
    }

    fn unmount(&self, _mount_point: &Path) -> Result<(), StepFailure> {
        self.log.borrow_mut().push("unmount".into());
        let busy = self.busy_unmounts.get();
        if busy > 0 {
            self.busy_unmounts.set(busy - 1);
            return Err(StepFailure::Precondition("target is busy".into()));
        }
        self.mounted.set(false);
        Ok(())
    }
}

/// Real writes, except that creating a symbolic link fails.
pub struct NoSymlinkWriter;

impl FileWriter for NoSymlinkWriter {
    fn create_dir(&self, path: &Path) -> io::Result<()> {
        StdFileWriter.create_dir(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        StdFileWriter.write_file(path, contents)
    }

    fn create_symlink(&self, _target: &Path, _link: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume"))
    }
}

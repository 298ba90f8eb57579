//! Attaching the image and keeping it attached only as long as needed.
//!
//! [`MountGuard`] owns both the mount and its [`MountPoint`]. Dropping the
//! guard unmounts, so every early return after a successful mount releases
//! it. If unmounting ultimately fails the mount point directory is left on
//! disk rather than removed while something is still attached to it.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use crate::building::tools;
use crate::config::{MountConfig, ToolsConfig};
use crate::errors::{FixtureError, StepFailure};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountMode {
    ReadWrite,
    ReadOnly,
}

/// Attaches image files to directories and detaches them again.
pub trait MountManager {
    fn mount(&self, image: &Path, mount_point: &Path, mode: MountMode) -> Result<(), StepFailure>;
    fn unmount(&self, mount_point: &Path) -> Result<(), StepFailure>;
}

/// Loopback mounts through `mount -o loop` / `umount`.
#[derive(Clone, Debug)]
pub struct LoopMountManager {
    mount_program: String,
    umount_program: String,
    sudo: Option<String>,
    fs_type: Option<String>,
    /// uid/gid given to the mounted files so an unprivileged caller can write.
    owner: Option<(u32, u32)>,
}

impl LoopMountManager {
    pub fn new(mount: &MountConfig, tools: &ToolsConfig) -> Self {
        let owner = mount.use_sudo.then(|| {
            (
                nix::unistd::getuid().as_raw(),
                nix::unistd::getgid().as_raw(),
            )
        });
        Self {
            mount_program: tools.mount.clone(),
            umount_program: tools.umount.clone(),
            sudo: mount.use_sudo.then(|| tools.sudo.clone()),
            fs_type: mount.fs_type.clone(),
            owner,
        }
    }

    /// The `-o` option string for `mode`.
    pub fn mount_options(&self, mode: MountMode) -> String {
        let mut opts = match mode {
            MountMode::ReadWrite => String::from("loop,rw"),
            MountMode::ReadOnly => String::from("loop,ro"),
        };
        if let Some((uid, gid)) = self.owner {
            opts.push_str(&format!(",uid={},gid={}", uid, gid));
        }
        opts
    }
}

impl MountManager for LoopMountManager {
    fn mount(&self, image: &Path, mount_point: &Path, mode: MountMode) -> Result<(), StepFailure> {
        let mut cmd = tools::command(&self.mount_program, self.sudo.as_deref());
        cmd.arg("-o").arg(self.mount_options(mode));
        if let Some(fs_type) = &self.fs_type {
            cmd.arg("-t").arg(fs_type);
        }
        cmd.arg(image).arg(mount_point);
        tools::run(cmd, &self.mount_program)
    }

    fn unmount(&self, mount_point: &Path) -> Result<(), StepFailure> {
        let mut cmd = tools::command(&self.umount_program, self.sudo.as_deref());
        cmd.arg(mount_point);
        tools::run(cmd, &self.umount_program)
    }
}

/// How many times to try unmounting and how long to wait in between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl From<&MountConfig> for RetryPolicy {
    fn from(cfg: &MountConfig) -> Self {
        Self {
            attempts: cfg.unmount_attempts.max(1),
            delay: Duration::from_millis(cfg.unmount_retry_delay_ms),
        }
    }
}

/// Directory the image is attached to.
#[derive(Debug)]
pub enum MountPoint {
    /// Fresh directory under the system temp dir, removed on drop.
    Temporary { dir: Option<TempDir>, path: PathBuf },
    /// Caller-chosen directory, left in place.
    Fixed(PathBuf),
}

impl MountPoint {
    /// Prepare the mount point for `image` according to `cfg`.
    ///
    /// A fixed mount point is created if missing and must be empty.
    pub fn provision(cfg: &MountConfig, image: &Path) -> Result<Self, FixtureError> {
        match &cfg.mount_point {
            Some(path) => {
                let fail = |source: StepFailure| FixtureError::Mount {
                    image: image.to_path_buf(),
                    mount_point: path.clone(),
                    source,
                };
                fs::create_dir_all(path).map_err(|e| fail(e.into()))?;
                let mut entries = fs::read_dir(path).map_err(|e| fail(e.into()))?;
                if entries.next().is_some() {
                    return Err(fail(StepFailure::Precondition(format!(
                        "mount point {} is not empty",
                        path.display()
                    ))));
                }
                Ok(MountPoint::Fixed(path.clone()))
            }
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("ntfs_fixture_mnt_")
                    .tempdir()
                    .map_err(|e| FixtureError::Mount {
                        image: image.to_path_buf(),
                        mount_point: std::env::temp_dir(),
                        source: e.into(),
                    })?;
                let path = dir.path().to_path_buf();
                Ok(MountPoint::Temporary {
                    dir: Some(dir),
                    path,
                })
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            MountPoint::Temporary { path, .. } => path,
            MountPoint::Fixed(path) => path,
        }
    }

    /// Stop a temporary mount point from being removed on drop.
    fn keep(&mut self) {
        if let MountPoint::Temporary { dir, .. } = self {
            if let Some(dir) = dir.take() {
                let kept = dir.keep();
                tracing::warn!("leaving mount point {} in place", kept.display());
            }
        }
    }
}

/// A mounted image. Unmounted on [`MountGuard::release`] or drop.
pub struct MountGuard<'a> {
    manager: &'a dyn MountManager,
    mount_point: MountPoint,
    retry: RetryPolicy,
    mounted: bool,
}

impl<'a> MountGuard<'a> {
    pub fn acquire(
        manager: &'a dyn MountManager,
        image: &Path,
        mount_point: MountPoint,
        mode: MountMode,
        retry: RetryPolicy,
    ) -> Result<Self, FixtureError> {
        tracing::info!(
            "mounting {} at {} ({:?})",
            image.display(),
            mount_point.path().display(),
            mode
        );
        manager
            .mount(image, mount_point.path(), mode)
            .map_err(|source| FixtureError::Mount {
                image: image.to_path_buf(),
                mount_point: mount_point.path().to_path_buf(),
                source,
            })?;
        Ok(Self {
            manager,
            mount_point,
            retry,
            mounted: true,
        })
    }

    pub fn path(&self) -> &Path {
        self.mount_point.path()
    }

    /// Unmount now and report the outcome.
    pub fn release(mut self) -> Result<(), FixtureError> {
        self.mounted = false;
        let result = unmount_with_retry(self.manager, self.mount_point.path(), self.retry);
        if result.is_err() {
            self.mount_point.keep();
        }
        result
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        if let Err(e) = unmount_with_retry(self.manager, self.mount_point.path(), self.retry) {
            tracing::error!("{:#}", anyhow::Error::from(e));
            self.mount_point.keep();
        }
    }
}

fn unmount_with_retry(
    manager: &dyn MountManager,
    mount_point: &Path,
    retry: RetryPolicy,
) -> Result<(), FixtureError> {
    let mut attempt = 1;
    loop {
        tracing::info!("unmounting {} (attempt {})", mount_point.display(), attempt);
        match manager.unmount(mount_point) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < retry.attempts => {
                tracing::warn!(
                    "unmount of {} failed: {:#}; retrying",
                    mount_point.display(),
                    anyhow::Error::from(e)
                );
                thread::sleep(retry.delay);
                attempt += 1;
            }
            Err(source) => {
                return Err(FixtureError::Unmount {
                    mount_point: mount_point.to_path_buf(),
                    source,
                })
            }
        }
    }
}

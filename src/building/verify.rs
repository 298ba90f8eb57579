//! Checks a produced image (or any directory tree) against the fixture set.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::building::mount::{MountGuard, MountManager, MountMode, MountPoint, RetryPolicy};
use crate::config::GeneratorConfig;
use crate::errors::FixtureError;
use crate::fixtures::{self, FixtureEntry, FIXTURE_SET};

/// One way in which a tree differs from the fixture set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mismatch {
    ImageSize(String),
    RootListing { expected: Vec<String>, actual: Vec<String> },
    Missing(String),
    WrongKind { path: String, expected: &'static str },
    Contents(String),
    LinkTarget { path: String, expected: String, actual: String },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::ImageSize(msg) => write!(f, "{}", msg),
            Mismatch::RootListing { expected, actual } => write!(
                f,
                "root holds [{}], expected [{}]",
                actual.join(", "),
                expected.join(", ")
            ),
            Mismatch::Missing(path) => write!(f, "{} is missing", path),
            Mismatch::WrongKind { path, expected } => write!(f, "{} is not a {}", path, expected),
            Mismatch::Contents(path) => write!(f, "{} has unexpected contents", path),
            Mismatch::LinkTarget {
                path,
                expected,
                actual,
            } => write!(f, "{} points at {}, expected {}", path, actual, expected),
        }
    }
}

/// Outcome of verifying an image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyReport {
    pub image: PathBuf,
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compare the tree under `root` with the fixture set.
///
/// NTFS metafiles (names starting with `$`) are ignored in the root listing.
pub fn verify_tree(root: &Path) -> io::Result<Vec<Mismatch>> {
    let mut mismatches = Vec::new();

    let mut actual = BTreeSet::new();
    for entry in fs::read_dir(root)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if !name.starts_with('$') {
            actual.insert(name);
        }
    }
    let expected: BTreeSet<String> = fixtures::root_names().into_iter().map(String::from).collect();
    if actual != expected {
        mismatches.push(Mismatch::RootListing {
            expected: expected.into_iter().collect(),
            actual: actual.into_iter().collect(),
        });
    }

    for entry in FIXTURE_SET {
        let rel = entry.path();
        let path = root.join(rel);
        let meta = match path.symlink_metadata() {
            Ok(m) => m,
            Err(e) if is_absent(&e) => {
                mismatches.push(Mismatch::Missing(rel.to_string()));
                continue;
            }
            Err(e) => return Err(e),
        };

        match entry {
            FixtureEntry::Directory { .. } => {
                if !meta.is_dir() {
                    mismatches.push(Mismatch::WrongKind {
                        path: rel.to_string(),
                        expected: "directory",
                    });
                }
            }
            FixtureEntry::File { contents, .. } => {
                if !meta.is_file() {
                    mismatches.push(Mismatch::WrongKind {
                        path: rel.to_string(),
                        expected: "regular file",
                    });
                } else if fs::read(&path)? != contents.as_bytes() {
                    mismatches.push(Mismatch::Contents(rel.to_string()));
                }
            }
            FixtureEntry::Symlink { target, .. } => {
                if !meta.file_type().is_symlink() {
                    mismatches.push(Mismatch::WrongKind {
                        path: rel.to_string(),
                        expected: "symbolic link",
                    });
                    continue;
                }
                let actual = fs::read_link(&path)?;
                if actual != Path::new(target) {
                    mismatches.push(Mismatch::LinkTarget {
                        path: rel.to_string(),
                        expected: target.to_string(),
                        actual: actual.display().to_string(),
                    });
                    continue;
                }
                // follow the link; only a regular file has contents to compare
                match fs::metadata(&path) {
                    Ok(m) if m.is_file() => {}
                    Ok(_) => {
                        mismatches.push(Mismatch::WrongKind {
                            path: rel.to_string(),
                            expected: "link to a regular file",
                        });
                        continue;
                    }
                    Err(e) if is_absent(&e) => {
                        mismatches.push(Mismatch::Missing(target.to_string()));
                        continue;
                    }
                    Err(e) => return Err(e),
                }
                let want = fixtures::file_contents(target).unwrap_or_default();
                match fs::read(&path) {
                    Ok(bytes) if bytes == want.as_bytes() => {}
                    Ok(_) => mismatches.push(Mismatch::Contents(rel.to_string())),
                    Err(e) if is_absent(&e) => {
                        mismatches.push(Mismatch::Missing(target.to_string()))
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    Ok(mismatches)
}

/// Not found, or a path component that should be a directory is not one.
fn is_absent(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::NotFound
        || e.raw_os_error() == Some(nix::errno::Errno::ENOTDIR as i32)
}

/// Mount the configured image read-only and verify its contents.
pub fn verify_image(
    config: &GeneratorConfig,
    mounts: &dyn MountManager,
) -> Result<VerifyReport, FixtureError> {
    let image = &config.image.output;
    let mut mismatches = Vec::new();

    let len = fs::metadata(image)
        .map_err(|source| FixtureError::Verify {
            path: image.clone(),
            source,
        })?
        .len();
    if len != config.image.total_bytes {
        mismatches.push(Mismatch::ImageSize(format!(
            "image is {} bytes, expected {}",
            len, config.image.total_bytes
        )));
    }

    let mount_point = MountPoint::provision(&config.mount, image)?;
    let guard = MountGuard::acquire(
        mounts,
        image,
        mount_point,
        MountMode::ReadOnly,
        RetryPolicy::from(&config.mount),
    )?;

    let found = verify_tree(guard.path()).map_err(|source| FixtureError::Verify {
        path: guard.path().to_path_buf(),
        source,
    })?;
    mismatches.extend(found);
    guard.release()?;

    for m in &mismatches {
        tracing::debug!("{}: {}", image.display(), m);
    }
    Ok(VerifyReport {
        image: image.clone(),
        mismatches,
    })
}

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::errors::FixtureError;
use crate::fixtures::{FixtureEntry, FIXTURE_SET};

/// Creates entries inside the mounted volume.
pub trait FileWriter {
    fn create_dir(&self, path: &Path) -> io::Result<()>;
    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
    /// Create a symbolic link at `link` that points to `target`.
    fn create_symlink(&self, target: &Path, link: &Path) -> io::Result<()>;
}

/// Writes through `std::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdFileWriter;

impl FileWriter for StdFileWriter {
    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut f = fs::File::create(path)?;
        f.write_all(contents)?;
        f.sync_all()
    }

    fn create_symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link)
        }

        #[cfg(not(unix))]
        {
            let _ = (target, link);
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "symbolic links are only created on unix hosts",
            ))
        }
    }
}

/// Write the whole fixture set under `root` in creation order.
///
/// Link targets are stored relative to the link's location, exactly as
/// listed in the fixture set. Returns the number of entries written.
pub fn populate(writer: &dyn FileWriter, root: &Path) -> Result<usize, FixtureError> {
    for entry in FIXTURE_SET {
        let path = root.join(entry.path());
        tracing::debug!("writing {}", entry.path());
        let res = match entry {
            FixtureEntry::Directory { .. } => writer.create_dir(&path),
            FixtureEntry::File { contents, .. } => writer.write_file(&path, contents.as_bytes()),
            FixtureEntry::Symlink { target, .. } => writer.create_symlink(Path::new(target), &path),
        };
        res.map_err(|source| FixtureError::Write {
            path: entry.path().into(),
            source,
        })?;
    }
    Ok(FIXTURE_SET.len())
}

//! Benchmark targets
//!
//! Each size in a sweep gets its own data file, `aio_<size>.dat`, inside the
//! target directory. The file is sized to hold every iteration at a disjoint
//! offset, is written, synced and read back, and is removed once both phases
//! have run.
//!
//! # Example
//!
//! ```no_run
//! use aiosweep::target::{prepare_directory, SizeTarget};
//! use std::path::Path;
//!
//! let dir = Path::new("/mnt/nvme");
//! prepare_directory(dir)?;
//!
//! let target = SizeTarget::create(dir, 2 * 1024 * 1024, 200, false)?;
//! let fd = target.fd();
//! // ... write phase ...
//! target.sync()?;
//! // ... read phase ...
//! target.remove()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::BenchError;
use crate::Result;
use anyhow::Context;
use std::ffi::CString;
use std::fs::{self, File, OpenOptions};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "aio_";
const FILE_SUFFIX: &str = ".dat";

/// File name used for the given operation size
pub fn file_name(size_bytes: u64) -> String {
    format!("{}{}{}", FILE_PREFIX, size_bytes, FILE_SUFFIX)
}

fn is_artifact(name: &str) -> bool {
    name.strip_prefix(FILE_PREFIX)
        .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
        .is_some_and(|size| !size.is_empty() && size.bytes().all(|b| b.is_ascii_digit()))
}

/// Create the target directory if needed and remove stale artifacts
///
/// Only files named like `aio_<size>.dat` are removed; anything else in the
/// directory is left alone. Returns the number of files removed.
pub fn prepare_directory(dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create target directory: {}", dir.display()))?;

    let mut removed = 0;
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to list target directory: {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !is_artifact(name) || !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let path = entry.path();
        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove stale file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "removed stale benchmark file");
        removed += 1;
    }

    Ok(removed)
}

/// Bytes available to unprivileged users on the filesystem holding `path`
pub fn available_space(path: &Path) -> Result<u64> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .with_context(|| format!("Path contains a NUL byte: {}", path.display()))?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: c_path is NUL-terminated and stat is a valid out-pointer
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("statvfs failed for {}", path.display()));
    }

    Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
}

/// The data file backing one size of the sweep
#[derive(Debug)]
pub struct SizeTarget {
    path: PathBuf,
    file: File,
    len: u64,
}

impl SizeTarget {
    /// Create `aio_<size_bytes>.dat` in `dir`, sized for `iterations` operations
    ///
    /// # Errors
    ///
    /// - [`BenchError::InsufficientSpace`] if the filesystem cannot hold the file
    /// - [`BenchError::Target`] if the file cannot be created or sized
    pub fn create(
        dir: &Path,
        size_bytes: u64,
        iterations: usize,
        direct: bool,
    ) -> std::result::Result<Self, BenchError> {
        let path = dir.join(file_name(size_bytes));
        let len = size_bytes.checked_mul(iterations as u64).ok_or_else(|| {
            BenchError::Config(format!(
                "{} iterations of {} bytes overflow the file size",
                iterations, size_bytes
            ))
        })?;

        let available = available_space(dir).map_err(BenchError::Target)?;
        if available < len {
            return Err(BenchError::InsufficientSpace {
                path: dir.to_path_buf(),
                required: len,
                available,
            });
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(true);
        if direct {
            options.custom_flags(libc::O_DIRECT);
        }

        let file = options
            .open(&path)
            .with_context(|| format!("Failed to open target file: {}", path.display()))
            .map_err(BenchError::Target)?;

        let target = Self { path, file, len };
        target.allocate().map_err(BenchError::Target)?;
        Ok(target)
    }

    /// Reserve the full file length up front
    ///
    /// Falls back to a plain length change on filesystems without fallocate.
    fn allocate(&self) -> Result<()> {
        if self.len == 0 {
            return Ok(());
        }

        // SAFETY: the fd is open for writing for the lifetime of self.file
        let rc = unsafe { libc::posix_fallocate(self.fd(), 0, self.len as libc::off_t) };
        match rc {
            0 => Ok(()),
            libc::EOPNOTSUPP | libc::EINVAL => self
                .file
                .set_len(self.len)
                .with_context(|| format!("Failed to size {}", self.path.display())),
            errno => Err(std::io::Error::from_raw_os_error(errno)).with_context(|| {
                format!(
                    "posix_fallocate failed: path={}, size={}",
                    self.path.display(),
                    self.len
                )
            }),
        }
    }

    pub fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the file in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flush written data to the device (fdatasync)
    pub fn sync(&self) -> std::result::Result<(), BenchError> {
        self.file
            .sync_data()
            .with_context(|| format!("fdatasync failed for {}", self.path.display()))
            .map_err(BenchError::Target)
    }

    /// Close and delete the file
    pub fn remove(self) -> std::result::Result<(), BenchError> {
        let SizeTarget { path, file, .. } = self;
        drop(file);
        fs::remove_file(&path).map_err(|source| BenchError::Cleanup { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(2_097_152), "aio_2097152.dat");
    }

    #[test]
    fn test_artifact_matching() {
        assert!(is_artifact("aio_1024.dat"));
        assert!(!is_artifact("aio_.dat"));
        assert!(!is_artifact("aio_12x.dat"));
        assert!(!is_artifact("notes.txt"));
        assert!(!is_artifact("aio_1024.dat.bak"));
    }

    #[test]
    fn test_create_sizes_file() {
        let dir = TempDir::new().unwrap();
        let target = SizeTarget::create(dir.path(), 4096, 8, false).unwrap();

        assert_eq!(target.len(), 32768);
        assert_eq!(target.path(), dir.path().join("aio_4096.dat"));
        assert_eq!(fs::metadata(target.path()).unwrap().len(), 32768);
        assert!(target.fd() >= 0);
        target.sync().unwrap();
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let target = SizeTarget::create(dir.path(), 512, 2, false).unwrap();
        let path = target.path().to_path_buf();

        target.remove().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let target = SizeTarget::create(dir.path(), 512, 2, false).unwrap();
        fs::remove_file(target.path()).unwrap();

        let err = target.remove().unwrap_err();
        assert!(matches!(err, BenchError::Cleanup { .. }));
    }

    #[test]
    fn test_insufficient_space() {
        let dir = TempDir::new().unwrap();
        let err = SizeTarget::create(dir.path(), u64::MAX / 2, 1, false).unwrap_err();
        assert!(matches!(err, BenchError::InsufficientSpace { .. }));
    }

    #[test]
    fn test_prepare_directory_removes_only_artifacts() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("bench");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("aio_4096.dat"), b"stale").unwrap();
        fs::write(root.join("aio_8192.dat"), b"stale").unwrap();
        fs::write(root.join("keep.txt"), b"keep").unwrap();

        assert_eq!(prepare_directory(&root).unwrap(), 2);
        assert!(root.join("keep.txt").exists());
        assert!(!root.join("aio_4096.dat").exists());
    }

    #[test]
    fn test_prepare_directory_creates_missing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("a").join("b");
        assert_eq!(prepare_directory(&root).unwrap(), 0);
        assert!(root.is_dir());
    }

    #[test]
    fn test_available_space() {
        let dir = TempDir::new().unwrap();
        assert!(available_space(dir.path()).unwrap() > 0);
        assert!(available_space(&dir.path().join("missing")).is_err());
    }
}

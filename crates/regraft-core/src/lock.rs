use crate::error::ErrorCode;
use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// Advisory lock errors for the map-directory lock.
#[derive(Debug)]
pub enum LockError {
    Timeout { path: PathBuf, waited: Duration },
    IoError(io::Error),
}

impl From<io::Error> for LockError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

impl LockError {
    /// Machine-readable code associated with this lock error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::IoError(_) => ErrorCode::StoreIo,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { path, waited } => {
                write!(
                    f,
                    "{}: lock timed out after {:?} at {}",
                    self.code().code(),
                    waited,
                    path.display()
                )
            }
            Self::IoError(err) => write!(f, "{}: {}", self.code().code(), err),
        }
    }
}

impl std::error::Error for LockError {}

/// RAII guard for the exclusive per-map-directory lock.
///
/// Held by a run for its whole duration so two rewrites can never
/// interleave records in one map location. The lock file sits *next to*
/// the map directory (`<dir>.lock`), keeping the directory itself free
/// of anything but records.
#[derive(Debug)]
pub struct MapLock {
    file: File,
    path: PathBuf,
}

impl MapLock {
    /// Acquire the exclusive lock guarding `map_dir`, waiting up to
    /// `timeout` for a holder to release it.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] if a holder persists past the deadline,
    /// [`LockError::IoError`] on filesystem failure.
    pub fn acquire(map_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = lock_path(map_dir);
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "lock path has no parent")
        })?;
        fs::create_dir_all(parent)?;

        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&path)?;

            if file.try_lock_exclusive().is_ok() {
                return Ok(Self { file, path });
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path,
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Explicitly release the lock. Release also happens automatically on drop.
    pub fn release(self) {
        let _ = self.file.unlock();
    }

    /// Return the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MapLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// The lock file guarding a map directory: a `.lock`-suffixed sibling.
fn lock_path(map_dir: &Path) -> PathBuf {
    let mut name = map_dir
        .file_name()
        .map_or_else(|| "map".into(), std::ffi::OsStr::to_os_string);
    name.push(".lock");
    map_dir.with_file_name(name)
}

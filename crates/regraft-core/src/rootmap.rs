//! The durable old→new root mapping.
//!
//! One record per rewritten root, stored as a file named after the old
//! id whose content is the new id. Append-only: a record is written once
//! and never modified, and re-recording an equal value is a no-op (the
//! recompute-under-race case). The directory layout keeps every record
//! independently durable — a run killed mid-flight leaves exactly the
//! records that completed, and nothing else.
//!
//! # Startup precondition
//!
//! A fresh run refuses a populated map location: partial prior state
//! cannot be trusted to come from the same run, so the conflict is
//! surfaced instead of silently merged. Reusing records across runs is
//! an explicit opt-in via [`ResumeMode::Resume`].

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use crate::error::ErrorCode;
use crate::object::{IdError, ObjectId};

/// How a run treats a pre-existing map location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumeMode {
    /// Abort if the location already holds records.
    #[default]
    Fresh,
    /// Reopen the location; the scheduler skips roots that already have
    /// a record. Records are trusted for key presence only — unmapped
    /// roots are always recomputed.
    Resume,
}

/// Errors from map operations.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The map location already holds records and the run is not resuming.
    #[error("map location {} already holds {count} records", path.display())]
    Populated {
        /// The conflicting location.
        path: PathBuf,
        /// How many records it holds.
        count: usize,
    },

    /// The map location exists but is not a directory.
    #[error("map location {} is not a directory", path.display())]
    NotADirectory {
        /// The conflicting location.
        path: PathBuf,
    },

    /// A root was recorded twice with different new ids.
    #[error("conflicting records for root {root}: {existing} vs {incoming}")]
    RecordConflict {
        /// The root with two candidate mappings.
        root: ObjectId,
        /// What the map already holds.
        existing: ObjectId,
        /// What the caller tried to record.
        incoming: ObjectId,
    },

    /// A record file's name or content failed to parse as an id.
    #[error("corrupt map record {}", path.display())]
    CorruptRecord {
        /// The unreadable record.
        path: PathBuf,
        /// Why it failed to parse.
        #[source]
        source: IdError,
    },

    /// An underlying filesystem operation failed.
    #[error("map i/o failure during {action}")]
    Io {
        /// The operation that failed.
        action: &'static str,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

impl MapError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Populated { .. } | Self::NotADirectory { .. } => ErrorCode::PreconditionConflict,
            Self::RecordConflict { .. } => ErrorCode::MapRecordConflict,
            Self::CorruptRecord { .. } => ErrorCode::MalformedObject,
            Self::Io { .. } => ErrorCode::StoreIo,
        }
    }
}

/// The durable root mapping, rooted at one directory.
#[derive(Debug)]
pub struct RootMap {
    dir: PathBuf,
}

impl RootMap {
    /// Open a map location according to `mode`.
    ///
    /// # Errors
    ///
    /// [`MapError::Populated`] under [`ResumeMode::Fresh`] when records
    /// already exist; [`MapError::NotADirectory`] when the location is a
    /// non-directory; I/O failures otherwise.
    pub fn prepare(dir: &Path, mode: ResumeMode) -> Result<Self, MapError> {
        if dir.exists() && !dir.is_dir() {
            return Err(MapError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }

        if dir.is_dir() {
            let count = count_records(dir)?;
            if count > 0 && mode == ResumeMode::Fresh {
                return Err(MapError::Populated {
                    path: dir.to_path_buf(),
                    count,
                });
            }
        } else {
            fs::create_dir_all(dir).map_err(|source| MapError::Io {
                action: "creating map directory",
                source,
            })?;
        }

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Open a map location for a fresh run. Shorthand for
    /// [`Self::prepare`] with [`ResumeMode::Fresh`].
    ///
    /// # Errors
    ///
    /// See [`Self::prepare`].
    pub fn create(dir: &Path) -> Result<Self, MapError> {
        Self::prepare(dir, ResumeMode::Fresh)
    }

    /// The map's directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record `old → new`, write-once. Recording the same pair again is
    /// a no-op; recording a *different* new id for a mapped root is a
    /// [`MapError::RecordConflict`].
    ///
    /// # Errors
    ///
    /// Conflict or I/O failure.
    pub fn record(&self, old: &ObjectId, new: &ObjectId) -> Result<(), MapError> {
        let path = self.record_path(old);
        let created = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path);

        match created {
            Ok(mut file) => {
                writeln!(file, "{new}").map_err(|source| MapError::Io {
                    action: "writing map record",
                    source,
                })?;
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let existing = read_record(&path)?;
                if &existing == new {
                    Ok(())
                } else {
                    Err(MapError::RecordConflict {
                        root: old.clone(),
                        existing,
                        incoming: new.clone(),
                    })
                }
            }
            Err(source) => Err(MapError::Io {
                action: "creating map record",
                source,
            }),
        }
    }

    /// The recorded new id for `old`, if present.
    ///
    /// # Errors
    ///
    /// Corrupt-record or I/O failure.
    pub fn lookup(&self, old: &ObjectId) -> Result<Option<ObjectId>, MapError> {
        let path = self.record_path(old);
        if path.exists() {
            read_record(&path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Whether `old` already has a record.
    #[must_use]
    pub fn contains(&self, old: &ObjectId) -> bool {
        self.record_path(old).exists()
    }

    /// Number of records currently persisted.
    ///
    /// # Errors
    ///
    /// I/O failure while listing the directory.
    pub fn len(&self) -> Result<usize, MapError> {
        count_records(&self.dir)
    }

    /// Whether no records are persisted.
    ///
    /// # Errors
    ///
    /// I/O failure while listing the directory.
    pub fn is_empty(&self) -> Result<bool, MapError> {
        Ok(self.len()? == 0)
    }

    /// Read the whole mapping into memory (for the ancestry pass).
    ///
    /// # Errors
    ///
    /// Corrupt-record or I/O failure.
    pub fn load(&self) -> Result<HashMap<ObjectId, ObjectId>, MapError> {
        let mut mapping = HashMap::new();
        for path in record_paths(&self.dir)? {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let old = ObjectId::from_hex(&name).map_err(|source| MapError::CorruptRecord {
                path: path.clone(),
                source,
            })?;
            let new = read_record(&path)?;
            mapping.insert(old, new);
        }
        Ok(mapping)
    }

    fn record_path(&self, old: &ObjectId) -> PathBuf {
        self.dir.join(old.as_str())
    }
}

fn read_record(path: &Path) -> Result<ObjectId, MapError> {
    let content = fs::read_to_string(path).map_err(|source| MapError::Io {
        action: "reading map record",
        source,
    })?;
    ObjectId::from_hex(content.trim()).map_err(|source| MapError::CorruptRecord {
        path: path.to_path_buf(),
        source,
    })
}

fn record_paths(dir: &Path) -> Result<Vec<PathBuf>, MapError> {
    let listing = fs::read_dir(dir).map_err(|source| MapError::Io {
        action: "listing map directory",
        source,
    })?;
    let mut paths = Vec::new();
    for item in listing {
        let item = item.map_err(|source| MapError::Io {
            action: "listing map directory",
            source,
        })?;
        // Dot-files are operational clutter, not records.
        if item.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        paths.push(item.path());
    }
    Ok(paths)
}

fn count_records(dir: &Path) -> Result<usize, MapError> {
    Ok(record_paths(dir)?.len())
}

//! Finding, reading and retiring the simulator's mission report files.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use thiserror::Error;

/// A report holding only the version header is exactly this long.
pub const VERSION_STUB_LEN: u64 = 21;

#[derive(Debug, Error)]
pub enum LogSourceError {
    #[error("invalid mission log pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("failed to read mission log {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove mission log {path:?}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Files matching `pattern`, oldest first. Equal mtimes fall back to path order.
pub fn pending_log_files(pattern: &str) -> Result<Vec<PathBuf>, LogSourceError> {
    let entries = glob::glob(pattern).map_err(|source| LogSourceError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(
                    target: "arcade::session",
                    path = %err.path().display(),
                    error = %err.error(),
                    "log_source.entry_unreadable"
                );
                continue;
            }
        };
        // The simulator may delete or rotate a file between glob and stat.
        let Ok(metadata) = fs::metadata(&path) else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((modified, path));
    }
    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// The contents of one report as read so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogLines {
    /// Lines terminated by a newline.
    pub complete: Vec<String>,
    /// Trailing text with no newline yet. The simulator may still be writing it.
    pub partial: Option<String>,
}

impl LogLines {
    pub fn split(text: &str) -> Self {
        let (complete, tail): (Vec<String>, &str) = match text.rfind('\n') {
            Some(end) => (
                text[..end]
                    .split('\n')
                    .map(|line| line.trim_end_matches('\r').to_string())
                    .collect(),
                &text[end + 1..],
            ),
            None => (Vec::new(), text),
        };
        let tail = tail.trim_end_matches('\r');
        Self {
            complete,
            partial: (!tail.is_empty()).then(|| tail.to_string()),
        }
    }
}

/// Every line of a report; invalid UTF-8 is replaced rather than rejected.
pub fn read_log_lines(path: &Path) -> Result<LogLines, LogSourceError> {
    let bytes = fs::read(path).map_err(|source| LogSourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(LogLines::split(&String::from_utf8_lossy(&bytes)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetirePolicy {
    pub archive: bool,
    pub backup_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retired {
    Deleted,
    ArchivedAndDeleted,
    /// Still held open by the simulator; try again next cycle.
    InUse,
    Missing,
}

impl Retired {
    pub fn is_gone(self) -> bool {
        !matches!(self, Retired::InUse)
    }
}

/// Copies the report into the backup directory when archiving applies, then
/// deletes it. A failed copy is logged and the delete still happens.
pub fn retire_log_file(path: &Path, policy: &RetirePolicy) -> Result<Retired, LogSourceError> {
    let mut archived = false;
    if policy.archive {
        match fs::metadata(path) {
            Ok(metadata) if should_archive(metadata.len()) => {
                archived = archive(path, &policy.backup_dir);
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Retired::Missing),
            Err(_) => {}
        }
    }

    match fs::remove_file(path) {
        Ok(()) if archived => Ok(Retired::ArchivedAndDeleted),
        Ok(()) => Ok(Retired::Deleted),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Retired::Missing),
        Err(err) if is_in_use(&err) => {
            tracing::debug!(
                target: "arcade::session",
                path = %path.display(),
                "log_source.file_in_use"
            );
            Ok(Retired::InUse)
        }
        Err(source) => Err(LogSourceError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn should_archive(len: u64) -> bool {
    len != 0 && len != VERSION_STUB_LEN
}

fn archive(path: &Path, backup_dir: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let result = fs::create_dir_all(backup_dir).and_then(|_| fs::copy(path, backup_dir.join(name)));
    match result {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(
                target: "arcade::session",
                path = %path.display(),
                backup_dir = %backup_dir.display(),
                error = %err,
                "log_source.archive_failed"
            );
            false
        }
    }
}

fn is_in_use(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    // ERROR_SHARING_VIOLATION
    cfg!(windows) && err.raw_os_error() == Some(32)
}

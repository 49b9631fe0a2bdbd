use crate::error::ScanError;
use chrono::{DateTime, Local};

/// One plain file directly inside a scanned folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Local>,
}

/// Per-subdirectory aggregate.
///
/// `size` covers the whole subtree while `files` only lists the folder's
/// immediate files, so `size >= listed_bytes()` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSummary {
    pub name: String,
    pub size: u64,
    pub files: Vec<FileEntry>,
}

impl FolderSummary {
    #[must_use]
    pub fn listed_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub generated_at: DateTime<Local>,
    pub folders: Vec<FolderSummary>,
}

impl Report {
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.folders.iter().map(|f| f.size).sum()
    }
}

/// A best-effort value together with the errors that were skipped to get it.
#[derive(Debug)]
pub struct Partial<T> {
    pub value: T,
    pub errors: Vec<ScanError>,
}

impl<T> Partial<T> {
    pub fn new(value: T) -> Self {
        Partial {
            value,
            errors: Vec::new(),
        }
    }

    /// Logs and keeps a suppressed error.
    pub fn record(&mut self, err: ScanError) {
        log::warn!("skipping entry: {err}");
        self.errors.push(err);
    }

    /// Takes over the other partial's errors and hands back its value.
    pub fn absorb<U>(&mut self, other: Partial<U>) -> U {
        self.errors.extend(other.errors);
        other.value
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Partial<U> {
        Partial {
            value: f(self.value),
            errors: self.errors,
        }
    }
}

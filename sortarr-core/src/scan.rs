use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::entry::{Entry, EntryKind, FileRecord, file_entry};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("watch root does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("watch root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Enumerates one watched root into a snapshot of top-level entries.
///
/// Re-run from scratch every cycle; there is no incremental diffing. The
/// scanner is read-only.
#[derive(Debug, Clone)]
pub struct Scanner {
    /// Whether to follow symbolic links while walking directory entries.
    pub follow_links: bool,
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            follow_links: false,
        }
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Scan one watched root. Each immediate child becomes one [`Entry`]:
    /// files directly, directories via a recursive walk. Children whose
    /// names start with a dot are skipped, as are directories that turn out
    /// to contain no files at all.
    ///
    /// Entries come back sorted by name so processing order is
    /// deterministic.
    pub fn scan(&self, root: &Path) -> Result<Vec<Entry>, ScanError> {
        if !root.exists() {
            return Err(ScanError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut children: Vec<PathBuf> = Vec::new();
        for dirent in fs::read_dir(root)? {
            let dirent = dirent?;
            if is_hidden(&dirent.file_name().to_string_lossy()) {
                continue;
            }
            children.push(dirent.path());
        }
        children.sort();

        let mut entries = Vec::with_capacity(children.len());
        for child in children {
            let meta = fs::metadata(&child)?;
            if meta.is_dir() {
                match self.scan_directory_entry(&child)? {
                    Some(entry) => entries.push(entry),
                    None => debug!(path = %child.display(), "skipping file-less directory"),
                }
            } else if let Some(entry) = file_entry(&child, meta.len()) {
                entries.push(entry);
            } else {
                warn!(path = %child.display(), "skipping child with non-UTF-8 name");
            }
        }

        debug!(
            root = %root.display(),
            entries = entries.len(),
            "scan complete"
        );
        Ok(entries)
    }

    /// A walk or stat failure anywhere under the directory fails the whole
    /// scan. An entry missing one of its real files must never reach the
    /// pipeline: it could be relocated and its source directory removed
    /// with the uninventoried file still inside.
    fn scan_directory_entry(&self, dir: &Path) -> Result<Option<Entry>, ScanError> {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %dir.display(), "skipping directory with non-UTF-8 name");
            return Ok(None);
        };
        let mut files = Vec::new();

        for dirent in WalkDir::new(dir)
            .follow_links(self.follow_links)
            .sort_by_file_name()
        {
            let dirent = dirent?;
            if !dirent.file_type().is_file() {
                continue;
            }
            if is_hidden(&dirent.file_name().to_string_lossy()) {
                continue;
            }
            let size = dirent.metadata()?.len();
            let relative = dirent
                .path()
                .strip_prefix(dir)
                .expect("walked path is under its own root")
                .to_path_buf();
            files.push(FileRecord::from_path(relative, size));
        }

        if files.is_empty() {
            return Ok(None);
        }
        Ok(Some(Entry {
            name: name.to_string(),
            path: dir.to_path_buf(),
            kind: EntryKind::Directory,
            files,
        }))
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

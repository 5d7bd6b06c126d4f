use std::path::{Path, PathBuf};

/// What a scanned top-level child of a watched root is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One file discovered inside an [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the entry's own root. For a file entry this is just
    /// the file name.
    pub relative_path: PathBuf,
    /// Base name with the extension stripped.
    pub stem: String,
    /// Extension including the leading dot, or empty when the file has none.
    pub extension: String,
    /// Size in bytes.
    pub size: u64,
}

impl FileRecord {
    pub fn from_path(relative_path: PathBuf, size: u64) -> Self {
        let stem = relative_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let extension = relative_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        Self {
            relative_path,
            stem,
            extension,
            size,
        }
    }
}

/// One unit of reconciliation work: a top-level file or a top-level
/// directory (walked recursively) under a watched root.
///
/// Entries are rebuilt from scratch every scan cycle; identity across cycles
/// comes from [`Entry::stable_key`], not from any persisted id.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The entry's own name relative to the watched root.
    pub name: String,
    /// Absolute path of the entry itself.
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Never empty once the entry is accepted into the pipeline.
    pub files: Vec<FileRecord>,
}

impl Entry {
    /// Stable key used by the retry scheduler across cycles: the first
    /// file's base name. Falls back to the entry name for safety, though the
    /// scanner never emits a file-less entry.
    pub fn stable_key(&self) -> &str {
        self.files
            .first()
            .map(|f| f.stem.as_str())
            .unwrap_or(&self.name)
    }

    /// The single record of a file entry, if this is one.
    pub fn single_file(&self) -> Option<&FileRecord> {
        match (self.kind, self.files.as_slice()) {
            (EntryKind::File, [record]) => Some(record),
            _ => None,
        }
    }

    /// Absolute path of one of the entry's files.
    pub fn absolute_path(&self, record: &FileRecord) -> PathBuf {
        match self.kind {
            EntryKind::File => self.path.clone(),
            EntryKind::Directory => self.path.join(&record.relative_path),
        }
    }
}

/// Builds a one-record entry for a top-level file.
pub(crate) fn file_entry(path: &Path, size: u64) -> Option<Entry> {
    let name = path.file_name()?.to_str()?.to_string();
    let record = FileRecord::from_path(PathBuf::from(&name), size);
    Some(Entry {
        name,
        path: path.to_path_buf(),
        kind: EntryKind::File,
        files: vec![record],
    })
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::entry::{Entry, EntryKind};
use crate::error::MatchError;
use crate::resolve::Identity;

/// One structured old-path → new-path pair. A batch of records is the unit
/// of work submitted for one entry; each record moves independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationRecord {
    pub source: PathBuf,
    pub target: PathBuf,
}

impl RelocationRecord {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Replace characters unsafe for common filesystems with a space, then
/// collapse and trim the result.
pub fn escape_segment(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' | '*' | '?' | '"' | '<' | '>' | '|' => ' ',
            other => other,
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title-level directory segment: `"{title} ({year}) [id-{id}]"`.
pub fn title_dir(identity: &Identity) -> String {
    format!(
        "{} ({}) [id-{}]",
        escape_segment(&identity.title),
        identity.year,
        identity.id
    )
}

/// Season segment nested under the title directory.
pub fn season_dir(season: u32) -> String {
    format!("Season {season}")
}

/// Canonical leaf name: zero-padded season/episode, optional subtitle
/// language tag, original extension preserved.
pub fn episode_file_name(season: u32, episode: u32, lang: Option<&str>, ext: &str) -> String {
    match lang {
        Some(lang) => format!("S{season:02}E{episode:02}.{lang}{ext}"),
        None => format!("S{season:02}E{episode:02}{ext}"),
    }
}

/// Movie leaf name: escaped title plus year, original extension preserved.
pub fn movie_file_name(identity: &Identity, ext: &str) -> String {
    format!(
        "{} ({}){}",
        escape_segment(&identity.title),
        identity.year,
        ext
    )
}

/// Performs the filesystem mutation: directory creation with inherited
/// permission bits, collision check, move. Never overwrites.
#[derive(Debug, Clone)]
pub struct Relocator {
    root: PathBuf,
}

impl Relocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The canonical library root all target paths nest under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Target path for one series episode file.
    pub fn episode_target(
        &self,
        identity: &Identity,
        season: u32,
        episode: u32,
        lang: Option<&str>,
        ext: &str,
    ) -> PathBuf {
        self.root
            .join(title_dir(identity))
            .join(season_dir(season))
            .join(episode_file_name(season, episode, lang, ext))
    }

    /// Target path for one movie file.
    pub fn movie_target(&self, identity: &Identity, ext: &str) -> PathBuf {
        self.root
            .join(title_dir(identity))
            .join(movie_file_name(identity, ext))
    }

    /// Process a batch record-by-record. A failure on one record does not
    /// roll back records already moved; the entry stays partially relocated
    /// and is retried on a later cycle.
    pub fn relocate(&self, batch: &[RelocationRecord]) -> Result<(), MatchError> {
        for record in batch {
            if !record.source.exists() {
                return Err(MatchError::SourceMissing(record.source.clone()));
            }
            if let Some(parent) = record.target.parent() {
                create_dirs_inheriting(parent)?;
            }
            if record.target.exists() {
                return Err(MatchError::Collision(record.target.clone()));
            }
            fs::rename(&record.source, &record.target)?;
            info!(
                from = %record.source.display(),
                to = %record.target.display(),
                "relocated"
            );
        }
        Ok(())
    }

    /// Delete the now-exhausted source directory of a fully relocated
    /// directory entry. File entries have nothing left to clean up.
    pub fn remove_spent_entry(&self, entry: &Entry) -> io::Result<()> {
        if entry.kind != EntryKind::Directory {
            return Ok(());
        }
        debug!(path = %entry.path.display(), "removing spent entry");
        fs::remove_dir_all(&entry.path)
    }
}

/// Create every missing level of `dir`, giving new levels the permission
/// bits of the nearest existing ancestor.
fn create_dirs_inheriting(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        return Ok(());
    }

    let mut existing = dir;
    let mut missing: Vec<&Path> = Vec::new();
    while !existing.exists() {
        missing.push(existing);
        existing = existing.parent().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no existing ancestor for {}", dir.display()),
            )
        })?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
        let mode = fs::metadata(existing)?.permissions().mode() & 0o7777;
        let mut builder = fs::DirBuilder::new();
        builder.mode(mode);
        for level in missing.iter().rev() {
            match builder.create(level) {
                Ok(()) => {}
                // Racing another worker on a shared parent level is fine.
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => {
                    warn!(path = %level.display(), error = %e, "mkdir failed");
                    return Err(e);
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::FileRecord;
    use tempfile::TempDir;

    fn identity() -> Identity {
        Identity {
            title: "Show".into(),
            language: "ja".into(),
            id: 5001,
            adult: false,
            year: 2021,
            season: None,
            episode: None,
        }
    }

    #[test]
    fn escape_replaces_unsafe_characters() {
        assert_eq!(escape_segment("Re:Zero"), "Re Zero");
        assert_eq!(escape_segment("a/b\\c*d?e\"f<g>h|i"), "a b c d e f g h i");
        assert_eq!(escape_segment("  padded  "), "padded");
    }

    #[test]
    fn template_segments() {
        let id = identity();
        assert_eq!(title_dir(&id), "Show (2021) [id-5001]");
        assert_eq!(season_dir(1), "Season 1");
        assert_eq!(episode_file_name(1, 10, None, ".mp4"), "S01E10.mp4");
        assert_eq!(episode_file_name(1, 3, Some("sc"), ".srt"), "S01E03.sc.srt");
        assert_eq!(episode_file_name(12, 104, None, ".mkv"), "S12E104.mkv");
    }

    #[test]
    fn episode_target_nests_title_then_season() {
        let relocator = Relocator::new("/library");
        let target = relocator.episode_target(&identity(), 1, 10, None, ".mp4");
        assert_eq!(
            target,
            PathBuf::from("/library/Show (2021) [id-5001]/Season 1/S01E10.mp4")
        );
    }

    #[test]
    fn relocate_moves_and_creates_directories() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("inbox/ep.mp4");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"video").unwrap();

        let target = temp.path().join("lib/Show (2021) [id-5001]/Season 1/S01E10.mp4");
        let relocator = Relocator::new(temp.path().join("lib"));
        relocator
            .relocate(&[RelocationRecord::new(&source, &target)])
            .unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read(&target).unwrap(), b"video");
    }

    #[test]
    fn relocate_never_clobbers() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("ep.mp4");
        let target = temp.path().join("existing.mp4");
        fs::write(&source, b"new").unwrap();
        fs::write(&target, b"old").unwrap();

        let relocator = Relocator::new(temp.path());
        let err = relocator
            .relocate(&[RelocationRecord::new(&source, &target)])
            .unwrap_err();

        assert!(matches!(err, MatchError::Collision(_)));
        assert!(err.is_fatal());
        // Source untouched, target untouched.
        assert_eq!(fs::read(&source).unwrap(), b"new");
        assert_eq!(fs::read(&target).unwrap(), b"old");
    }

    #[test]
    fn relocate_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let relocator = Relocator::new(temp.path());
        let err = relocator
            .relocate(&[RelocationRecord::new(
                temp.path().join("ghost.mp4"),
                temp.path().join("out.mp4"),
            )])
            .unwrap_err();
        assert!(matches!(err, MatchError::SourceMissing(_)));
    }

    #[test]
    fn batch_failure_keeps_earlier_moves() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.mp4");
        let b = temp.path().join("b.mp4");
        let occupied = temp.path().join("occupied.mp4");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        fs::write(&occupied, b"x").unwrap();

        let relocator = Relocator::new(temp.path());
        let batch = vec![
            RelocationRecord::new(&a, temp.path().join("moved-a.mp4")),
            RelocationRecord::new(&b, &occupied),
        ];
        let err = relocator.relocate(&batch).unwrap_err();

        assert!(matches!(err, MatchError::Collision(_)));
        // First record stays moved; the failed one stays at its source.
        assert!(temp.path().join("moved-a.mp4").exists());
        assert!(!a.exists());
        assert!(b.exists());
    }

    #[cfg(unix)]
    #[test]
    fn created_directories_inherit_parent_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let parent = temp.path().join("lib");
        fs::create_dir(&parent).unwrap();
        fs::set_permissions(&parent, fs::Permissions::from_mode(0o750)).unwrap();

        create_dirs_inheriting(&parent.join("Show (2021) [id-5001]/Season 1")).unwrap();

        let mode = fs::metadata(parent.join("Show (2021) [id-5001]"))
            .unwrap()
            .permissions()
            .mode()
            & 0o7777;
        assert_eq!(mode, 0o750);
    }

    #[test]
    fn remove_spent_entry_only_touches_directories() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pack");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("leftover.nfo"), b"x").unwrap();

        let relocator = Relocator::new(temp.path());
        let entry = Entry {
            name: "pack".into(),
            path: dir.clone(),
            kind: EntryKind::Directory,
            files: vec![FileRecord::from_path(PathBuf::from("leftover.nfo"), 1)],
        };
        relocator.remove_spent_entry(&entry).unwrap();
        assert!(!dir.exists());

        let file = temp.path().join("single.mp4");
        fs::write(&file, b"x").unwrap();
        let entry = Entry {
            name: "single.mp4".into(),
            path: file.clone(),
            kind: EntryKind::File,
            files: vec![FileRecord::from_path(PathBuf::from("single.mp4"), 1)],
        };
        relocator.remove_spent_entry(&entry).unwrap();
        assert!(file.exists());
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::entry::{Entry, EntryKind, FileRecord};
use crate::error::MatchError;
use crate::matcher::{MatchContext, Recognizer};
use crate::provider::TitleKind;
use crate::recognizers::patterns::{PatternSet, explicit_id_marker};
use crate::recognizers::{
    default_episode_patterns, is_media_ext, is_sidecar_ext, is_subtitle_ext, subtitle_lang_tag,
};
use crate::relocate::RelocationRecord;
use crate::resolve::{Identity, OverrideTarget, TitleQuery};

/// Recognizer for conventions that publish a whole directory of episodes
/// (and usually subtitles and sidecar junk) per entry.
#[derive(Debug)]
pub struct SeasonPackRecognizer {
    name: String,
    priority: i32,
    /// Applied to the directory name to pull out the title (and maybe
    /// season).
    dir_patterns: PatternSet,
    /// Applied to each file stem to pull out season/episode numbers.
    file_patterns: PatternSet,
    overrides: HashMap<String, OverrideTarget>,
}

/// How one file in the pack was classified.
#[derive(Debug)]
enum FileClass<'a> {
    Episode {
        record: &'a FileRecord,
        season: Option<u32>,
        episode: u32,
    },
    Subtitle {
        record: &'a FileRecord,
        season: Option<u32>,
        episode: u32,
        lang: Option<&'a str>,
    },
    /// Samples, ads, sidecar metadata. Excluded from relocation.
    Ignorable,
    /// Could not be classified. Any of these fails the whole attempt.
    Unknown(&'a FileRecord),
}

impl SeasonPackRecognizer {
    pub fn new<S: AsRef<str>>(
        name: impl Into<String>,
        priority: i32,
        dir_exprs: &[S],
        file_exprs: &[S],
        overrides: HashMap<String, OverrideTarget>,
    ) -> Result<Self, MatchError> {
        let file_patterns = if file_exprs.is_empty() {
            PatternSet::compile(&default_episode_patterns())?
        } else {
            PatternSet::compile(file_exprs)?
        };
        Ok(Self {
            name: name.into(),
            priority,
            dir_patterns: PatternSet::compile(dir_exprs)?,
            file_patterns,
            overrides,
        })
    }

    fn classify<'a>(
        &self,
        record: &'a FileRecord,
        min_episode_bytes: u64,
    ) -> Result<FileClass<'a>, MatchError> {
        if is_media_ext(&record.extension) {
            if record.size < min_episode_bytes {
                // Too small to be an episode: sample or ad filler.
                return Ok(FileClass::Ignorable);
            }
            return Ok(match self.file_patterns.extract(&record.stem)? {
                Some(ex) if ex.episode.is_some() => FileClass::Episode {
                    record,
                    season: ex.season,
                    episode: ex.episode.expect("checked above"),
                },
                _ => FileClass::Unknown(record),
            });
        }
        if is_subtitle_ext(&record.extension) {
            let lang = subtitle_lang_tag(&record.stem);
            // Strip the language token before matching episode numbers.
            let stem = match lang {
                Some(tag) => record
                    .stem
                    .strip_suffix(&format!(".{tag}"))
                    .unwrap_or(&record.stem),
                None => record.stem.as_str(),
            };
            return Ok(match self.file_patterns.extract(stem)? {
                Some(ex) if ex.episode.is_some() => FileClass::Subtitle {
                    record,
                    season: ex.season,
                    episode: ex.episode.expect("checked above"),
                    lang,
                },
                _ => FileClass::Unknown(record),
            });
        }
        if is_sidecar_ext(&record.extension) {
            return Ok(FileClass::Ignorable);
        }
        Ok(FileClass::Unknown(record))
    }

    fn build_batch(
        &self,
        entry: &Entry,
        identity: &Identity,
        dir_season: u32,
        classes: &[FileClass<'_>],
        cx: &MatchContext,
    ) -> Vec<RelocationRecord> {
        let mut batch = Vec::new();
        for class in classes {
            match class {
                FileClass::Episode {
                    record,
                    season,
                    episode,
                } => {
                    let season = season.unwrap_or(dir_season);
                    let target = cx.relocator.episode_target(
                        identity,
                        season,
                        *episode,
                        None,
                        &record.extension,
                    );
                    batch.push(RelocationRecord::new(entry.absolute_path(record), target));
                }
                FileClass::Subtitle {
                    record,
                    season,
                    episode,
                    lang,
                } => {
                    let season = season.unwrap_or(dir_season);
                    let target = cx.relocator.episode_target(
                        identity,
                        season,
                        *episode,
                        *lang,
                        &record.extension,
                    );
                    batch.push(RelocationRecord::new(entry.absolute_path(record), target));
                }
                FileClass::Ignorable | FileClass::Unknown(_) => {}
            }
        }
        batch
    }
}

#[async_trait]
impl Recognizer for SeasonPackRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn recognize(&self, entry: &Entry, cx: &MatchContext) -> Result<bool, MatchError> {
        if entry.kind != EntryKind::Directory {
            return Ok(false);
        }

        let extraction = self.dir_patterns.extract(&entry.name)?;
        let explicit_id = explicit_id_marker(&entry.name)
            .map(|(_, id)| id)
            .or_else(|| extraction.as_ref().and_then(|e| e.tmdb_id));
        if explicit_id.is_none()
            && extraction.as_ref().and_then(|e| e.title.as_deref()).is_none()
        {
            return Ok(false);
        }

        let raw_title = extraction
            .as_ref()
            .and_then(|e| e.title.clone())
            .unwrap_or_default();
        let query = TitleQuery {
            kind: TitleKind::Series,
            raw_title: &raw_title,
            explicit_id,
            year_hint: extraction.as_ref().and_then(|e| e.year),
        };
        let mut identity = cx
            .resolver
            .resolve(cx.provider.as_ref(), &query, &self.overrides)
            .await?;

        let dir_season = extraction
            .as_ref()
            .and_then(|e| e.season)
            .or(identity.season)
            .unwrap_or(1);
        identity.season = Some(dir_season);

        // Classify everything before touching anything: one unclassified
        // file vetoes the whole batch.
        let mut classes = Vec::with_capacity(entry.files.len());
        for record in &entry.files {
            classes.push(self.classify(record, cx.min_episode_bytes)?);
        }
        let unknown: Vec<&str> = classes
            .iter()
            .filter_map(|c| match c {
                FileClass::Unknown(record) => Some(record.stem.as_str()),
                _ => None,
            })
            .collect();
        if !unknown.is_empty() {
            warn!(
                recognizer = %self.name,
                key = entry.stable_key(),
                files = ?unknown,
                "pack contains unclassified files, relocating nothing"
            );
            return Err(MatchError::UnclassifiedFiles(entry.name.clone()));
        }

        let batch = self.build_batch(entry, &identity, dir_season, &classes, cx);
        if batch.is_empty() {
            // Nothing but sidecars and samples; not a pack we handle.
            return Ok(false);
        }

        cx.relocator.relocate(&batch)?;
        info!(
            recognizer = %self.name,
            key = entry.stable_key(),
            id = identity.id,
            files = batch.len(),
            "pack relocated"
        );
        if let Err(e) = cx.relocator.remove_spent_entry(entry) {
            // Non-fatal: the empty husk will be rescanned and retried.
            warn!(
                key = entry.stable_key(),
                error = %e,
                "failed to remove spent entry"
            );
        }
        Ok(true)
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::info;

use crate::entry::Entry;
use crate::error::MatchError;
use crate::matcher::{MatchContext, Recognizer};
use crate::provider::TitleKind;
use crate::recognizers::patterns::{PatternSet, explicit_id_marker};
use crate::recognizers::is_media_ext;
use crate::relocate::RelocationRecord;
use crate::resolve::{OverrideTarget, TitleQuery};

/// Recognizer for conventions that publish one media file per entry, e.g.
/// `"[ANi] Show - 10 [1080p].mp4"`.
///
/// Construction compiles and validates the expression set, so a
/// misconfigured convention fails at startup rather than mid-cycle.
#[derive(Debug)]
pub struct SingleFileRecognizer {
    name: String,
    priority: i32,
    patterns: PatternSet,
    overrides: HashMap<String, OverrideTarget>,
}

impl SingleFileRecognizer {
    pub fn new<S: AsRef<str>>(
        name: impl Into<String>,
        priority: i32,
        exprs: &[S],
        overrides: HashMap<String, OverrideTarget>,
    ) -> Result<Self, MatchError> {
        Ok(Self {
            name: name.into(),
            priority,
            patterns: PatternSet::compile(exprs)?,
            overrides,
        })
    }
}

#[async_trait]
impl Recognizer for SingleFileRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn recognize(&self, entry: &Entry, cx: &MatchContext) -> Result<bool, MatchError> {
        // Structural precheck: exactly one file with a media extension.
        let Some(record) = entry.single_file() else {
            return Ok(false);
        };
        if !is_media_ext(&record.extension) {
            return Ok(false);
        }

        let extraction = self.patterns.extract(&record.stem)?;
        let marker = explicit_id_marker(&record.stem);

        // The free-form marker wins; a `tmdbid` capture group is the
        // convention's own way of publishing the id.
        let (kind, explicit_id) = match marker {
            Some((kind, id)) => (kind, Some(id)),
            None => (
                TitleKind::Series,
                extraction.as_ref().and_then(|e| e.tmdb_id),
            ),
        };
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
            kind,
            raw_title: &raw_title,
            explicit_id,
            year_hint: extraction.as_ref().and_then(|e| e.year),
        };
        let mut identity = cx
            .resolver
            .resolve(cx.provider.as_ref(), &query, &self.overrides)
            .await?;

        let target = match kind {
            TitleKind::Series => {
                let Some(episode) = extraction.as_ref().and_then(|e| e.episode) else {
                    // A series file without an episode number is not ours.
                    return Ok(false);
                };
                let season = extraction
                    .as_ref()
                    .and_then(|e| e.season)
                    .or(identity.season)
                    .unwrap_or(1);
                identity.season = Some(season);
                identity.episode = Some(episode);
                cx.relocator
                    .episode_target(&identity, season, episode, None, &record.extension)
            }
            TitleKind::Movie => cx.relocator.movie_target(&identity, &record.extension),
        };

        cx.relocator
            .relocate(&[RelocationRecord::new(entry.path.clone(), target.clone())])?;
        info!(
            recognizer = %self.name,
            key = entry.stable_key(),
            id = identity.id,
            target = %target.display(),
            "entry relocated"
        );
        Ok(true)
    }
}

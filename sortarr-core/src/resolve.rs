use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::MatchError;
use crate::provider::{MetadataProvider, ProviderError, TitleDetails, TitleKind};

/// Canonical resolved metadata for one title. Season/episode are filled in
/// per-file by the recognizer after the title-level identity is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub title: String,
    pub language: String,
    /// External numeric id; always > 0 once resolved.
    pub id: u64,
    pub adult: bool,
    /// Four-digit year, never below the configured minimum.
    pub year: u16,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// Operator-curated override: a verbatim title mapped straight to an id,
/// optionally pinning the season.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideTarget {
    pub id: u64,
    pub season: Option<u32>,
}

/// What a recognizer pulled out of a file or directory name.
#[derive(Debug, Clone)]
pub struct TitleQuery<'a> {
    pub kind: TitleKind,
    pub raw_title: &'a str,
    /// Explicit external id marker found in the name, if any.
    pub explicit_id: Option<u64>,
    pub year_hint: Option<u16>,
}

/// Turns filename fragments into an [`Identity`], via the explicit-id fast
/// path or fuzzy name search with a uniqueness requirement.
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver {
    min_valid_year: u16,
}

impl IdentityResolver {
    pub fn new(min_valid_year: u16) -> Self {
        Self { min_valid_year }
    }

    /// Resolution policy, in priority order:
    /// 1. explicit id — a miss is fatal, the id was a positive claim;
    /// 2. override table hit on the verbatim extracted title;
    /// 3. normalized name search, which must return exactly one candidate.
    pub async fn resolve(
        &self,
        provider: &dyn MetadataProvider,
        query: &TitleQuery<'_>,
        overrides: &HashMap<String, OverrideTarget>,
    ) -> Result<Identity, MatchError> {
        if let Some(id) = query.explicit_id {
            let details = provider.details(query.kind, id).await.map_err(|e| match e {
                ProviderError::NotFound => MatchError::IdLookupFailed(id),
                other => MatchError::Provider(other),
            })?;
            return self.identity_from(details, None);
        }

        let raw = query.raw_title.trim();
        if let Some(target) = overrides.get(raw) {
            debug!(title = raw, id = target.id, "override table hit");
            let details = provider
                .details(query.kind, target.id)
                .await
                .map_err(|e| match e {
                    ProviderError::NotFound => MatchError::IdLookupFailed(target.id),
                    other => MatchError::Provider(other),
                })?;
            return self.identity_from(details, target.season);
        }

        let needle = normalize_title(raw);
        if needle.is_empty() {
            return Err(MatchError::TitleNotFound(raw.to_string()));
        }
        let page = provider
            .search(query.kind, &needle, query.year_hint)
            .await?;
        match page.total_results {
            0 => Err(MatchError::TitleNotFound(needle)),
            1 => {
                let details = page
                    .results
                    .into_iter()
                    .next()
                    .ok_or_else(|| MatchError::TitleNotFound(needle))?;
                self.identity_from(details, None)
            }
            n => Err(MatchError::TitleAmbiguous {
                title: needle,
                candidates: n,
            }),
        }
    }

    fn identity_from(
        &self,
        details: TitleDetails,
        season: Option<u32>,
    ) -> Result<Identity, MatchError> {
        if details.id == 0 {
            return Err(MatchError::TitleNotFound(details.original_title));
        }
        let year = self.parse_year(&details.release_date)?;
        Ok(Identity {
            title: details.original_title,
            language: details.original_language,
            id: details.id,
            adult: details.adult,
            year,
            season,
            episode: None,
        })
    }

    /// Year component of a `YYYY-MM-DD` release/air date. A date that does
    /// not parse, or a year before the configured minimum, fails the
    /// resolution.
    fn parse_year(&self, date: &str) -> Result<u16, MatchError> {
        let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| MatchError::BadReleaseDate(date.to_string()))?;
        let year = parsed.year();
        if year < self.min_valid_year as i32 || year > 9999 {
            return Err(MatchError::BadReleaseDate(date.to_string()));
        }
        Ok(year as u16)
    }
}

static BRACKET_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]|【[^】]*】|\([^)]*\)|（[^）]*）").unwrap());
static REGION_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)僅限港澳台地區|仅限港澳台地区|年齡限制|年龄限制").unwrap());
static PUNCT_TO_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[._:：,，!！?？~～]+").unwrap());

/// Normalize a free-text title for catalog search: strip bracketed
/// decorations and regional/age-restriction tags, map punctuation to
/// spaces, collapse whitespace.
pub fn normalize_title(raw: &str) -> String {
    let stripped = BRACKET_TEXT.replace_all(raw, " ");
    let stripped = REGION_TAGS.replace_all(&stripped, " ");
    let spaced = PUNCT_TO_SPACE.replace_all(&stripped, " ");
    spaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c.is_whitespace() || c == '-')
        .to_string()
}

use std::path::PathBuf;

use thiserror::Error;

use crate::provider::ProviderError;

/// Everything that can go wrong inside one recognizer attempt.
///
/// The chain runner only cares about one bit of classification: a fatal
/// error stops the chain for the entry this cycle, anything else falls
/// through to the next recognizer. See [`MatchError::is_fatal`].
#[derive(Error, Debug)]
pub enum MatchError {
    /// A pattern referenced a capture group the engine does not understand.
    /// Recognizer misconfiguration; caught at init.
    #[error("unknown capture group `{group}` in pattern `{pattern}`")]
    UnknownCaptureGroup { group: String, pattern: String },

    #[error("invalid pattern `{pattern}`: {source}")]
    BadPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("could not parse `{value}` as {what}")]
    NumberParse { value: String, what: &'static str },

    /// Name search came back empty.
    #[error("no result for title `{0}`")]
    TitleNotFound(String),

    /// Name search returned more than one candidate; the resolver never
    /// guesses.
    #[error("title `{title}` is ambiguous: {candidates} candidates")]
    TitleAmbiguous { title: String, candidates: usize },

    /// The entry carried an explicit external id and the lookup missed.
    /// The id was a positive claim, so no other recognizer can do better.
    #[error("lookup for explicit id {0} failed")]
    IdLookupFailed(u64),

    #[error("release date `{0}` is unusable")]
    BadReleaseDate(String),

    /// Relocation target already occupied. Never auto-resolved.
    #[error("target already exists: {0}")]
    Collision(PathBuf),

    #[error("source file missing: {0}")]
    SourceMissing(PathBuf),

    /// A directory entry still contains files the recognizer could not
    /// classify; nothing was relocated.
    #[error("unclassified files remain in `{0}`")]
    UnclassifiedFiles(String),

    #[error("metadata provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The recognizer panicked; converted into a non-fatal failure so one
    /// misbehaving plugin cannot take the service down.
    #[error("recognizer panicked")]
    Panicked,
}

impl MatchError {
    /// Fatal errors stop the matcher chain for this entry this cycle.
    ///
    /// Filesystem failures are fatal too: a later recognizer would hit the
    /// same filesystem state, so trying it only burns metadata-API calls.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MatchError::IdLookupFailed(_)
                | MatchError::Collision(_)
                | MatchError::SourceMissing(_)
                | MatchError::Io(_)
        )
    }
}

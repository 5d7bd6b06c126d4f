//! The concrete naming-convention recognizers and their shared machinery.
//!
//! Each release-group convention is a configured instance of one of two
//! shapes (single file, season pack) rather than its own type: variants
//! differ only in expression set, priority and override table. Shared
//! sub-behavior lives in free functions here.

pub mod patterns;
pub mod season_pack;
pub mod single_file;

pub use patterns::{Extraction, PatternSet, explicit_id_marker};
pub use season_pack::SeasonPackRecognizer;
pub use single_file::SingleFileRecognizer;

const MEDIA_EXTENSIONS: &[&str] = &[
    ".mp4", ".mkv", ".avi", ".mov", ".webm", ".flv", ".wmv", ".m4v", ".mpg", ".mpeg", ".ts",
    ".m2ts",
];

const SUBTITLE_EXTENSIONS: &[&str] = &[".srt", ".ass", ".ssa", ".sub", ".vtt"];

/// Sidecar files a season pack may carry without blocking relocation.
const SIDECAR_EXTENSIONS: &[&str] = &[".nfo", ".txt", ".md5", ".jpg", ".jpeg", ".png", ".torrent"];

/// Subtitle language tags recognized as a trailing `.tag` token in a stem.
const SUBTITLE_LANG_TAGS: &[&str] = &["sc", "tc", "chs", "cht", "eng", "jpn"];

pub fn is_media_ext(ext: &str) -> bool {
    let lower = ext.to_ascii_lowercase();
    MEDIA_EXTENSIONS.contains(&lower.as_str())
}

pub fn is_subtitle_ext(ext: &str) -> bool {
    let lower = ext.to_ascii_lowercase();
    SUBTITLE_EXTENSIONS.contains(&lower.as_str())
}

pub fn is_sidecar_ext(ext: &str) -> bool {
    let lower = ext.to_ascii_lowercase();
    SIDECAR_EXTENSIONS.contains(&lower.as_str())
}

/// Trailing language token of a subtitle stem, e.g. `"ep03.sc"` → `"sc"`.
pub fn subtitle_lang_tag(stem: &str) -> Option<&str> {
    let (_, tail) = stem.rsplit_once('.')?;
    SUBTITLE_LANG_TAGS
        .iter()
        .find(|tag| tail.eq_ignore_ascii_case(tag))
        .map(|_| tail)
}

/// Fallback expressions for pulling season/episode out of file stems inside
/// a season pack when the convention does not configure its own.
pub fn default_episode_patterns() -> Vec<String> {
    vec![
        r"[Ss](?P<season>\d{1,3})[Ee](?P<episode>\d{1,4})".to_string(),
        r"-\s*(?P<episode>\d{1,4})\s*(?:\[|\(|$)".to_string(),
        r"\[(?P<episode>\d{1,4})\]".to_string(),
        r"(?i)\b(?:ep|episode)\s*(?P<episode>\d{1,4})\b".to_string(),
    ]
}

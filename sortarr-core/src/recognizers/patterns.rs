use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::MatchError;
use crate::provider::TitleKind;

/// Capture group names a pattern may use. Anything else is recognizer
/// misconfiguration and fails at compile time, not at match time.
pub const ALLOWED_GROUPS: &[&str] = &["title", "season", "episode", "tmdbid", "year"];

/// What one pattern pulled out of a file or directory name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub title: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub tmdb_id: Option<u64>,
    pub year: Option<u16>,
}

/// An ordered set of named-capture expressions. The first pattern that
/// matches wins.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile every expression and validate its capture-group names.
    pub fn compile<S: AsRef<str>>(exprs: &[S]) -> Result<Self, MatchError> {
        let mut patterns = Vec::with_capacity(exprs.len());
        for expr in exprs {
            let expr = expr.as_ref();
            let regex = Regex::new(expr).map_err(|source| MatchError::BadPattern {
                pattern: expr.to_string(),
                source,
            })?;
            for group in regex.capture_names().flatten() {
                if !ALLOWED_GROUPS.contains(&group) {
                    return Err(MatchError::UnknownCaptureGroup {
                        group: group.to_string(),
                        pattern: expr.to_string(),
                    });
                }
            }
            patterns.push(regex);
        }
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Apply the set against one name. `Ok(None)` means no pattern matched;
    /// a matched pattern whose numeric group fails to parse is a hard error.
    pub fn extract(&self, name: &str) -> Result<Option<Extraction>, MatchError> {
        for pattern in &self.patterns {
            let Some(caps) = pattern.captures(name) else {
                continue;
            };
            let mut out = Extraction::default();
            if let Some(m) = caps.name("title") {
                out.title = Some(m.as_str().trim().to_string());
            }
            if let Some(m) = caps.name("season") {
                out.season = Some(parse_num(m.as_str(), "season number")?);
            }
            if let Some(m) = caps.name("episode") {
                out.episode = Some(parse_num(m.as_str(), "episode number")?);
            }
            if let Some(m) = caps.name("tmdbid") {
                out.tmdb_id = Some(parse_num(m.as_str(), "tmdb id")?);
            }
            if let Some(m) = caps.name("year") {
                out.year = Some(parse_num(m.as_str(), "year")?);
            }
            return Ok(Some(out));
        }
        Ok(None)
    }
}

fn parse_num<T: std::str::FromStr>(value: &str, what: &'static str) -> Result<T, MatchError> {
    value.trim().parse().map_err(|_| MatchError::NumberParse {
        value: value.to_string(),
        what,
    })
}

static EXPLICIT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(tv|movie)\s+tmdbid[-=](\d{1,10})\b").unwrap());

/// Look for an explicit external-id marker such as `tv tmdbid-5001` inside
/// a name. The marker carries the content kind along with the id.
pub fn explicit_id_marker(name: &str) -> Option<(TitleKind, u64)> {
    let caps = EXPLICIT_ID.captures(name)?;
    let kind = if caps[1].eq_ignore_ascii_case("movie") {
        TitleKind::Movie
    } else {
        TitleKind::Series
    };
    // The digit count is capped by the pattern, so this cannot overflow.
    let id: u64 = caps[2].parse().ok()?;
    Some((kind, id))
}

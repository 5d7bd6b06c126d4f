use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Top-level sortarr configuration, deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub library: LibraryConfig,
    /// Watched source roots; at least one is required.
    pub roots: Vec<WatchedRoot>,
    #[serde(default)]
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub recognizers: Vec<RecognizerConfig>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.roots.is_empty() {
            anyhow::bail!("config declares no watched roots");
        }
        for root in &self.roots {
            if root.path.as_os_str().is_empty() {
                anyhow::bail!("watched root with empty path");
            }
            if root.interval_secs == 0 {
                anyhow::bail!(
                    "watched root {} has a zero scan interval",
                    root.path.display()
                );
            }
        }
        if self.library.root.as_os_str().is_empty() {
            anyhow::bail!("library root is empty");
        }
        Ok(())
    }
}

/// Canonical target tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    /// Root directory the name/season/episode tree nests under.
    pub root: PathBuf,
}

/// One watched source directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchedRoot {
    pub path: PathBuf,
    /// Tick interval between reconcile cycles for this root.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TmdbConfig {
    /// API key; falls back to `$TMDB_API_KEY` when unset.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Engine tuning knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Clamp for the exponential per-entry retry backoff (`2^n` seconds).
    /// The default one-hour cap keeps a stuck entry retrying within the
    /// same day; raise it towards 65536 for the multi-hour variant.
    pub backoff_ceiling_secs: u64,
    /// Resolved titles with a release year below this are rejected.
    pub min_valid_year: u16,
    /// Fixed delay between recognizer attempts for one entry, bounding the
    /// metadata-API call rate.
    pub attempt_delay_ms: u64,
    /// Fixed delay between processed entries within one cycle.
    pub entry_delay_ms: u64,
    /// Video files below this size are classified as ignorable
    /// samples/ads by directory recognizers.
    pub min_episode_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backoff_ceiling_secs: 3600,
            min_valid_year: 1895,
            attempt_delay_ms: 500,
            entry_delay_ms: 1000,
            min_episode_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Which recognizer machinery a configured convention instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerKind {
    SingleFile,
    SeasonPack,
}

/// One naming convention: a configured instance of the single-file or
/// season-pack machinery.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecognizerConfig {
    /// Stable name; registering two conventions under the same name is a
    /// startup error.
    pub name: String,
    pub kind: RecognizerKind,
    /// Lower runs first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Named-capture expressions applied to the file stem (single_file) or
    /// directory name (season_pack).
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Expressions applied to file stems inside a pack; the built-in
    /// episode patterns apply when empty.
    #[serde(default)]
    pub file_patterns: Vec<String>,
    /// Operator-curated verbatim-title overrides.
    #[serde(default)]
    pub overrides: HashMap<String, OverrideEntry>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideEntry {
    pub id: u64,
    #[serde(default)]
    pub season: Option<u32>,
}

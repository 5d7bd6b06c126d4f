//! Shared configuration library for sortarr.
//!
//! Centralizes the config model, TOML loading, and validation so the
//! server binary and any future tooling share one source of truth for
//! defaults and validation rules.

pub mod loader;
pub mod models;

pub use loader::{ConfigLoadError, load, load_from_env};
pub use models::{
    Config, EngineConfig, LibraryConfig, OverrideEntry, RecognizerConfig, RecognizerKind,
    TmdbConfig, WatchedRoot,
};

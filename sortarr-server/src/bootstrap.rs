//! Startup wiring: turns the declarative config into live collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;

use sortarr_config::{Config, RecognizerConfig, RecognizerKind};
use sortarr_core::recognizers::{SeasonPackRecognizer, SingleFileRecognizer};
use sortarr_core::{
    IdentityResolver, MatchContext, OverrideTarget, Registry, Relocator, TmdbProvider,
};

/// Build the shared match context: metadata provider, resolver, relocator.
pub fn build_context(config: &Config) -> anyhow::Result<MatchContext> {
    let api_key = config
        .tmdb
        .api_key
        .clone()
        .or_else(|| std::env::var("TMDB_API_KEY").ok())
        .context("no TMDB API key in config or $TMDB_API_KEY")?;

    Ok(MatchContext {
        provider: Arc::new(TmdbProvider::new(api_key)),
        resolver: IdentityResolver::new(config.engine.min_valid_year),
        relocator: Relocator::new(&config.library.root),
        min_episode_bytes: config.engine.min_episode_bytes,
    })
}

/// Build the recognizer registry from config. Pattern compilation and
/// duplicate names fail here, at startup, never mid-cycle.
pub fn build_registry(config: &Config) -> anyhow::Result<Registry> {
    let mut registry = Registry::new();
    for rc in config.recognizers.iter().filter(|rc| rc.enabled) {
        let recognizer = instantiate(rc)
            .with_context(|| format!("configuring recognizer `{}`", rc.name))?;
        registry
            .register(recognizer)
            .with_context(|| format!("registering recognizer `{}`", rc.name))?;
    }
    Ok(registry)
}

fn instantiate(rc: &RecognizerConfig) -> anyhow::Result<Arc<dyn sortarr_core::Recognizer>> {
    let overrides: HashMap<String, OverrideTarget> = rc
        .overrides
        .iter()
        .map(|(title, entry)| {
            (
                title.clone(),
                OverrideTarget {
                    id: entry.id,
                    season: entry.season,
                },
            )
        })
        .collect();

    Ok(match rc.kind {
        RecognizerKind::SingleFile => Arc::new(SingleFileRecognizer::new(
            &rc.name,
            rc.priority,
            &rc.patterns,
            overrides,
        )?),
        RecognizerKind::SeasonPack => Arc::new(SeasonPackRecognizer::new(
            &rc.name,
            rc.priority,
            &rc.patterns,
            &rc.file_patterns,
            overrides,
        )?),
    })
}

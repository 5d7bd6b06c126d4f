use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::entry::Entry;
use crate::error::MatchError;
use crate::provider::MetadataProvider;
use crate::relocate::Relocator;
use crate::resolve::IdentityResolver;

/// Shared collaborators handed to every recognizer attempt.
#[derive(Clone)]
pub struct MatchContext {
    pub provider: Arc<dyn MetadataProvider>,
    pub resolver: IdentityResolver,
    pub relocator: Relocator,
    /// Video files below this size are classified as ignorable samples/ads
    /// by directory recognizers.
    pub min_episode_bytes: u64,
}

impl std::fmt::Debug for MatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchContext")
            .field("resolver", &self.resolver)
            .field("relocator", &self.relocator)
            .field("min_episode_bytes", &self.min_episode_bytes)
            .finish_non_exhaustive()
    }
}

/// One pluggable naming-convention recognizer.
///
/// `recognize` is the whole contract: a `true` return means the entry was
/// fully handled, relocation included. Failure never mutates the entry.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Stable name used for registration and logging.
    fn name(&self) -> &str;

    /// Lower runs first; ties break by registration order.
    fn priority(&self) -> i32;

    async fn recognize(&self, entry: &Entry, cx: &MatchContext) -> Result<bool, MatchError>;
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("recognizer `{0}` registered twice")]
    DuplicateName(String),
}

/// Process-wide recognizer registry. Populated once at startup and treated
/// as immutable afterwards; root workers only ever read the sorted chain.
#[derive(Default)]
pub struct Registry {
    recognizers: Vec<Arc<dyn Recognizer>>,
    names: HashSet<String>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("count", &self.recognizers.len())
            .finish_non_exhaustive()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, recognizer: Arc<dyn Recognizer>) -> Result<(), RegistryError> {
        let name = recognizer.name().to_string();
        if !self.names.insert(name.clone()) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.recognizers.push(recognizer);
        Ok(())
    }

    /// The chain: registered recognizers stable-sorted by ascending
    /// priority.
    pub fn chain(&self) -> Vec<Arc<dyn Recognizer>> {
        let mut chain = self.recognizers.clone();
        chain.sort_by_key(|r| r.priority());
        chain
    }

    pub fn len(&self) -> usize {
        self.recognizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recognizers.is_empty()
    }
}

/// Result of running the chain against one entry for one cycle.
#[derive(Debug)]
pub enum ChainOutcome {
    /// A recognizer claimed the entry; relocation already happened.
    Matched { recognizer: String },
    /// Every recognizer passed; the entry waits for a later cycle.
    Unmatched,
    /// A fatal error stopped the chain.
    Failed {
        recognizer: String,
        error: MatchError,
    },
}

/// Try each chain member in order until one claims the entry, a fatal error
/// stops the cycle, or the chain is exhausted.
///
/// A panic inside a recognizer is caught and treated as a retryable failure
/// for that attempt. `attempt_delay` spaces out recognizer attempts to
/// bound the aggregate metadata-call rate.
pub async fn run_chain(
    chain: &[Arc<dyn Recognizer>],
    entry: &Entry,
    cx: &MatchContext,
    attempt_delay: Duration,
) -> ChainOutcome {
    let key = entry.stable_key();
    for (index, recognizer) in chain.iter().enumerate() {
        if index > 0 && !attempt_delay.is_zero() {
            tokio::time::sleep(attempt_delay).await;
        }

        let attempt = AssertUnwindSafe(recognizer.recognize(entry, cx))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                warn!(key, recognizer = recognizer.name(), "recognizer panicked");
                Err(MatchError::Panicked)
            });

        match attempt {
            Ok(true) => {
                return ChainOutcome::Matched {
                    recognizer: recognizer.name().to_string(),
                };
            }
            Ok(false) => {
                debug!(key, recognizer = recognizer.name(), "no match");
            }
            Err(error) if error.is_fatal() => {
                return ChainOutcome::Failed {
                    recognizer: recognizer.name().to_string(),
                    error,
                };
            }
            Err(error) => {
                debug!(
                    key,
                    recognizer = recognizer.name(),
                    error = %error,
                    "retryable failure, trying next recognizer"
                );
            }
        }
    }
    ChainOutcome::Unmatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryKind, FileRecord};
    use crate::provider::MockMetadataProvider;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_entry() -> Entry {
        Entry {
            name: "file.mp4".into(),
            path: PathBuf::from("/watch/file.mp4"),
            kind: EntryKind::File,
            files: vec![FileRecord::from_path(PathBuf::from("file.mp4"), 100)],
        }
    }

    fn test_context() -> MatchContext {
        MatchContext {
            provider: Arc::new(MockMetadataProvider::new()),
            resolver: IdentityResolver::new(1895),
            relocator: Relocator::new("/library"),
            min_episode_bytes: 0,
        }
    }

    /// Scripted recognizer that counts its invocations.
    struct Scripted {
        name: &'static str,
        priority: i32,
        calls: Arc<AtomicUsize>,
        result: fn() -> Result<bool, MatchError>,
    }

    impl Scripted {
        fn new(
            name: &'static str,
            priority: i32,
            result: fn() -> Result<bool, MatchError>,
        ) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    name,
                    priority,
                    calls: calls.clone(),
                    result,
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl Recognizer for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn recognize(&self, _: &Entry, _: &MatchContext) -> Result<bool, MatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let mut registry = Registry::new();
        let (a, _) = Scripted::new("dup", 10, || Ok(false));
        let (b, _) = Scripted::new("dup", 20, || Ok(false));
        registry.register(a).unwrap();
        let err = registry.register(b).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(name) if name == "dup"));
    }

    #[test]
    fn chain_sorts_by_priority_with_stable_ties() {
        let mut registry = Registry::new();
        let (late, _) = Scripted::new("late", 50, || Ok(false));
        let (first_tie, _) = Scripted::new("first-tie", 10, || Ok(false));
        let (second_tie, _) = Scripted::new("second-tie", 10, || Ok(false));
        registry.register(late).unwrap();
        registry.register(first_tie).unwrap();
        registry.register(second_tie).unwrap();

        let names: Vec<_> = registry.chain().iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, vec!["first-tie", "second-tie", "late"]);
    }

    #[tokio::test]
    async fn chain_short_circuits_on_match() {
        let (miss, miss_calls) = Scripted::new("miss", 1, || Ok(false));
        let (hit, hit_calls) = Scripted::new("hit", 2, || Ok(true));
        let (never, never_calls) = Scripted::new("never", 3, || Ok(true));

        let chain: Vec<Arc<dyn Recognizer>> = vec![miss, hit, never];
        let outcome = run_chain(&chain, &test_entry(), &test_context(), Duration::ZERO).await;

        assert!(matches!(outcome, ChainOutcome::Matched { recognizer } if recognizer == "hit"));
        assert_eq!(miss_calls.load(Ordering::SeqCst), 1);
        assert_eq!(hit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(never_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fatal_error_stops_the_chain() {
        let (fatal, _) = Scripted::new("fatal", 1, || Err(MatchError::IdLookupFailed(9)));
        let (never, never_calls) = Scripted::new("never", 2, || Ok(true));

        let chain: Vec<Arc<dyn Recognizer>> = vec![fatal, never];
        let outcome = run_chain(&chain, &test_entry(), &test_context(), Duration::ZERO).await;

        assert!(
            matches!(outcome, ChainOutcome::Failed { recognizer, .. } if recognizer == "fatal")
        );
        assert_eq!(never_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retryable_error_falls_through() {
        let (flaky, _) = Scripted::new("flaky", 1, || Err(MatchError::TitleNotFound("x".into())));
        let (hit, hit_calls) = Scripted::new("hit", 2, || Ok(true));

        let chain: Vec<Arc<dyn Recognizer>> = vec![flaky, hit];
        let outcome = run_chain(&chain, &test_entry(), &test_context(), Duration::ZERO).await;

        assert!(matches!(outcome, ChainOutcome::Matched { .. }));
        assert_eq!(hit_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_unmatched() {
        let (a, _) = Scripted::new("a", 1, || Ok(false));
        let (b, _) = Scripted::new("b", 2, || Err(MatchError::TitleNotFound("x".into())));

        let chain: Vec<Arc<dyn Recognizer>> = vec![a, b];
        let outcome = run_chain(&chain, &test_entry(), &test_context(), Duration::ZERO).await;
        assert!(matches!(outcome, ChainOutcome::Unmatched));
    }

    #[tokio::test]
    async fn panicking_recognizer_is_contained() {
        struct Bomb;

        #[async_trait]
        impl Recognizer for Bomb {
            fn name(&self) -> &str {
                "bomb"
            }
            fn priority(&self) -> i32 {
                1
            }
            async fn recognize(&self, _: &Entry, _: &MatchContext) -> Result<bool, MatchError> {
                panic!("boom");
            }
        }

        let (hit, hit_calls) = Scripted::new("hit", 2, || Ok(true));
        let chain: Vec<Arc<dyn Recognizer>> = vec![Arc::new(Bomb), hit];
        let outcome = run_chain(&chain, &test_entry(), &test_context(), Duration::ZERO).await;

        assert!(matches!(outcome, ChainOutcome::Matched { .. }));
        assert_eq!(hit_calls.load(Ordering::SeqCst), 1);
    }
}

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::matcher::{ChainOutcome, MatchContext, Recognizer, run_chain};
use crate::retry::RetryTable;
use crate::scan::Scanner;

/// Timing knobs for one root's worker.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Tick interval between reconcile cycles.
    pub interval: Duration,
    /// Fixed delay between recognizer attempts for one entry.
    pub attempt_delay: Duration,
    /// Fixed delay between processed entries.
    pub entry_delay: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            attempt_delay: Duration::from_millis(500),
            entry_delay: Duration::from_secs(1),
        }
    }
}

/// Long-lived reconciliation worker for one watched root.
///
/// Each root gets its own worker and its own retry table; the recognizer
/// chain and metadata provider are shared, read-only, across workers.
/// Within a cycle everything is sequential: one entry at a time, one
/// recognizer at a time.
pub struct ReconcileWorker {
    root: PathBuf,
    scanner: Scanner,
    retry: RetryTable,
    chain: Vec<Arc<dyn Recognizer>>,
    cx: MatchContext,
    options: WorkerOptions,
}

impl std::fmt::Debug for ReconcileWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileWorker")
            .field("root", &self.root)
            .field("chain_len", &self.chain.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ReconcileWorker {
    pub fn new(
        root: impl Into<PathBuf>,
        scanner: Scanner,
        retry: RetryTable,
        chain: Vec<Arc<dyn Recognizer>>,
        cx: MatchContext,
        options: WorkerOptions,
    ) -> Self {
        Self {
            root: root.into(),
            scanner,
            retry,
            chain,
            cx,
            options,
        }
    }

    /// Run until the shutdown token fires. Cancellation is observed between
    /// cycles, never mid-operation; an in-flight move or HTTP call finishes
    /// before shutdown takes effect.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(root = %self.root.display(), "reconcile worker started");
        let mut ticker = tokio::time::interval(self.options.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(root = %self.root.display(), "reconcile worker stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }
            self.cycle(Utc::now()).await;
        }
    }

    /// One reconcile cycle: scan, purge stale retry state, then process
    /// every eligible entry through the chain.
    pub async fn cycle(&mut self, now: DateTime<Utc>) {
        let entries = match self.scanner.scan(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                // A scan-level failure aborts the whole cycle for this root.
                error!(root = %self.root.display(), error = %e, "scan failed");
                return;
            }
        };

        let seen: HashSet<&str> = entries.iter().map(|e| e.stable_key()).collect();
        self.retry.purge_missing(&seen);

        let mut first = true;
        for entry in &entries {
            let key = entry.stable_key();
            if !self.retry.is_eligible(key, now) {
                debug!(key, "entry cooling down, skipped");
                continue;
            }
            if !first && !self.options.entry_delay.is_zero() {
                tokio::time::sleep(self.options.entry_delay).await;
            }
            first = false;

            let outcome = run_chain(&self.chain, entry, &self.cx, self.options.attempt_delay).await;
            match &outcome {
                ChainOutcome::Matched { recognizer } => {
                    info!(key, recognizer, "entry matched and relocated");
                }
                ChainOutcome::Unmatched => {
                    debug!(key, "no recognizer claimed the entry");
                }
                ChainOutcome::Failed { recognizer, error } => {
                    warn!(key, recognizer, error = %error, "entry failed this cycle");
                }
            }
            // Attempt recorded regardless of outcome; a matched entry
            // vanishes from the next scan and gets purged then.
            self.retry.record_attempt(key, Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;
    use crate::error::MatchError;
    use crate::matcher::Registry;
    use crate::provider::{MockMetadataProvider, SearchPage, TitleDetails};
    use crate::recognizers::SingleFileRecognizer;
    use crate::relocate::Relocator;
    use crate::resolve::IdentityResolver;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn fast_options() -> WorkerOptions {
        WorkerOptions {
            interval: Duration::from_millis(10),
            attempt_delay: Duration::ZERO,
            entry_delay: Duration::ZERO,
        }
    }

    fn context(provider: MockMetadataProvider, library: &Path) -> MatchContext {
        MatchContext {
            provider: Arc::new(provider),
            resolver: IdentityResolver::new(1895),
            relocator: Relocator::new(library),
            min_episode_bytes: 0,
        }
    }

    fn show_provider() -> MockMetadataProvider {
        let mut provider = MockMetadataProvider::new();
        provider.expect_search().returning(|_, _, _| {
            Ok(SearchPage {
                total_results: 1,
                results: vec![TitleDetails {
                    id: 5001,
                    original_title: "Show".into(),
                    original_language: "ja".into(),
                    adult: false,
                    release_date: "2021-03-01".into(),
                }],
            })
        });
        provider
    }

    fn ani_chain() -> Vec<Arc<dyn Recognizer>> {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(
                SingleFileRecognizer::new(
                    "ani",
                    10,
                    &[r"^\[ANi\]\s*(?P<title>.+?)\s*-\s*(?P<episode>\d+)\s*"],
                    HashMap::new(),
                )
                .unwrap(),
            ))
            .unwrap();
        registry.chain()
    }

    #[tokio::test]
    async fn full_cycle_relocates_a_matching_entry() {
        let temp = TempDir::new().unwrap();
        let watch = temp.path().join("watch");
        let library = temp.path().join("library");
        fs::create_dir_all(&watch).unwrap();
        fs::write(watch.join("[ANi] Show - 10 [1080p].mp4"), b"video").unwrap();

        let mut worker = ReconcileWorker::new(
            &watch,
            Scanner::new(),
            RetryTable::new(3600),
            ani_chain(),
            context(show_provider(), &library),
            fast_options(),
        );
        worker.cycle(Utc::now()).await;

        assert!(
            library
                .join("Show (2021) [id-5001]/Season 1/S01E10.mp4")
                .exists()
        );
    }

    #[tokio::test]
    async fn cooling_entry_is_skipped_without_recognizer_calls() {
        // not_before in the future means the chain never runs for the
        // entry.
        struct Counting {
            calls: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl Recognizer for Counting {
            fn name(&self) -> &str {
                "counting"
            }
            fn priority(&self) -> i32 {
                1
            }
            async fn recognize(&self, _: &Entry, _: &MatchContext) -> Result<bool, MatchError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(MatchError::TitleNotFound("x".into()))
            }
        }

        let temp = TempDir::new().unwrap();
        let watch = temp.path().join("watch");
        fs::create_dir_all(&watch).unwrap();
        fs::write(watch.join("unmatchable.mp4"), b"x").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let chain: Vec<Arc<dyn Recognizer>> = vec![Arc::new(Counting {
            calls: calls.clone(),
        })];

        let mut worker = ReconcileWorker::new(
            &watch,
            Scanner::new(),
            RetryTable::new(3600),
            chain,
            context(MockMetadataProvider::new(), &temp.path().join("library")),
            fast_options(),
        );

        let t = Utc::now();
        worker.cycle(t).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Second cycle runs before the backoff window has passed.
        worker.cycle(t + chrono::Duration::seconds(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Well past the window it becomes eligible again.
        worker.cycle(t + chrono::Duration::seconds(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn vanished_entries_are_purged_from_retry_state() {
        let temp = TempDir::new().unwrap();
        let watch = temp.path().join("watch");
        fs::create_dir_all(&watch).unwrap();
        let file = watch.join("transient.mp4");
        fs::write(&file, b"x").unwrap();

        let mut worker = ReconcileWorker::new(
            &watch,
            Scanner::new(),
            RetryTable::new(3600),
            Vec::new(),
            context(MockMetadataProvider::new(), &temp.path().join("library")),
            fast_options(),
        );

        worker.cycle(Utc::now()).await;
        assert_eq!(worker.retry.len(), 1);

        fs::remove_file(&file).unwrap();
        worker.cycle(Utc::now()).await;
        assert!(worker.retry.is_empty());
    }

    #[tokio::test]
    async fn scan_failure_aborts_the_cycle_quietly() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("never-created");

        let mut worker = ReconcileWorker::new(
            &missing,
            Scanner::new(),
            RetryTable::new(3600),
            Vec::new(),
            context(MockMetadataProvider::new(), &temp.path().join("library")),
            fast_options(),
        );
        // Must not panic; the retry table stays untouched.
        worker.cycle(Utc::now()).await;
        assert!(worker.retry.is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let temp = TempDir::new().unwrap();
        let watch = temp.path().join("watch");
        fs::create_dir_all(&watch).unwrap();

        let worker = ReconcileWorker::new(
            &watch,
            Scanner::new(),
            RetryTable::new(3600),
            Vec::new(),
            context(MockMetadataProvider::new(), &temp.path().join("library")),
            fast_options(),
        );

        let token = CancellationToken::new();
        let handle = tokio::spawn(worker.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should stop after cancellation")
            .unwrap();
    }
}

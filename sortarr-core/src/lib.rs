//! # sortarr-core
//!
//! The reconciliation engine behind sortarr: continuously reconciles a set
//! of watched "inbox" directories against a canonical media library layout.
//!
//! The pipeline, per watched root and per cycle:
//!
//! 1. [`scan::Scanner`] snapshots the root into [`entry::Entry`] units;
//! 2. [`retry::RetryTable`] filters out entries still cooling down from a
//!    previous failed attempt;
//! 3. [`matcher::run_chain`] tries the priority-ordered
//!    [`matcher::Recognizer`] chain until one claims the entry;
//! 4. the claiming recognizer resolves identity through a
//!    [`provider::MetadataProvider`] (see [`resolve::IdentityResolver`]) and
//!    relocates files via [`relocate::Relocator`].
//!
//! [`reconcile::ReconcileWorker`] drives the loop, one long-lived task per
//! watched root.

pub mod entry;
pub mod error;
pub mod matcher;
pub mod provider;
pub mod reconcile;
pub mod recognizers;
pub mod relocate;
pub mod resolve;
pub mod retry;
pub mod scan;

pub use entry::{Entry, EntryKind, FileRecord};
pub use error::MatchError;
pub use matcher::{ChainOutcome, MatchContext, Recognizer, Registry, RegistryError, run_chain};
pub use provider::{MetadataProvider, ProviderError, SearchPage, TitleDetails, TitleKind, TmdbProvider};
pub use reconcile::{ReconcileWorker, WorkerOptions};
pub use relocate::{RelocationRecord, Relocator};
pub use resolve::{Identity, IdentityResolver, OverrideTarget, TitleQuery};
pub use retry::{RetryState, RetryTable};
pub use scan::{ScanError, Scanner};

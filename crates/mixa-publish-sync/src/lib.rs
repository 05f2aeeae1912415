//! Selective, reference-aware folder synchronization.
//!
//! A pass enumerates the local tree, resolves which files belong to the
//! site (optionally pulling in files referenced from outside it), diffs the
//! result against the remote listing and applies the difference.

pub mod apply;
pub mod diff;
pub mod orchestrator;
pub mod scanner;
pub mod scope;

pub use apply::{ApplyReport, SyncApplier};
pub use diff::{ChangeDetector, DiffEngine, SizeAndModifiedTime};
pub use orchestrator::{PublishOptions, PublishReport, PublishState, Publisher};
pub use scanner::ReferenceScanner;
pub use scope::{EligibleFileSet, ScopeResolver};

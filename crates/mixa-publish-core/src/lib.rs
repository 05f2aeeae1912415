//! Core traits and types for the mixa-publish synchronization engine.
//!
//! This crate defines what the engine and its collaborators share:
//! - `ObjectStore` / `StoreConnector`: remote key-value object store
//! - `FileTree`: local document tree reader
//! - `SiteApi`: site lookup, credential issuance and build trigger
//! - `path`: the normalization and key layout rules

mod error;
mod memory;
mod model;
pub mod path;
mod site;
mod store;
mod tree;

pub use error::PublishError;
pub use memory::{MemoryFileTree, MemoryObjectStore};
pub use model::{Credentials, DiffResult, LocalFile, RemoteObject, SiteInfo, SyncConfig, SyncPlan};
pub use site::SiteApi;
pub use store::{ObjectStore, StoreConnector};
pub use tree::FileTree;

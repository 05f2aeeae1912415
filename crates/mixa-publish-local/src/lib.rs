//! Local filesystem backend for mixa-publish.

mod tree;

pub use tree::LocalFileTree;

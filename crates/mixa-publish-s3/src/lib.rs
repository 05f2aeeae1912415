//! S3 backend for mixa-publish.
//!
//! [`S3ObjectStore`] mirrors a site under a key prefix of one bucket.
//! [`S3Connector`] builds a store from the short-lived credentials the
//! publishing service issues for each pass.

mod connector;
mod store;

pub use connector::{S3Connector, DEFAULT_BUCKET, DEFAULT_ENDPOINT, DEFAULT_REGION};
pub use store::S3ObjectStore;

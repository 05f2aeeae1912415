use thiserror::Error;

/// Errors surfaced by a publish pass.
///
/// Only `Scanning` is recoverable; every other variant ends the pass.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Missing secret token or destination, or a local root that does not exist.
    #[error("{0}")]
    Configuration(String),

    /// A document could not be read or decoded while looking for references.
    #[error("Scanning error: {0}")]
    Scanning(String),

    /// The credential endpoint returned nothing usable.
    #[error("{0}")]
    Credential(String),

    /// A local file could not be read.
    #[error("I/O error: {0}")]
    Io(String),

    /// Listing, upload, deletion or any other remote call failed.
    #[error("Transport error: {0}")]
    Transport(String),
}

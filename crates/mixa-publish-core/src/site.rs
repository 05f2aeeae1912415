use async_trait::async_trait;

use crate::error::PublishError;
use crate::model::{Credentials, SiteInfo};

/// The publishing service, addressed by a per-site secret token.
#[async_trait]
pub trait SiteApi: Send + Sync {
    /// Resolve a token to its site. `Ok(None)` means the token is unknown.
    async fn fetch_site_info(&self, secret_token: &str) -> Result<Option<SiteInfo>, PublishError>;

    /// Issue short-lived store credentials scoped to the token's site.
    async fn fetch_credentials(&self, secret_token: &str) -> Result<Credentials, PublishError>;

    /// Ask the service to rebuild the site from the freshly synced state.
    async fn trigger_build(&self, secret_token: &str) -> Result<(), PublishError>;
}

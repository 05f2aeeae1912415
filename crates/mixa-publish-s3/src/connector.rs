use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::{BehaviorVersion, Credentials as S3Credentials};
use mixa_publish_core::{Credentials, ObjectStore, PublishError, StoreConnector};
use tracing::debug;

use crate::store::S3ObjectStore;

pub const DEFAULT_BUCKET: &str = "resource.mixa.site";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_ENDPOINT: &str = "https://s3.us-east-1.amazonaws.com";

/// Builds an [`S3ObjectStore`] for each pass from the issued credentials.
#[derive(Debug, Clone)]
pub struct S3Connector {
    bucket: String,
    region: String,
    endpoint: String,
}

impl Default for S3Connector {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET, DEFAULT_REGION, DEFAULT_ENDPOINT)
    }
}

impl S3Connector {
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Build an S3 client over static, session-scoped credentials.
    pub fn client(&self, credentials: &Credentials) -> aws_sdk_s3::Client {
        let provider = S3Credentials::new(
            &credentials.access_key_id,
            &credentials.secret_access_key,
            credentials.session_token.clone(),
            credentials.expiration.map(SystemTime::from),
            "mixa",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(provider)
            .region(Region::new(self.region.clone()))
            .endpoint_url(&self.endpoint)
            .force_path_style(true)
            .build();

        aws_sdk_s3::Client::from_conf(s3_config)
    }
}

#[async_trait]
impl StoreConnector for S3Connector {
    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> Result<Arc<dyn ObjectStore>, PublishError> {
        if credentials.is_empty() {
            return Err(PublishError::Credential(
                "Refusing to connect with empty credentials".to_string(),
            ));
        }
        debug!(
            "Connecting to s3://{} via {} ({})",
            self.bucket, self.endpoint, self.region
        );
        let store = S3ObjectStore::new(self.client(credentials), self.bucket.clone());
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            access_key_id: "AKIATEST".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: Some("session".to_string()),
            expiration: None,
        }
    }

    #[test]
    fn test_default_targets_publishing_bucket() {
        let connector = S3Connector::default();
        assert_eq!(connector.bucket(), "resource.mixa.site");
    }

    #[test]
    fn test_client_uses_configured_region() {
        let connector = S3Connector::new("bucket", "eu-west-1", "http://localhost:9000");
        let client = connector.client(&credentials());
        assert_eq!(
            client.config().region().map(|r| r.as_ref().to_string()),
            Some("eu-west-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_connect_yields_s3_store() {
        let store = S3Connector::default().connect(&credentials()).await.unwrap();
        assert_eq!(store.backend_name(), "s3");
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_credentials() {
        let err = S3Connector::default()
            .connect(&Credentials::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PublishError::Credential(_)));
    }
}

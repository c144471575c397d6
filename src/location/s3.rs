//! Presigned S3 URLs.
//!
//! Clients fetch S3-hosted files directly; the server only signs `GetObject`
//! requests with the credentials supplied at startup. Custom endpoints
//! (MinIO, LocalStack, etc.) are addressed path-style.

use super::{BlobSigner, SignedUrl};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, SystemTime};

const DEFAULT_REGION: &str = "us-east-1";

/// Credentials file contents.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint URL for S3-compatible services.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl S3Credentials {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            Error::Internal(format!(
                "invalid credentials file {}: {}",
                path.display(),
                e
            ))
        })
    }
}

pub struct S3Signer {
    client: Client,
    expiry: Duration,
}

impl S3Signer {
    /// # Arguments
    ///
    /// * `credentials` - static credentials used for every signature
    /// * `expiry` - lifetime of each presigned URL
    pub fn new(credentials: S3Credentials, expiry: Duration) -> Self {
        let region = credentials
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(Credentials::new(
                credentials.access_key_id,
                credentials.secret_access_key,
                credentials.session_token,
                None,
                "htsnexus",
            ));
        if let Some(endpoint) = credentials.endpoint {
            config = config.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(config.build()),
            expiry,
        }
    }
}

#[async_trait]
impl BlobSigner for S3Signer {
    async fn presign(&self, bucket: &str, key: &str) -> Result<SignedUrl> {
        let presign_config = PresigningConfig::expires_in(self.expiry)
            .map_err(|e| Error::Internal(format!("presign config error: {}", e)))?;

        let issued = SystemTime::now();
        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| {
                Error::LocationUnavailable(format!("failed to presign s3://{}/{}: {}", bucket, key, e))
            })?;

        Ok(SignedUrl {
            url: presigned.uri().to_string(),
            expiry: issued + self.expiry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn credentials(endpoint: Option<&str>) -> S3Credentials {
        S3Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: None,
            region: Some("us-west-2".to_string()),
            endpoint: endpoint.map(str::to_string),
        }
    }

    #[test]
    fn test_credentials_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(
            &path,
            r#"{"access_key_id": "AK", "secret_access_key": "SK", "region": "eu-west-1"}"#,
        )
        .unwrap();

        let creds = S3Credentials::from_file(&path).unwrap();
        assert_eq!(creds.access_key_id, "AK");
        assert_eq!(creds.region.as_deref(), Some("eu-west-1"));
        assert!(creds.session_token.is_none());

        std::fs::write(&path, "{}").unwrap();
        assert!(S3Credentials::from_file(&path).is_err());
    }

    #[tokio::test]
    async fn test_presign_is_offline() {
        let signer = S3Signer::new(credentials(None), Duration::from_secs(3600));
        let signed = signer.presign("genomes", "reads/sample1.bam").await.unwrap();

        assert!(signed.url.starts_with("https://"));
        assert!(signed.url.contains("genomes"));
        assert!(signed.url.contains("reads/sample1.bam"));
        assert!(signed.url.contains("X-Amz-Signature="));
        assert!(signed.url.contains("X-Amz-Expires=3600"));
        assert!(signed.expiry > SystemTime::now());
    }

    #[tokio::test]
    async fn test_presign_custom_endpoint_is_path_style() {
        let signer = S3Signer::new(
            credentials(Some("http://localhost:9000")),
            Duration::from_secs(60),
        );
        let signed = signer.presign("genomes", "sample1.bam").await.unwrap();
        assert!(
            signed
                .url
                .starts_with("http://localhost:9000/genomes/sample1.bam?")
        );
    }
}

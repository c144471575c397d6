//! Where an accession's bytes live and how clients reach them.
//!
//! Storage descriptors are parsed from the index database's `url` column when
//! an accession is loaded. At ticket time a [`LocationResolver`] turns the
//! descriptor into a [`Location`]: a checked local path, served by this
//! server's data endpoint, or a remote URL the client fetches directly.
//! Files in S3 are reached through presigned URLs from a [`BlobSigner`].

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "s3")]
pub use s3::{S3Credentials, S3Signer};

use crate::index::Accession;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use url::Url;

/// Parsed form of a registered file URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageDescriptor {
    /// `file://` URL or plain path; relative paths resolve against the data directory.
    Local(PathBuf),
    Http(Url),
    S3 { bucket: String, key: String },
}

impl StorageDescriptor {
    pub fn parse(raw: &str) -> Result<Self> {
        let Some((scheme, _)) = raw.split_once("://") else {
            return Ok(StorageDescriptor::Local(PathBuf::from(raw)));
        };

        let url = Url::parse(raw)
            .map_err(|e| Error::IndexCorrupt(format!("malformed file URL {}: {}", raw, e)))?;
        match scheme.to_ascii_lowercase().as_str() {
            "file" => url
                .to_file_path()
                .map(StorageDescriptor::Local)
                .map_err(|_| Error::IndexCorrupt(format!("malformed file URL {}", raw))),
            "http" | "https" => Ok(StorageDescriptor::Http(url)),
            "s3" => {
                let bucket = url
                    .host_str()
                    .filter(|b| !b.is_empty())
                    .ok_or_else(|| Error::IndexCorrupt(format!("S3 URL without bucket: {}", raw)))?;
                let key = url.path().trim_start_matches('/');
                if key.is_empty() {
                    return Err(Error::IndexCorrupt(format!("S3 URL without key: {}", raw)));
                }
                Ok(StorageDescriptor::S3 {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            other => Err(Error::IndexCorrupt(format!(
                "unsupported storage scheme {} in {}",
                other, raw
            ))),
        }
    }
}

/// Resolved location of an accession's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local { path: PathBuf, size: u64 },
    Remote { url: String, expiry: Option<SystemTime> },
}

#[derive(Debug, Clone)]
pub struct SignedUrl {
    pub url: String,
    pub expiry: SystemTime,
}

/// Produces time-limited URLs for objects in blob storage.
#[async_trait]
pub trait BlobSigner: Send + Sync {
    async fn presign(&self, bucket: &str, key: &str) -> Result<SignedUrl>;
}

pub struct LocationResolver {
    data_dir: PathBuf,
    signer: Option<Arc<dyn BlobSigner>>,
    timeout: Duration,
}

impl LocationResolver {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        signer: Option<Arc<dyn BlobSigner>>,
        timeout: Duration,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            signer,
            timeout,
        }
    }

    pub fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    pub async fn resolve(&self, accession: &Accession) -> Result<Location> {
        match &accession.location {
            StorageDescriptor::Local(_) => {
                let (path, size) = self.checked_local(accession).await?;
                Ok(Location::Local { path, size })
            }
            StorageDescriptor::Http(url) => Ok(Location::Remote {
                url: url.to_string(),
                expiry: None,
            }),
            StorageDescriptor::S3 { bucket, key } => {
                let signer = self.signer.as_ref().ok_or_else(|| {
                    Error::LocationUnavailable(format!(
                        "{} is stored in S3 but no credentials are configured",
                        accession.key
                    ))
                })?;
                let signed = tokio::time::timeout(self.timeout, signer.presign(bucket, key))
                    .await
                    .map_err(|_| Error::Timeout(format!("signing URL for {}", accession.key)))??;
                Ok(Location::Remote {
                    url: signed.url,
                    expiry: Some(signed.expiry),
                })
            }
        }
    }

    /// Path of a locally stored accession, checked to exist.
    pub async fn local_path(&self, accession: &Accession) -> Result<PathBuf> {
        Ok(self.checked_local(accession).await?.0)
    }

    async fn checked_local(&self, accession: &Accession) -> Result<(PathBuf, u64)> {
        let StorageDescriptor::Local(path) = &accession.location else {
            return Err(Error::LocationUnavailable(format!(
                "{} is not stored locally",
                accession.key
            )));
        };
        let path = local::resolve_path(&self.data_dir, path);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok((path, metadata.len())),
            _ => Err(Error::LocationUnavailable(format!(
                "file for {} not found at {}",
                accession.key,
                path.display()
            ))),
        }
    }
}

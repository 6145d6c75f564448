//! Photo bytes in object storage, reached through the site's signed-url routes.
//!
//! Bucket paths are `u/{user_uuid}/{filename}` with no leading slash. The
//! user segment always comes from the authenticated user, never from a
//! client-supplied path.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use thiserror::Error;
use tracing::{debug, instrument};

const RANDOM_NAME_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to reach storage endpoint: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage endpoint error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid storage URL: {0}")]
    Url(String),
    #[error("auth token required for storage access")]
    Unauthenticated,
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing filename")]
    MissingFilename,
}

#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Store `bytes` and return the media URL path (e.g. `/u/{uuid}/AbC123xyZ9.jpg`).
    async fn upload(&self, filename: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError>;

    async fn delete(&self, media_url: &str) -> Result<(), StorageError>;
}

/// `u/{user_uuid}/{basename(filename)}`.
pub fn bucket_path(user_uuid: &str, filename: &str) -> Option<String> {
    let name = basename(filename)?;
    Some(format!("u/{}/{}", user_uuid, name))
}

/// Fresh upload destination: random name, original extension kept.
pub fn upload_path(user_uuid: &str, original: &str) -> Option<String> {
    basename(original)?;
    Some(format!("u/{}/{}", user_uuid, random_filename(original)))
}

pub fn basename(path: &str) -> Option<&str> {
    path.rsplit('/').next().filter(|s| !s.is_empty())
}

fn random_filename(original: &str) -> String {
    let stem: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(RANDOM_NAME_LEN)
        .collect();
    match Path::new(original).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SignedUrlResponse {
    url: String,
    full_filename: String,
}

#[derive(Clone)]
pub struct SignedUrlStorage {
    http: Client,
    site_url: Url,
    token: Option<String>,
}

impl fmt::Debug for SignedUrlStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedUrlStorage")
            .field("site_url", &self.site_url)
            .finish_non_exhaustive()
    }
}

impl SignedUrlStorage {
    pub fn new(http: Client, site_url: Url, token: Option<String>) -> Self {
        Self { http, site_url, token }
    }

    fn token(&self) -> Result<&str, StorageError> {
        self.token.as_deref().ok_or(StorageError::Unauthenticated)
    }

    fn join(&self, path: &str) -> Result<Url, StorageError> {
        self.site_url
            .join(path)
            .map_err(|e| StorageError::Url(e.to_string()))
    }

    pub fn signed_url_endpoint(&self, filename: &str) -> Result<Url, StorageError> {
        let mut url = self.join("api/user/get-signed-url")?;
        url.query_pairs_mut().append_pair("filename", filename);
        Ok(url)
    }

    pub fn remove_endpoint(&self, media_url: &str) -> Result<Url, StorageError> {
        let mut url = self.join("api/user/remove-media")?;
        url.query_pairs_mut().append_pair("filename", media_url);
        Ok(url)
    }
}

async fn ensure_success(res: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    Err(StorageError::Status { status, body })
}

#[async_trait]
impl MediaStorage for SignedUrlStorage {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn upload(&self, filename: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        if basename(filename).is_none() {
            return Err(StorageError::MissingFilename);
        }
        let token = self.token()?;
        let res = self
            .http
            .get(self.signed_url_endpoint(filename)?)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;
        let signed: SignedUrlResponse = ensure_success(res).await?.json().await?;
        debug!(full_filename = %signed.full_filename, "got signed upload url");

        let res = self
            .http
            .put(signed.url.as_str())
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        ensure_success(res).await?;
        Ok(signed.full_filename)
    }

    #[instrument(skip(self))]
    async fn delete(&self, media_url: &str) -> Result<(), StorageError> {
        if basename(media_url).is_none() {
            return Err(StorageError::MissingFilename);
        }
        let token = self.token()?;
        let res = self
            .http
            .post(self.remove_endpoint(media_url)?)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;
        ensure_success(res).await?;
        Ok(())
    }
}

/// Filesystem-backed storage laid out like the bucket. Useful for local runs.
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
    user_uuid: String,
}

impl DirStorage {
    pub fn new(root: impl Into<PathBuf>, user_uuid: impl Into<String>) -> Self {
        Self { root: root.into(), user_uuid: user_uuid.into() }
    }
}

#[async_trait]
impl MediaStorage for DirStorage {
    async fn upload(&self, filename: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, StorageError> {
        let rel = upload_path(&self.user_uuid, filename).ok_or(StorageError::MissingFilename)?;
        let dest = self.root.join(&rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&dest, bytes).await?;
        debug!(path = %dest.display(), "stored media on disk");
        Ok(format!("/{}", rel))
    }

    async fn delete(&self, media_url: &str) -> Result<(), StorageError> {
        let rel = bucket_path(&self.user_uuid, media_url).ok_or(StorageError::MissingFilename)?;
        fs::remove_file(self.root.join(rel)).await?;
        Ok(())
    }
}

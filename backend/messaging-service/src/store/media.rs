use super::{MediaKind, MediaStore};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media payload is empty")]
    Empty,

    #[error("path outside media root: {0}")]
    InvalidPath(String),

    #[error("media io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("media backend error: {0}")]
    Backend(String),
}

/// Blobs on the local filesystem under a single root directory
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a recorded path, refusing anything that escapes the root
    fn confine(&self, path: &str) -> Result<PathBuf, MediaError> {
        let candidate = Path::new(path);
        if candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(MediaError::InvalidPath(path.to_string()));
        }
        if candidate.starts_with(&self.root) {
            Ok(candidate.to_path_buf())
        } else if candidate.is_relative() {
            Ok(self.root.join(candidate))
        } else {
            Err(MediaError::InvalidPath(path.to_string()))
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save(&self, kind: MediaKind, extension: &str, bytes: Vec<u8>) -> Result<String, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        let target = self.root.join(kind.object_name(extension));
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!(path = %target.display(), "media saved");
        Ok(target.to_string_lossy().into_owned())
    }

    async fn delete(&self, path: &str) -> Result<bool, MediaError> {
        let target = self.confine(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MediaError::Io(e)),
        }
    }
}

/// Blobs in an S3 bucket; the recorded path is the object key
#[derive(Clone)]
pub struct S3MediaStore {
    client: Client,
    bucket: String,
}

impl S3MediaStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(Client::new(&shared), bucket)
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn save(&self, kind: MediaKind, extension: &str, bytes: Vec<u8>) -> Result<String, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        let key = kind.object_name(extension);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| MediaError::Backend(format!("put_object {key}: {e}")))?;
        Ok(key)
    }

    async fn delete(&self, path: &str) -> Result<bool, MediaError> {
        // S3 deletes are idempotent and do not report whether the key existed
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| MediaError::Backend(format!("delete_object {path}: {e}")))?;
        Ok(true)
    }
}

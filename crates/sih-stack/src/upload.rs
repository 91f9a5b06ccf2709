//! Upload of base64 images to object storage

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

static DATA_URL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/\w+;base64,").unwrap());

/// Upload errors
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The payload is not base64
    #[error("image is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The store rejected the write
    #[error("put {bucket}/{key} failed: {message}")]
    Store {
        /// Target bucket
        bucket: String,
        /// Target key
        key: String,
        /// Store-specific cause
        message: String,
    },
}

/// One object write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectRequest {
    /// Target bucket
    pub bucket: String,
    /// Object key
    pub key: String,
    /// Decoded bytes
    pub body: Vec<u8>,
    /// `Content-Type` header
    pub content_type: String,
    /// `Content-Encoding` header
    pub content_encoding: String,
}

/// Object storage the helper writes to
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store one object
    async fn put_object(&self, request: PutObjectRequest) -> Result<(), UploadError>;
}

/// In-memory store keyed by `(bucket, key)`
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), PutObjectRequest>>,
    puts: Mutex<usize>,
}

impl MemoryObjectStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored object, if any
    #[must_use]
    pub fn get(&self, bucket: &str, key: &str) -> Option<PutObjectRequest> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of `put_object` calls served
    #[must_use]
    pub fn put_count(&self) -> usize {
        *self.puts.lock()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, request: PutObjectRequest) -> Result<(), UploadError> {
        *self.puts.lock() += 1;
        self.objects
            .lock()
            .insert((request.bucket.clone(), request.key.clone()), request);
        Ok(())
    }
}

/// Store writing `<root>/<bucket>/<key>` on the local filesystem
#[derive(Debug, Clone)]
pub struct DirectoryObjectStore {
    root: PathBuf,
}

impl DirectoryObjectStore {
    /// Store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for DirectoryObjectStore {
    async fn put_object(&self, request: PutObjectRequest) -> Result<(), UploadError> {
        let failed = |message: String| UploadError::Store {
            bucket: request.bucket.clone(),
            key: request.key.clone(),
            message,
        };
        if !stays_below_root(&request.bucket) || !stays_below_root(&request.key) {
            return Err(failed("path escapes the store root".to_string()));
        }
        let path = self.root.join(&request.bucket).join(&request.key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| failed(e.to_string()))?;
        }
        tokio::fs::write(&path, &request.body)
            .await
            .map_err(|e| failed(e.to_string()))?;
        tracing::debug!(path = %path.display(), "object written");
        Ok(())
    }
}

/// Non-empty relative path made of plain names only
fn stays_below_root(path: &str) -> bool {
    let mut components = Path::new(path).components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

/// Decodes base64 images and writes them to a store
#[derive(Debug)]
pub struct ImageUpload<S> {
    store: S,
}

impl<S: ObjectStore> ImageUpload<S> {
    /// Helper writing through `store`
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decode `image_base64` (optionally a `data:image/<fmt>;base64,` URL)
    /// and write it to `bucket/save_path` with one `put_object` call
    ///
    /// # Errors
    ///
    /// `InvalidBase64` before any write is attempted; otherwise whatever the
    /// store returns. Failed writes are not retried.
    pub async fn upload_to_bucket(
        &self,
        image_base64: &str,
        save_path: &str,
        bucket: &str,
    ) -> Result<(), UploadError> {
        let body = decode_image(image_base64)?;
        let size = body.len();
        self.store
            .put_object(PutObjectRequest {
                bucket: bucket.to_string(),
                key: save_path.to_string(),
                body,
                content_type: "image/jpeg".to_string(),
                content_encoding: "base64".to_string(),
            })
            .await?;
        tracing::info!(bucket, key = save_path, bytes = size, "image uploaded");
        Ok(())
    }
}

/// Strip a data-URL prefix and decode the rest
///
/// # Errors
///
/// `InvalidBase64` when the payload does not decode.
pub fn decode_image(image_base64: &str) -> Result<Vec<u8>, UploadError> {
    let payload = DATA_URL_PREFIX.replace(image_base64, "");
    Ok(STANDARD.decode(payload.as_bytes())?)
}

//! Key-addressed blob storage for resume files.
//!
//! The coordinator only sees the `ObjectStore` trait. Production uses
//! `S3ObjectStore` (S3 or MinIO); tests use an in-memory store.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

pub mod s3;

pub use s3::S3ObjectStore;

/// Lifetime of a pre-signed download URL.
pub const PRESIGN_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object store request failed: {0}")]
    Backend(String),

    #[error("object store request timed out")]
    Timeout,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Fetches the whole object into an owned buffer.
    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Issues a time-bounded GET URL for delegated client-side fetch.
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;
}

/// Builds a fresh object key of the form `{user_id}/{random}.{ext}`.
pub fn storage_key(user_id: Uuid, file_name: &str, content_type: &str) -> String {
    let random = Uuid::new_v4();
    match file_extension(file_name, content_type) {
        Some(ext) => format!("{user_id}/{random}.{ext}"),
        None => format!("{user_id}/{random}"),
    }
}

/// Uses the declared content type unless it is missing or generic, in which
/// case the type is guessed from the file name.
pub fn resolve_content_type(declared: Option<&str>, file_name: &str) -> String {
    match declared.map(str::trim) {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

fn file_extension(file_name: &str, content_type: &str) -> Option<String> {
    let from_name = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase());

    from_name.or_else(|| {
        mime_guess::get_mime_extensions_str(content_type)
            .and_then(|exts| exts.first())
            .map(|e| e.to_string())
    })
}

/// Runs an object store call under the outbound timeout.
pub(crate) async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| StorageError::Timeout)?
}

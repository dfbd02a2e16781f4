//! Object store adapter.
//!
//! Audio bytes live in a key-addressed object store. The orchestrators only
//! see the [`ObjectStore`] trait, so the S3 backend and the on-disk backend
//! are interchangeable, and tests can inject fakes.

pub mod local;
pub mod s3;

use crate::models::object::ObjectSummary;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::{io, time::Duration};
use thiserror::Error;

pub use local::LocalObjectStore;
pub use s3::S3ObjectStore;

/// Signed link lifetime when the caller does not ask for one.
pub const DEFAULT_LINK_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write object `{key}`: {reason}")]
    WriteFailed { key: String, reason: String },
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("object store error: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Readable body of a stored object.
pub struct ObjectBody {
    /// Byte length reported by the backend, if known.
    pub content_length: Option<u64>,

    pub stream: BoxStream<'static, io::Result<Bytes>>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` under an already computed `key` with private access.
    /// Returns the key.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StoreResult<String>;

    /// `Ok(false)` only when the backend reports the key as absent; any other
    /// failure is an error.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Mint a time-limited URL granting read access to `key`.
    async fn signed_url(&self, key: &str, ttl: Duration) -> StoreResult<String>;

    /// Open the object body for streaming. `ObjectNotFound` if absent.
    async fn get(&self, key: &str) -> StoreResult<ObjectBody>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// List at most `max_keys` objects.
    async fn list(&self, max_keys: usize) -> StoreResult<Vec<ObjectSummary>>;
}

//! SongService: the upload → object store → metadata → retrieval pipeline.
//!
//! Writes span two systems with no shared transaction:
//! - upload stores the object, then inserts the row. A failed insert leaves
//!   an orphan object; nothing is rolled back.
//! - deletion removes the row, then the object. A failed object removal
//!   leaves an orphan object and is reported, not raised.
//!
//! The orchestration is split by concern into `upload`, `retrieval` and
//! `deletion`.

mod deletion;
mod retrieval;
mod upload;

pub use deletion::{DeletedSong, DeletionReport};
pub use retrieval::{ObjectLink, SampledObject, SongDownload, SongStream, SongWithUrl};
pub use upload::{UploadOutcome, UploadedFile, UploadedFileInfo};

use crate::{
    models::song::parse_song_id,
    services::{
        object_store::{DEFAULT_LINK_TTL, ObjectStore, StoreError},
        song_repository::{MetadataError, SongRepository},
    },
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SongError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

pub type SongResult<T> = Result<T, SongError>;

/// Shared handle over both stores. Cheap to clone.
#[derive(Clone)]
pub struct SongService {
    objects: Arc<dyn ObjectStore>,
    songs: Arc<dyn SongRepository>,
    link_ttl: Duration,
}

impl SongService {
    pub fn new(objects: Arc<dyn ObjectStore>, songs: Arc<dyn SongRepository>) -> Self {
        Self {
            objects,
            songs,
            link_ttl: DEFAULT_LINK_TTL,
        }
    }

    /// Lifetime of links minted for id-addressed songs.
    pub fn with_link_ttl(mut self, ttl: Duration) -> Self {
        self.link_ttl = ttl;
        self
    }

    pub fn link_ttl(&self) -> Duration {
        self.link_ttl
    }

    /// Readiness probe for the metadata store.
    pub async fn check_metadata(&self) -> SongResult<()> {
        Ok(self.songs.ping().await?)
    }

    /// Readiness probe for the object store.
    pub async fn check_objects(&self) -> SongResult<()> {
        self.objects.list(1).await?;
        Ok(())
    }
}

/// Validate a song id before any store is touched.
fn song_id(raw: &str) -> SongResult<Uuid> {
    parse_song_id(raw)
        .ok_or_else(|| SongError::Validation("Song ID must be a valid UUID".into()))
}

fn song_not_found() -> SongError {
    SongError::NotFound("No song found with the provided ID".into())
}

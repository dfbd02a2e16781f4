use super::{SongError, SongResult, SongService, song_id, song_not_found};
use crate::{
    models::{object::ObjectSummary, song::SongRecord},
    services::object_store::{DEFAULT_LINK_TTL, ObjectBody, StoreError},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::try_join_all;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::time::Duration;

/// Listing cap for the bucket-sampling path.
pub const SAMPLE_LIST_LIMIT: usize = 1000;

/// Longest link lifetime S3 presigning accepts (seven days).
pub const MAX_LINK_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SongWithUrl {
    #[serde(flatten)]
    pub song: SongRecord,
    pub presigned_url: String,
}

/// Redirect-mode result.
#[derive(Debug)]
pub struct SongDownload {
    pub song: SongRecord,
    pub url: String,
}

/// Proxy-mode result.
pub struct SongStream {
    pub song: SongRecord,
    pub body: ObjectBody,
}

/// Link minted for an arbitrary bucket key.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLink {
    pub file_key: String,
    pub presigned_url: String,
    pub expiration_seconds: u64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SampledObject {
    #[serde(flatten)]
    pub object: ObjectSummary,
    pub presigned_url: String,
}

impl SongService {
    /// Record plus a fresh signed link, for the redirect download mode.
    pub async fn song_download(&self, raw_id: &str) -> SongResult<SongDownload> {
        let id = song_id(raw_id)?;
        let song = self.songs.get_by_id(id).await?.ok_or_else(song_not_found)?;
        let url = self.objects.signed_url(&song.s3_key, self.link_ttl).await?;
        Ok(SongDownload { song, url })
    }

    /// Record plus an open byte stream, for the proxy download mode.
    pub async fn song_stream(&self, raw_id: &str) -> SongResult<SongStream> {
        let id = song_id(raw_id)?;
        let song = self.songs.get_by_id(id).await?.ok_or_else(song_not_found)?;
        let body = self.objects.get(&song.s3_key).await.map_err(|err| match err {
            StoreError::ObjectNotFound(key) => {
                tracing::warn!(song_id = %song.id, key = %key, "song row has no stored object");
                SongError::NotFound("The song's audio file is missing from storage".into())
            }
            other => other.into(),
        })?;
        Ok(SongStream { song, body })
    }

    /// `None` when no songs exist.
    pub async fn random_song(&self) -> SongResult<Option<SongWithUrl>> {
        match self.songs.get_random().await? {
            Some(song) => Ok(Some(self.attach_url(song).await?)),
            None => Ok(None),
        }
    }

    /// Every song, newest first, each with its own link.
    pub async fn all_songs(&self) -> SongResult<Vec<SongWithUrl>> {
        let songs = self.songs.list_all().await?;
        try_join_all(songs.into_iter().map(|song| self.attach_url(song))).await
    }

    /// Bucket-addressed link for `key`, valid for `expiration` seconds
    /// (default one hour). The expiration is checked before any store call.
    pub async fn object_link(&self, key: &str, expiration: Option<&str>) -> SongResult<ObjectLink> {
        let seconds = parse_expiration(expiration)?;
        if key.is_empty() {
            return Err(SongError::Validation("File key is required".into()));
        }

        let exists = match self.objects.exists(key).await {
            Ok(exists) => exists,
            Err(StoreError::InvalidKey(_)) => false,
            Err(err) => return Err(err.into()),
        };
        if !exists {
            return Err(SongError::NotFound(
                "The requested file does not exist in the bucket".into(),
            ));
        }

        let presigned_url = self
            .objects
            .signed_url(key, Duration::from_secs(seconds))
            .await?;
        let expires_at = Utc::now() + ChronoDuration::seconds(seconds as i64);

        Ok(ObjectLink {
            file_key: key.to_string(),
            presigned_url,
            expiration_seconds: seconds,
            expires_at,
        })
    }

    /// Random sample of raw bucket objects.
    ///
    /// Shuffles at most [`SAMPLE_LIST_LIMIT`] listed keys, so buckets larger
    /// than the cap are not sampled uniformly.
    pub async fn sample_objects(&self, count: usize) -> SongResult<Vec<SampledObject>> {
        let mut objects = self.objects.list(SAMPLE_LIST_LIMIT).await?;
        objects.shuffle(&mut rand::rng());
        objects.truncate(count);

        let links = objects.into_iter().map(|object| async move {
            let presigned_url = self.objects.signed_url(&object.key, self.link_ttl).await?;
            Ok::<_, SongError>(SampledObject {
                object,
                presigned_url,
            })
        });
        try_join_all(links).await
    }

    async fn attach_url(&self, song: SongRecord) -> SongResult<SongWithUrl> {
        let presigned_url = self.objects.signed_url(&song.s3_key, self.link_ttl).await?;
        Ok(SongWithUrl {
            song,
            presigned_url,
        })
    }
}

/// Expiration in whole seconds; must be a positive integer.
fn parse_expiration(raw: Option<&str>) -> SongResult<u64> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_LINK_TTL.as_secs());
    };
    match raw.trim().parse::<i64>() {
        Ok(seconds) if seconds > MAX_LINK_TTL_SECS => Err(SongError::Validation(format!(
            "Expiration must not exceed {MAX_LINK_TTL_SECS} seconds"
        ))),
        Ok(seconds) if seconds > 0 => Ok(seconds as u64),
        _ => Err(SongError::Validation(
            "Expiration must be a positive number of seconds".into(),
        )),
    }
}

use super::{SongError, SongResult, SongService};
use crate::{
    models::song::{DEFAULT_CREATED_BY, NewSong, SongFields, SongRecord, object_key},
    services::object_store::StoreError,
};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A fully buffered file taken from the multipart request.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Descriptive fields of the stored file, echoed back to the client.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileInfo {
    pub original_name: String,
    pub key: String,
    pub mime_type: String,
    pub size: i64,
    pub artist: String,
    pub song_name: String,
    pub compression_type: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct UploadOutcome {
    pub file: UploadedFileInfo,
    pub song: SongRecord,
}

impl SongService {
    /// Store the bytes, then record the row that references them.
    ///
    /// If the insert fails the object stays in the store; the caller sees
    /// `UploadFailed` either way.
    pub async fn upload(&self, file: UploadedFile) -> SongResult<UploadOutcome> {
        let UploadedFile {
            file_name,
            content_type,
            data,
        } = file;

        let size = i64::try_from(data.len())
            .map_err(|_| SongError::Validation("File is too large".into()))?;
        let fields = SongFields::from_file_name(&file_name);
        let mime_type = content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        let uploaded_at = Utc::now();
        let key = object_key(uploaded_at, &file_name);

        let key = self
            .objects
            .put(&key, data, &mime_type)
            .await
            .map_err(|err| match err {
                StoreError::InvalidKey(_) => {
                    SongError::Validation(format!("Unsupported file name `{file_name}`"))
                }
                other => {
                    tracing::error!(error = %other, key = %key, "object write failed, nothing recorded");
                    SongError::UploadFailed(other.to_string())
                }
            })?;

        let new_song = NewSong {
            artist: fields.artist.clone(),
            song_name: fields.song_name.clone(),
            file_name: file_name.clone(),
            compression_type: fields.compression_type.clone(),
            created_by: DEFAULT_CREATED_BY.to_string(),
            metadata: json!({
                "originalName": file_name,
                "uploadedAt": uploaded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                "size": size,
                "mimeType": mime_type,
            }),
            file_size: size,
            s3_key: key.clone(),
            mime_type: mime_type.clone(),
        };

        let song = self.songs.insert(new_song).await.map_err(|err| {
            tracing::error!(error = %err, key = %key, "metadata insert failed, object left orphaned");
            SongError::UploadFailed(err.to_string())
        })?;

        tracing::info!(song_id = %song.id, key = %key, size_bytes = size, "song uploaded");

        Ok(UploadOutcome {
            file: UploadedFileInfo {
                original_name: file_name,
                key,
                mime_type,
                size,
                artist: fields.artist,
                song_name: fields.song_name,
                compression_type: fields.compression_type,
            },
            song,
        })
    }
}

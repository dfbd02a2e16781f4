//! `POST /upload`: multipart intake of a single audio file.

use crate::{
    errors::{AppError, ErrorKind},
    services::song_service::{UploadOutcome, UploadedFile},
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
};
use serde::Serialize;

/// Multipart field carrying the audio file.
pub const AUDIO_FIELD: &str = "audio";

#[derive(Serialize)]
pub struct UploadResponse {
    message: &'static str,
    #[serde(flatten)]
    outcome: UploadOutcome,
}

pub async fn upload_song(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let multipart = multipart?;
    let file = read_single_file(multipart, AUDIO_FIELD)
        .await?
        .ok_or_else(|| AppError::validation("No audio file provided"))?;

    tracing::debug!(
        file_name = %file.file_name,
        size_bytes = file.data.len(),
        "received upload"
    );

    let outcome = state.songs.upload(file).await?;
    Ok(Json(UploadResponse {
        message: "File uploaded successfully",
        outcome,
    }))
}

/// Buffer the first file found under `field_name`; other fields are skipped.
/// A field without a filename does not count as a file.
async fn read_single_file(
    mut multipart: Multipart,
    field_name: &str,
) -> Result<Option<UploadedFile>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(field_name) {
            continue;
        }
        let Some(file_name) = field.file_name().filter(|n| !n.is_empty()).map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;

        return Ok(Some(UploadedFile {
            file_name,
            content_type,
            data,
        }));
    }
    Ok(None)
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), ErrorKind::Validation, err.body_text())
}

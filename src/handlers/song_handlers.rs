//! Song retrieval and deletion handlers.
//!
//! - `GET    /files/song/{song_id}`      -> 302 to a signed link
//! - `GET    /files/download/{song_id}`  -> bytes proxied through this service
//! - `DELETE /files/song/{song_id}`      -> row + object removal report
//! - `GET    /files/random`              -> one random song (or none)
//! - `GET    /files/all`                 -> every song, newest first
//! - `GET    /files/retrieve/{file_key}` -> signed link for a raw bucket key
//! - `GET    /files/random/objects`      -> random raw bucket objects

use crate::{
    errors::AppError,
    models::song::SongRecord,
    services::song_service::{DeletionReport, ObjectLink, SampledObject, SongWithUrl},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Byte length of the song behind a redirect.
pub const X_FILE_SIZE: HeaderName = HeaderName::from_static("x-file-size");

const PROXY_CACHE_CONTROL: &str = "private, max-age=3600";
const DEFAULT_SAMPLE_COUNT: usize = 3;
const MAX_SAMPLE_COUNT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct ExpirationQuery {
    pub expiration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SampleQuery {
    pub count: Option<usize>,
}

#[derive(Serialize)]
pub struct RandomSongResponse {
    message: &'static str,
    song: Option<SongWithUrl>,
    count: usize,
}

#[derive(Serialize)]
pub struct AllSongsResponse {
    message: String,
    songs: Vec<SongWithUrl>,
    count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSongResponse {
    message: &'static str,
    song_id: String,
    #[serde(flatten)]
    report: DeletionReport,
}

#[derive(Serialize)]
pub struct SampleResponse {
    objects: Vec<SampledObject>,
    count: usize,
}

/// `GET /files/song/{song_id}`: redirect to a freshly signed link.
pub async fn song_redirect(
    State(state): State<AppState>,
    Path(song_id): Path<String>,
) -> Result<Response, AppError> {
    let download = state.songs.song_download(&song_id).await?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::FOUND;
    let headers = response.headers_mut();
    set_download_headers(headers, &download.song);
    headers.insert(
        X_FILE_SIZE,
        HeaderValue::from(download.song.file_size.max(0)),
    );
    let location = HeaderValue::from_str(&download.url)
        .map_err(|_| AppError::internal("Signed link is not a valid header value"))?;
    headers.insert(header::LOCATION, location);

    Ok(response)
}

/// `GET /files/download/{song_id}`: stream the object through this service
/// so the signed link never reaches the client.
pub async fn song_download(
    State(state): State<AppState>,
    Path(song_id): Path<String>,
) -> Result<Response, AppError> {
    let stream = state.songs.song_stream(&song_id).await?;
    let length = stream
        .body
        .content_length
        .unwrap_or(stream.song.file_size.max(0) as u64);

    let mut response = Response::new(Body::from_stream(stream.body.stream));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    set_download_headers(headers, &stream.song);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(PROXY_CACHE_CONTROL),
    );

    Ok(response)
}

/// `DELETE /files/song/{song_id}`
pub async fn delete_song(
    State(state): State<AppState>,
    Path(song_id): Path<String>,
) -> Result<Json<DeleteSongResponse>, AppError> {
    let report = state.songs.delete_song(&song_id).await?;
    Ok(Json(DeleteSongResponse {
        message: "Song deleted successfully",
        song_id,
        report,
    }))
}

/// `GET /files/random`
pub async fn random_song(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let song = state.songs.random_song().await?;
    let response = match song {
        Some(song) => RandomSongResponse {
            message: "Retrieved random song with metadata",
            song: Some(song),
            count: 1,
        },
        None => RandomSongResponse {
            message: "No songs found in the database",
            song: None,
            count: 0,
        },
    };
    Ok(Json(response))
}

/// `GET /files/all`
pub async fn all_songs(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let songs = state.songs.all_songs().await?;
    Ok(Json(AllSongsResponse {
        message: format!("Retrieved {} song(s) with metadata", songs.len()),
        count: songs.len(),
        songs,
    }))
}

/// `GET /files/retrieve/{file_key}?expiration=<seconds>`
pub async fn retrieve_object(
    State(state): State<AppState>,
    Path(file_key): Path<String>,
    query: Result<Query<ExpirationQuery>, QueryRejection>,
) -> Result<Json<ObjectLink>, AppError> {
    let Query(q) = query?;
    let link = state
        .songs
        .object_link(&file_key, q.expiration.as_deref())
        .await?;
    Ok(Json(link))
}

/// `GET /files/random/objects?count=<n>`
pub async fn sample_objects(
    State(state): State<AppState>,
    query: Result<Query<SampleQuery>, QueryRejection>,
) -> Result<Json<SampleResponse>, AppError> {
    let Query(q) = query?;
    let count = q
        .count
        .unwrap_or(DEFAULT_SAMPLE_COUNT)
        .clamp(1, MAX_SAMPLE_COUNT);
    let objects = state.songs.sample_objects(count).await?;
    Ok(Json(SampleResponse {
        count: objects.len(),
        objects,
    }))
}

fn set_download_headers(headers: &mut HeaderMap, song: &SongRecord) {
    let file_name = if song.file_name.is_empty() {
        format!("{} - {}.{}", song.artist, song.song_name, song.compression_type)
    } else {
        song.file_name.clone()
    };

    headers.insert(header::CONTENT_DISPOSITION, content_disposition(&file_name));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&song.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
}

/// `attachment` disposition with an ASCII fallback name plus the exact UTF-8
/// name in RFC 5987 form.
pub(crate) fn content_disposition(file_name: &str) -> HeaderValue {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(file_name, NON_ALPHANUMERIC)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_keeps_ascii_names_readable() {
        let value = content_disposition("Artist - Title.mp3");
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename=\"Artist - Title.mp3\"; filename*=UTF-8''Artist%20%2D%20Title%2Emp3"
        );
    }

    #[test]
    fn disposition_escapes_quotes_and_non_ascii() {
        let value = content_disposition("Björk \"Live\".wav");
        let text = value.to_str().unwrap();
        assert!(text.starts_with("attachment; filename=\"Bj_rk _Live_.wav\";"));
        assert!(text.contains("filename*=UTF-8''Bj%C3%B6rk%20%22Live%22%2Ewav"));
    }
}

//! `GET /objects/{*key}`: delivery endpoint for signed links minted by the
//! on-disk backend. Streams object bodies to avoid buffering in memory.

use crate::{
    errors::AppError,
    handlers::song_handlers::content_disposition,
    services::{object_store::ObjectStore, song_service::SongError},
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SignedLinkQuery {
    pub expires: i64,
    pub signature: String,
}

pub async fn get_signed_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    query: Result<Query<SignedLinkQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(q) = query?;
    let Some(store) = state.signed_objects.as_ref() else {
        return Err(AppError::not_found("Signed links are not served by this backend"));
    };

    if !store.verify_link(&key, q.expires, &q.signature, Utc::now()) {
        tracing::debug!(key = %key, "rejected expired or forged link");
        return Err(AppError::forbidden("Link is expired or invalid"));
    }

    let body = store.get(&key).await.map_err(SongError::from)?;

    let mut response = Response::new(Body::from_stream(body.stream));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Some(length) = body.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    let file_name = key.rsplit('/').next().unwrap_or(&key);
    headers.insert(header::CONTENT_DISPOSITION, content_disposition(file_name));

    Ok(response)
}

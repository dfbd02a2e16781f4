//! Defines the HTTP surface of the song service.
//!
//! ## Structure
//! - **Service endpoints**
//!   - `GET    /`         banner
//!   - `GET    /healthz`  liveness
//!   - `GET    /readyz`   readiness (database + object store)
//!
//! - **Song endpoints**
//!   - `POST   /upload`                     multipart upload, field `audio`
//!   - `GET    /files/song/{song_id}`       redirect to a signed link
//!   - `DELETE /files/song/{song_id}`       delete row and object (admin)
//!   - `GET    /files/download/{song_id}`   proxied download
//!   - `GET    /files/random`               one random song
//!   - `GET    /files/all`                  every song, newest first
//!
//! - **Object endpoints**
//!   - `GET    /files/retrieve/{file_key}`  signed link for a raw key
//!   - `GET    /files/random/objects`       random sample of raw keys
//!   - `GET    /objects/{*key}`             signed-link delivery (local backend)
//!
//! - **Tools**
//!   - `POST   /convert`                    mp3 <-> wav (admin)

use crate::{
    handlers::{
        convert_handlers::convert,
        health_handlers::{banner, healthz, readyz},
        object_handlers::get_signed_object,
        song_handlers::{
            all_songs, delete_song, random_song, retrieve_object, sample_objects, song_download,
            song_redirect,
        },
        upload_handlers::upload_song,
    },
    middleware::require_admin,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the router for every endpoint. State is attached by the caller.
/// `max_upload_bytes` caps the body of `POST /upload` only.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // service endpoints
        .route("/", get(banner))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // songs
        .route(
            "/upload",
            post(upload_song).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route(
            "/files/song/{song_id}",
            get(song_redirect).merge(
                delete(delete_song).route_layer(from_fn(require_admin)),
            ),
        )
        .route("/files/download/{song_id}", get(song_download))
        .route("/files/random", get(random_song))
        .route("/files/all", get(all_songs))
        // raw objects
        .route("/files/retrieve/{file_key}", get(retrieve_object))
        .route("/files/random/objects", get(sample_objects))
        .route("/objects/{*key}", get(get_signed_object))
        // tools
        .route(
            "/convert",
            post(convert).route_layer(from_fn(require_admin)),
        )
}

/// Full application: routes, state and the outer layers.
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    routes(max_upload_bytes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

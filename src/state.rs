//! Shared application state handed to every handler.

use crate::services::{
    convert_service::ConvertService, object_store::LocalObjectStore, song_service::SongService,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub songs: SongService,
    pub converter: ConvertService,

    /// Present when the on-disk backend is active; serves its signed links.
    pub signed_objects: Option<Arc<LocalObjectStore>>,
}

impl AppState {
    pub fn new(songs: SongService, converter: ConvertService) -> Self {
        Self {
            songs,
            converter,
            signed_objects: None,
        }
    }

    pub fn with_signed_objects(mut self, store: Arc<LocalObjectStore>) -> Self {
        self.signed_objects = Some(store);
        self
    }
}

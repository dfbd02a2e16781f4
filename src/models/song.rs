//! Represents an uploaded song and the descriptive fields derived from its filename.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, types::Json};
use std::path::Path;
use uuid::Uuid;

/// Artist used when the filename carries no `" - "` separator.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Compression type used when the filename has no extension.
pub const UNKNOWN_COMPRESSION: &str = "unknown";

/// Attribution recorded on every upload until real authentication exists.
pub const DEFAULT_CREATED_BY: &str = "system";

const ARTIST_SEPARATOR: &str = " - ";

/// One row of the `songs` table.
///
/// The row stores descriptive metadata only; the audio bytes live in the
/// object store under `s3_key`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct SongRecord {
    /// Assigned by the metadata store at insert time.
    pub id: Uuid,

    pub artist: String,

    pub song_name: String,

    /// Original client-supplied filename, verbatim.
    pub file_name: String,

    /// Lowercase file extension, or `"unknown"`.
    pub compression_type: String,

    pub created_by: String,

    /// Assigned by the metadata store at insert time.
    pub created_at: DateTime<Utc>,

    /// Open key/value document (original filename, upload timestamp, ...).
    pub metadata: Json<Value>,

    /// Byte length measured before the object store write.
    pub file_size: i64,

    /// Object store key holding the audio bytes.
    pub s3_key: String,

    /// Content type declared by the client.
    pub mime_type: String,
}

/// A song row before the metadata store has assigned `id` and `created_at`.
#[derive(Clone, Debug, PartialEq)]
pub struct NewSong {
    pub artist: String,
    pub song_name: String,
    pub file_name: String,
    pub compression_type: String,
    pub created_by: String,
    pub metadata: Value,
    pub file_size: i64,
    pub s3_key: String,
    pub mime_type: String,
}

/// Descriptive fields derived from an uploaded filename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SongFields {
    pub artist: String,
    pub song_name: String,
    pub compression_type: String,
}

impl SongFields {
    /// Split `"Artist - Title.ext"` into artist, title and extension.
    ///
    /// Only the first separator splits, so `"A - B - C.mp3"` yields artist
    /// `A` and title `B - C`.
    pub fn from_file_name(file_name: &str) -> Self {
        let path = Path::new(file_name);
        let base = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);

        let compression_type = path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| UNKNOWN_COMPRESSION.to_string());

        let (artist, song_name) = match base.split_once(ARTIST_SEPARATOR) {
            Some((artist, title)) if !artist.trim().is_empty() => {
                (artist.trim().to_string(), title.trim().to_string())
            }
            Some((_, title)) => (UNKNOWN_ARTIST.to_string(), title.trim().to_string()),
            None => (UNKNOWN_ARTIST.to_string(), base.to_string()),
        };

        Self {
            artist,
            song_name,
            compression_type,
        }
    }
}

/// Build the object key for an upload: `<epoch-millis>-<original filename>`.
pub fn object_key(uploaded_at: DateTime<Utc>, file_name: &str) -> String {
    format!("{}-{}", uploaded_at.timestamp_millis(), file_name)
}

/// Parse a song identifier in canonical 8-4-4-4-12 hex form (any case).
///
/// `Uuid::parse_str` also accepts braced, URN and unhyphenated forms, so the
/// shape is checked first.
pub fn parse_song_id(raw: &str) -> Option<Uuid> {
    let canonical = raw.len() == 36
        && raw.bytes().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => b == b'-',
            _ => b.is_ascii_hexdigit(),
        });
    if !canonical {
        return None;
    }
    Uuid::parse_str(raw).ok()
}

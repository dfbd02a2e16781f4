use super::{SongResult, SongService, song_id, song_not_found};
use crate::models::song::SongRecord;
use serde::Serialize;
use uuid::Uuid;

/// Identifying fields of a removed song.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct DeletedSong {
    pub id: Uuid,
    pub artist: String,
    pub song_name: String,
    pub file_name: String,
    pub s3_key: String,
}

impl From<SongRecord> for DeletedSong {
    fn from(song: SongRecord) -> Self {
        Self {
            id: song.id,
            artist: song.artist,
            song_name: song.song_name,
            file_name: song.file_name,
            s3_key: song.s3_key,
        }
    }
}

/// Outcome of both deletion steps. `deleted_from_s3 == false` means the row
/// is gone but the object may remain.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    pub deleted_from_database: bool,
    pub deleted_from_s3: bool,
    pub song: DeletedSong,
}

impl SongService {
    /// Remove the row first, then the object on a best-effort basis.
    pub async fn delete_song(&self, raw_id: &str) -> SongResult<DeletionReport> {
        let id = song_id(raw_id)?;
        let song = self.songs.get_by_id(id).await?.ok_or_else(song_not_found)?;

        // A concurrent delete may have won between the lookup and here.
        if !self.songs.delete_by_id(id).await? {
            return Err(song_not_found());
        }

        let deleted_from_s3 = match self.objects.delete(&song.s3_key).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    song_id = %id,
                    key = %song.s3_key,
                    "row deleted but object removal failed"
                );
                false
            }
        };

        tracing::info!(song_id = %id, deleted_from_s3, "song deleted");

        Ok(DeletionReport {
            deleted_from_database: true,
            deleted_from_s3,
            song: song.into(),
        })
    }
}

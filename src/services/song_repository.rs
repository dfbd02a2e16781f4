//! Metadata store adapter: one `songs` row per uploaded audio file.

use crate::models::song::{NewSong, SongRecord};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqlitePool, types::Json};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Schema applied by `--migrate` and by tests.
pub const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

const SONG_COLUMNS: &str = "id, artist, song_name, file_name, compression_type, created_by, \
     created_at, metadata, file_size, s3_key, mime_type";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("song with key `{0}` already exists")]
    DuplicateKey(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

#[async_trait]
pub trait SongRepository: Send + Sync {
    /// Insert a row; `id` and `created_at` are assigned here, never by the caller.
    async fn insert(&self, song: NewSong) -> MetadataResult<SongRecord>;

    async fn get_by_id(&self, id: Uuid) -> MetadataResult<Option<SongRecord>>;

    /// One uniformly sampled row, or `None` on an empty table.
    async fn get_random(&self) -> MetadataResult<Option<SongRecord>>;

    /// Every row, newest first.
    async fn list_all(&self) -> MetadataResult<Vec<SongRecord>>;

    /// `false` when no row matched.
    async fn delete_by_id(&self, id: Uuid) -> MetadataResult<bool>;

    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> MetadataResult<()>;
}

/// `SongRepository` backed by a shared SQLite pool.
#[derive(Clone)]
pub struct SqliteSongRepository {
    db: Arc<SqlitePool>,
}

impl SqliteSongRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SongRepository for SqliteSongRepository {
    async fn insert(&self, song: NewSong) -> MetadataResult<SongRecord> {
        let sql = format!(
            "INSERT INTO songs ({SONG_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {SONG_COLUMNS}"
        );
        let s3_key = song.s3_key.clone();

        sqlx::query_as::<_, SongRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(song.artist)
            .bind(song.song_name)
            .bind(song.file_name)
            .bind(song.compression_type)
            .bind(song.created_by)
            .bind(Utc::now())
            .bind(Json(song.metadata))
            .bind(song.file_size)
            .bind(song.s3_key)
            .bind(song.mime_type)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    MetadataError::DuplicateKey(s3_key)
                } else {
                    MetadataError::Sqlx(err)
                }
            })
    }

    async fn get_by_id(&self, id: Uuid) -> MetadataResult<Option<SongRecord>> {
        let sql = format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ? LIMIT 1");
        Ok(sqlx::query_as::<_, SongRecord>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?)
    }

    async fn get_random(&self) -> MetadataResult<Option<SongRecord>> {
        let sql = format!("SELECT {SONG_COLUMNS} FROM songs ORDER BY RANDOM() LIMIT 1");
        Ok(sqlx::query_as::<_, SongRecord>(&sql)
            .fetch_optional(&*self.db)
            .await?)
    }

    async fn list_all(&self) -> MetadataResult<Vec<SongRecord>> {
        let sql = format!("SELECT {SONG_COLUMNS} FROM songs ORDER BY created_at DESC, rowid DESC");
        Ok(sqlx::query_as::<_, SongRecord>(&sql)
            .fetch_all(&*self.db)
            .await?)
    }

    async fn delete_by_id(&self, id: Uuid) -> MetadataResult<bool> {
        let result = sqlx::query("DELETE FROM songs WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> MetadataResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

/// Apply the embedded schema statement by statement.
pub async fn run_migrations(db: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = MIGRATION_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

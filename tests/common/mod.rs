#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request};
use bytes::Bytes;
use chrono::Utc;
use futures::{StreamExt, stream};
use song_store::{
    models::{
        object::ObjectSummary,
        song::{NewSong, SongRecord},
    },
    routes::routes::app,
    services::{
        convert_service::ConvertService,
        object_store::{ObjectBody, ObjectStore, StoreError, StoreResult},
        song_repository::{MetadataError, MetadataResult, SongRepository},
        song_service::SongService,
    },
    state::AppState,
};
use sqlx::types::Json;
use std::{
    collections::BTreeMap,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use uuid::Uuid;

pub const BOUNDARY: &str = "song-store-test-boundary";

/// In-memory object store that counts every call.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Bytes>>,
    pub calls: AtomicUsize,
    pub puts: AtomicUsize,
    pub deletes: AtomicUsize,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_list: AtomicBool,
}

impl MemoryObjectStore {
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn insert_raw(&self, key: &str, data: &'static [u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::from_static(data));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> StoreResult<String> {
        self.touch();
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed {
                key: key.to_string(),
                reason: "bucket unavailable".into(),
            });
        }
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(key.to_string())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.touch();
        Ok(self.contains(key))
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        self.touch();
        Ok(format!("https://objects.test/{key}?ttl={}", ttl.as_secs()))
    }

    async fn get(&self, key: &str) -> StoreResult<ObjectBody> {
        self.touch();
        let data = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound(key.to_string()))?;
        Ok(ObjectBody {
            content_length: Some(data.len() as u64),
            stream: stream::iter([Ok::<_, std::io::Error>(data)]).boxed(),
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.touch();
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("delete refused".into()));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list(&self, max_keys: usize) -> StoreResult<Vec<ObjectSummary>> {
        self.touch();
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("minio.internal:9000 connection refused".into()));
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .take(max_keys)
            .map(|(key, data)| ObjectSummary {
                key: key.clone(),
                size: data.len() as i64,
                last_modified: None,
            })
            .collect())
    }
}

/// In-memory metadata store that counts every call.
#[derive(Default)]
pub struct MemorySongRepository {
    rows: Mutex<Vec<SongRecord>>,
    pub calls: AtomicUsize,
    pub fail_insert: AtomicBool,
}

impl MemorySongRepository {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SongRepository for MemorySongRepository {
    async fn insert(&self, song: NewSong) -> MetadataResult<SongRecord> {
        self.touch();
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(MetadataError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|row| row.s3_key == song.s3_key) {
            return Err(MetadataError::DuplicateKey(song.s3_key));
        }
        let record = SongRecord {
            id: Uuid::new_v4(),
            artist: song.artist,
            song_name: song.song_name,
            file_name: song.file_name,
            compression_type: song.compression_type,
            created_by: song.created_by,
            created_at: Utc::now(),
            metadata: Json(song.metadata),
            file_size: song.file_size,
            s3_key: song.s3_key,
            mime_type: song.mime_type,
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: Uuid) -> MetadataResult<Option<SongRecord>> {
        self.touch();
        Ok(self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn get_random(&self) -> MetadataResult<Option<SongRecord>> {
        self.touch();
        Ok(self.rows.lock().unwrap().first().cloned())
    }

    async fn list_all(&self) -> MetadataResult<Vec<SongRecord>> {
        self.touch();
        let mut rows = self.rows.lock().unwrap().clone();
        rows.reverse();
        Ok(rows)
    }

    async fn delete_by_id(&self, id: Uuid) -> MetadataResult<bool> {
        self.touch();
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() != before)
    }

    async fn ping(&self) -> MetadataResult<()> {
        self.touch();
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub objects: Arc<MemoryObjectStore>,
    pub songs: Arc<MemorySongRepository>,
    pub uploads_dir: tempfile::TempDir,
}

pub fn setup_test_app() -> TestApp {
    let objects = Arc::new(MemoryObjectStore::default());
    let songs = Arc::new(MemorySongRepository::default());
    let uploads_dir = tempfile::tempdir().unwrap();

    let service = SongService::new(objects.clone(), songs.clone());
    let converter = ConvertService::new(uploads_dir.path(), "definitely-not-ffmpeg");
    let router = app(AppState::new(service, converter), 10 * 1024 * 1024);

    TestApp {
        router,
        objects,
        songs,
        uploads_dir,
    }
}

/// Multipart body holding one file part.
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(file_name: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body("audio", file_name, "audio/mpeg", data)))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: axum::response::Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn write_fixture(dir: &Path, name: &str, data: &[u8]) {
    std::fs::write(dir.join(name), data).unwrap();
}

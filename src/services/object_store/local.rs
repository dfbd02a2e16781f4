//! On-disk object store with HMAC-signed download links.
//!
//! Payloads are sharded beneath `base_path/{shard}/{shard}/{key}` where the
//! shards are the first two bytes of `md5(key)`. Signed links point at this
//! service's `GET /objects/{*key}` route and carry an expiry timestamp and an
//! HMAC-SHA256 signature over `key \n expires`.

use super::{ObjectBody, ObjectStore, StoreError, StoreResult};
use crate::models::object::ObjectSummary;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::Sha256;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const TMP_PREFIX: &str = ".tmp-";

/// Characters left unescaped in the key segment of a signed link.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

#[derive(Clone)]
pub struct LocalObjectStore {
    base_path: PathBuf,
    public_base_url: String,
    signing_key: Vec<u8>,
}

impl LocalObjectStore {
    pub fn new(
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
        signing_key: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            signing_key: signing_key.into(),
        }
    }

    /// Reject keys that could escape `base_path`.
    fn ensure_key_safe(key: &str) -> StoreResult<()> {
        let invalid = key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key.starts_with('/')
            || key.split('/').any(|segment| segment == ".." || segment == ".")
            || key.starts_with(TMP_PREFIX)
            || key.bytes().any(|b| b.is_ascii_control() || b == b'\\');
        if invalid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    fn object_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    fn signature(&self, key: &str, expires: i64) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key).ok()?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Some(mac)
    }

    /// Check a link produced by [`ObjectStore::signed_url`] at time `now`.
    pub fn verify_link(&self, key: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> bool {
        if expires < now.timestamp() {
            return false;
        }
        let Ok(provided) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        self.signature(key, expires)
            .is_some_and(|mac| mac.verify_slice(&provided).is_ok())
    }

    fn link_at(&self, key: &str, expires: i64) -> StoreResult<String> {
        let tag = self
            .signature(key, expires)
            .ok_or_else(|| StoreError::Backend("invalid signing key".into()))?
            .finalize()
            .into_bytes();
        Ok(format!(
            "{}/objects/{}?expires={}&signature={}",
            self.public_base_url,
            utf8_percent_encode(key, KEY_ENCODE_SET),
            expires,
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }

    /// Recover an object key from its sharded on-disk path.
    fn key_from_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let key: PathBuf = relative.components().skip(2).collect();
        let key = key.to_str()?.replace(std::path::MAIN_SEPARATOR, "/");
        (!key.is_empty()).then_some(key)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    /// Writes to a temp file first and renames it into place, so readers never
    /// observe a partial object.
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> StoreResult<String> {
        Self::ensure_key_safe(key)?;
        let write_failed = |err: io::Error| StoreError::WriteFailed {
            key: key.to_string(),
            reason: err.to_string(),
        };

        let file_path = self.object_path(key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(&parent).await.map_err(write_failed)?;

        let tmp_path = parent.join(format!("{TMP_PREFIX}{}", Uuid::new_v4()));
        let result = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &file_path).await
        }
        .await;

        if let Err(err) = result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(write_failed(err));
        }

        debug!(key = %key, size_bytes = data.len(), "stored object on disk");
        Ok(key.to_string())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Self::ensure_key_safe(key)?;
        match fs::metadata(self.object_path(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        Self::ensure_key_safe(key)?;
        let ttl = i64::try_from(ttl.as_secs())
            .map_err(|_| StoreError::Backend("link lifetime out of range".into()))?;
        self.link_at(key, Utc::now().timestamp().saturating_add(ttl))
    }

    async fn get(&self, key: &str) -> StoreResult<ObjectBody> {
        Self::ensure_key_safe(key)?;
        let file = File::open(self.object_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::ObjectNotFound(key.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        let content_length = file.metadata().await.ok().map(|m| m.len());

        Ok(ObjectBody {
            content_length,
            stream: ReaderStream::new(file).boxed(),
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StoreError::Io(err)),
        }
        Ok(())
    }

    async fn list(&self, max_keys: usize) -> StoreResult<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut pending = vec![self.base_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StoreError::Io(err)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                let path = entry.path();
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                if entry.file_name().to_string_lossy().starts_with(TMP_PREFIX) {
                    continue;
                }
                if let Some(key) = self.key_from_path(&path) {
                    objects.push(ObjectSummary {
                        key,
                        size: i64::try_from(meta.len()).unwrap_or(i64::MAX),
                        last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
                    });
                }
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        objects.truncate(max_keys);
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn store(dir: &Path) -> LocalObjectStore {
        LocalObjectStore::new(dir, "http://localhost:5001/", b"test-secret".to_vec())
    }

    async fn read_all(body: ObjectBody) -> Vec<u8> {
        body.stream
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn put_then_get_roundtrips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let key = store
            .put("1-Artist - Song.mp3", Bytes::from_static(b"ID3 data"), "audio/mpeg")
            .await
            .unwrap();
        assert_eq!(key, "1-Artist - Song.mp3");
        assert!(store.exists(&key).await.unwrap());

        let body = store.get(&key).await.unwrap();
        assert_eq!(body.content_length, Some(8));
        assert_eq!(read_all(body).await, b"ID3 data");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        assert!(!store.exists("nope.mp3").await.unwrap());
        assert!(matches!(
            store.get("nope.mp3").await,
            Err(StoreError::ObjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.put("k.wav", Bytes::from_static(b"x"), "audio/wav").await.unwrap();
        store.delete("k.wav").await.unwrap();
        assert!(!store.exists("k.wav").await.unwrap());
        store.delete("k.wav").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        for key in ["", "/etc/passwd", "../up.mp3", "a/../b.mp3", "./a.mp3", "a\\b", ".tmp-x"] {
            assert!(matches!(
                store.put(key, Bytes::new(), "audio/mpeg").await,
                Err(StoreError::InvalidKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn dots_inside_names_are_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        for key in ["1-Wait... What.mp3", "2-..intro.wav", "3-a..b/c.mp3"] {
            store.put(key, Bytes::from_static(b"ID3"), "audio/mpeg").await.unwrap();
            assert!(store.exists(key).await.unwrap());
        }
    }

    #[tokio::test]
    async fn list_recovers_keys_and_caps_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        for key in ["a.mp3", "b.mp3", "c.mp3"] {
            store.put(key, Bytes::from_static(b"abc"), "audio/mpeg").await.unwrap();
        }

        let all = store.list(10).await.unwrap();
        let keys: Vec<_> = all.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, ["a.mp3", "b.mp3", "c.mp3"]);
        assert!(all.iter().all(|o| o.size == 3));

        assert_eq!(store.list(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_on_fresh_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir.path().join("not-created-yet"));
        assert!(store.list(5).await.unwrap().is_empty());
    }

    #[test]
    fn signed_links_verify_until_expiry() {
        let store = store(Path::new("/unused"));
        let now = Utc::now();
        let expires = now.timestamp() + 60;

        let link = store.link_at("1-My Song.mp3", expires).unwrap();
        assert!(link.starts_with("http://localhost:5001/objects/1-My%20Song.mp3?expires="));

        let signature = link.rsplit("signature=").next().unwrap();
        assert!(store.verify_link("1-My Song.mp3", expires, signature, now));
        assert!(!store.verify_link("other.mp3", expires, signature, now));
        assert!(!store.verify_link("1-My Song.mp3", expires + 1, signature, now));

        let later = now + chrono::Duration::seconds(120);
        assert!(!store.verify_link("1-My Song.mp3", expires, signature, later));
        assert!(!store.verify_link("1-My Song.mp3", expires, "%%%", now));
    }
}

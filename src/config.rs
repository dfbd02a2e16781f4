use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, str::FromStr};
use uuid::Uuid;

const DEFAULT_PORT: u16 = 5001;
const DEFAULT_LINK_TTL_SECS: u64 = 3600;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub storage: StorageConfig,
    pub link_ttl_secs: u64,
    pub max_upload_bytes: usize,
    pub uploads_dir: String,
    pub ffmpeg_path: String,
}

/// Which object store backs the service.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    S3(S3Config),
    Local(LocalConfig),
}

#[derive(Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub force_path_style: bool,
}

// Credentials stay out of startup logs.
impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("static_credentials", &self.access_key.is_some())
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

#[derive(Clone)]
pub struct LocalConfig {
    pub storage_dir: String,
    pub public_base_url: String,
    pub signing_secret: String,
}

impl std::fmt::Debug for LocalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalConfig")
            .field("storage_dir", &self.storage_dir)
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Audio upload and retrieval service")]
pub struct Args {
    /// Host to bind to (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object store backend, `s3` or `local` (overrides SONG_STORAGE_BACKEND)
    #[arg(long)]
    pub storage_backend: Option<String>,

    /// Directory for the local backend (overrides SONG_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Directory the conversion endpoint reads from (overrides SONG_UPLOADS_DIR)
    #[arg(long)]
    pub uploads_dir: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values looked up with `var`, over defaults.
    pub fn resolve(args: Args, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match args.port {
            Some(port) => port,
            None => parse_var(&var, "PORT")?.unwrap_or(DEFAULT_PORT),
        };

        let backend = args
            .storage_backend
            .or_else(|| var("SONG_STORAGE_BACKEND"))
            .unwrap_or_else(|| "s3".into())
            .to_ascii_lowercase();

        let storage = match backend.as_str() {
            "s3" => StorageConfig::S3(S3Config {
                bucket: var("SONG_BUCKET_NAME")
                    .context("SONG_BUCKET_NAME is required for the s3 backend")?,
                region: var("SONG_BUCKET_REGION")
                    .unwrap_or_else(|| "us-east-1".into())
                    .to_lowercase(),
                endpoint: var("SONG_BUCKET_ENDPOINT").filter(|v| !v.is_empty()),
                access_key: var("SONG_BUCKET_KEY").filter(|v| !v.is_empty()),
                secret_key: var("SONG_BUCKET_SECRET").filter(|v| !v.is_empty()),
                force_path_style: parse_var(&var, "SONG_BUCKET_PATH_STYLE")?.unwrap_or(true),
            }),
            "local" => StorageConfig::Local(LocalConfig {
                storage_dir: args
                    .storage_dir
                    .or_else(|| var("SONG_STORAGE_DIR"))
                    .unwrap_or_else(|| "./data/objects".into()),
                public_base_url: var("SONG_PUBLIC_BASE_URL")
                    .unwrap_or_else(|| format!("http://localhost:{port}")),
                signing_secret: match var("SONG_SIGNING_SECRET") {
                    Some(secret) if !secret.is_empty() => secret,
                    _ => {
                        tracing::warn!(
                            "SONG_SIGNING_SECRET not set; signed links will not survive a restart"
                        );
                        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
                    }
                },
            }),
            other => bail!("unknown storage backend `{other}` (expected `s3` or `local`)"),
        };

        let link_ttl_secs = parse_var(&var, "SONG_LINK_TTL_SECS")?.unwrap_or(DEFAULT_LINK_TTL_SECS);
        if link_ttl_secs == 0 {
            bail!("SONG_LINK_TTL_SECS must be positive");
        }

        Ok(Self {
            host: args.host.or_else(|| var("HOST")).unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_url: args
                .database_url
                .or_else(|| var("DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/songs.db".into()),
            storage,
            link_ttl_secs,
            max_upload_bytes: parse_var(&var, "SONG_MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            uploads_dir: args
                .uploads_dir
                .or_else(|| var("SONG_UPLOADS_DIR"))
                .unwrap_or_else(|| "./uploads".into()),
            ffmpeg_path: var("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".into()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(name)
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", name, value))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn s3_backend_reads_bucket_env() {
        let cfg = AppConfig::resolve(
            Args::default(),
            lookup(&[
                ("SONG_BUCKET_NAME", "songs"),
                ("SONG_BUCKET_REGION", "NYC3"),
                ("SONG_BUCKET_ENDPOINT", "https://nyc3.digitaloceanspaces.com"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.port, 5001);
        assert_eq!(cfg.link_ttl_secs, 3600);
        match cfg.storage {
            StorageConfig::S3(s3) => {
                assert_eq!(s3.bucket, "songs");
                assert_eq!(s3.region, "nyc3");
                assert!(s3.force_path_style);
                assert!(s3.access_key.is_none());
            }
            other => panic!("unexpected storage {other:?}"),
        }
    }

    #[test]
    fn s3_backend_requires_bucket() {
        assert!(AppConfig::resolve(Args::default(), lookup(&[])).is_err());
    }

    #[test]
    fn cli_overrides_env() {
        let args = Args {
            port: Some(8080),
            storage_backend: Some("local".into()),
            storage_dir: Some("/tmp/objects".into()),
            ..Args::default()
        };
        let cfg = AppConfig::resolve(
            args,
            lookup(&[("PORT", "9000"), ("SONG_STORAGE_DIR", "/ignored")]),
        )
        .unwrap();

        assert_eq!(cfg.addr(), "0.0.0.0:8080");
        match cfg.storage {
            StorageConfig::Local(local) => {
                assert_eq!(local.storage_dir, "/tmp/objects");
                assert_eq!(local.public_base_url, "http://localhost:8080");
                assert!(!local.signing_secret.is_empty());
            }
            other => panic!("unexpected storage {other:?}"),
        }
    }

    #[test]
    fn malformed_numbers_are_errors() {
        let env = lookup(&[("SONG_BUCKET_NAME", "songs"), ("PORT", "eighty")]);
        assert!(AppConfig::resolve(Args::default(), env).is_err());

        let env = lookup(&[("SONG_BUCKET_NAME", "songs"), ("SONG_LINK_TTL_SECS", "0")]);
        assert!(AppConfig::resolve(Args::default(), env).is_err());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let args = Args {
            storage_backend: Some("ftp".into()),
            ..Args::default()
        };
        assert!(AppConfig::resolve(args, lookup(&[])).is_err());
    }
}

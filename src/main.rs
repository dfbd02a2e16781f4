use anyhow::Result;
use song_store::{
    config::{AppConfig, StorageConfig},
    routes::routes::app,
    services::{
        convert_service::ConvertService,
        object_store::{LocalObjectStore, ObjectStore, S3ObjectStore},
        song_repository::{SqliteSongRepository, run_migrations},
        song_service::SongService,
    },
    state::AppState,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting song-store with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    if db_path != ":memory:" {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }
    }

    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(SqliteConnectOptions::from_str(db_url)?.create_if_missing(true))
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(());
    }
    // Schema statements are idempotent; a fresh database is usable right away.
    run_migrations(&db).await?;

    // --- Initialize object store ---
    let mut signed_objects = None;
    let objects: Arc<dyn ObjectStore> = match &cfg.storage {
        StorageConfig::S3(s3) => {
            tracing::info!(bucket = %s3.bucket, region = %s3.region, "using s3 object store");
            Arc::new(S3ObjectStore::new(s3).await)
        }
        StorageConfig::Local(local) => {
            if !Path::new(&local.storage_dir).exists() {
                fs::create_dir_all(&local.storage_dir)?;
                tracing::info!("Created storage directory at {}", local.storage_dir);
            }
            let store = Arc::new(LocalObjectStore::new(
                &local.storage_dir,
                &local.public_base_url,
                local.signing_secret.as_bytes(),
            ));
            signed_objects = Some(store.clone());
            store
        }
    };

    // --- Initialize core services ---
    let songs = SongService::new(objects, Arc::new(SqliteSongRepository::new(db)))
        .with_link_ttl(Duration::from_secs(cfg.link_ttl_secs));
    let converter = ConvertService::new(&cfg.uploads_dir, &cfg.ffmpeg_path);

    let mut state = AppState::new(songs, converter);
    if let Some(store) = signed_objects {
        state = state.with_signed_objects(store);
    }

    // --- Build router ---
    let app = app(state, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

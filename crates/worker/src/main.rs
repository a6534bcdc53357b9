//! Warden worker.
//!
//! - `warden-worker` runs the revocation cleanup scheduler until Ctrl-C.
//! - `warden-worker sync <manifest.json>` reconciles one service's endpoint
//!   registrations with a scanner manifest (requires `WARDEN_DATABASE_URL`).

use anyhow::{Context, bail};
use sqlx::PgPool;
use tracing::info;

use warden_infra::{
    CleanupScheduler, PostgresEndpointPermissionStore, RedisRevocationStore, RevocationCache, SyncCoordinator,
    WorkerConfig,
};
use warden_registry::ServiceManifest;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::logging::init(&warden_observability::LoggingConfig::from_env());

    let config = WorkerConfig::from_env().context("invalid worker configuration")?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [] => run_cleanup(config).await,
        [cmd, path] if cmd == "sync" => run_sync(config, path).await,
        _ => bail!("usage: warden-worker [sync <manifest.json>]"),
    }
}

async fn run_cleanup(config: WorkerConfig) -> anyhow::Result<()> {
    let store = RedisRevocationStore::new(&config.redis_url, config.revocation.keys.clone())
        .context("failed to create redis revocation store")?;
    let cache = RevocationCache::with_config(store, &config.revocation);

    let handle = CleanupScheduler::new(cache, config.cleanup.clone())
        .spawn()
        .context("failed to spawn cleanup scheduler")?;
    info!(
        interval_secs = config.cleanup.interval.as_secs(),
        batch_size = config.cleanup.batch_size,
        "worker running; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;

    let stats = tokio::task::spawn_blocking(move || handle.shutdown())
        .await
        .context("cleanup scheduler did not stop cleanly")?;
    info!(
        runs = stats.runs,
        removed_total = stats.removed_total,
        failures = stats.failures,
        "worker stopped"
    );
    Ok(())
}

async fn run_sync(config: WorkerConfig, manifest_path: &str) -> anyhow::Result<()> {
    let database_url = config
        .database_url
        .as_deref()
        .context("WARDEN_DATABASE_URL must be set for sync")?;

    let raw = tokio::fs::read_to_string(manifest_path)
        .await
        .with_context(|| format!("failed to read manifest {manifest_path}"))?;
    let manifest: ServiceManifest =
        serde_json::from_str(&raw).with_context(|| format!("invalid manifest {manifest_path}"))?;

    let pool = PgPool::connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PostgresEndpointPermissionStore::new(pool);
    store.ensure_schema().await.context("failed to prepare registry schema")?;

    let coordinator = SyncCoordinator::new(store);
    let result = tokio::task::spawn_blocking(move || coordinator.coordinate_manifest(&manifest))
        .await
        .context("sync task panicked")??;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use configs::{AppConfig, StoreBackend, StoreConfig};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use common::admin_http::spawn_admin_server;
use common::env::{ensure_data_dir, unescape_newlines};
use service::observability::encode_metrics;
use service::storage::{DocumentStore, FirestoreOptions, FirestoreStore, LocalDocumentStore, ServiceAccount};
use service::MetricService;

use crate::routes;
use crate::state::AppState;

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.server.host, cfg.server.port).parse()?)
}

/// Open the configured document store. Called once per process.
pub async fn build_store(cfg: &StoreConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match cfg.backend {
        StoreBackend::Firestore => {
            let fs = &cfg.firestore;
            let credentials = if fs.emulator_host.is_some() {
                None
            } else {
                Some(ServiceAccount::new(fs.client_email.clone(), unescape_newlines(&fs.private_key)))
            };
            Arc::new(FirestoreStore::new(FirestoreOptions {
                project_id: fs.project_id.clone(),
                collection: cfg.collection.clone(),
                credentials,
                emulator_host: fs.emulator_host.clone(),
                request_timeout: Duration::from_secs(cfg.request_timeout_secs),
            })?)
        }
        StoreBackend::File => {
            ensure_data_dir(&cfg.file_path).await?;
            Arc::new(LocalDocumentStore::open(cfg.file_path.clone()).await?)
        }
        StoreBackend::Memory => {
            warn!("memory store selected; metrics are lost on exit");
            Arc::new(LocalDocumentStore::in_memory())
        }
    };
    info!(backend = store.backend(), collection = %cfg.collection, "document store ready");
    Ok(store)
}

/// Compose state and router around an already opened store.
pub fn build_app(store: Arc<dyn DocumentStore>) -> Router {
    let state = AppState::new(MetricService::new(store));
    routes::build_router(state, build_cors())
}

/// Serve the app on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Public entry: build the app and run the HTTP server
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let store = build_store(&cfg.store).await?;
    let app = build_app(store);

    if let Some(admin_addr) = &cfg.server.admin_addr {
        spawn_admin_server(admin_addr, encode_metrics).await?;
    }

    let addr = bind_addr(&cfg)?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Server running at http://{}", addr);
    serve(listener, app, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_builds_without_credentials() -> anyhow::Result<()> {
        let mut cfg = StoreConfig::default();
        cfg.backend = StoreBackend::Memory;
        let store = build_store(&cfg).await?;
        assert_eq!(store.backend(), "memory");
        Ok(())
    }

    #[tokio::test]
    async fn firestore_backend_with_bad_key_fails_at_startup() {
        let mut cfg = StoreConfig::default();
        cfg.firestore.project_id = "p".into();
        cfg.firestore.client_email = "svc@p.iam.gserviceaccount.com".into();
        cfg.firestore.private_key = "garbage".into();
        assert!(build_store(&cfg).await.is_err());
    }

    #[tokio::test]
    async fn file_backend_creates_its_directory() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("metric_store_startup_{}", uuid::Uuid::new_v4()));
        let mut cfg = StoreConfig::default();
        cfg.backend = StoreBackend::File;
        cfg.file_path = dir.join("metrics.json").to_string_lossy().into_owned();
        let store = build_store(&cfg).await?;
        assert_eq!(store.backend(), "file");
        assert!(dir.join("metrics.json").exists());
        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[test]
    fn bind_addr_joins_host_and_port() -> anyhow::Result<()> {
        let mut cfg = AppConfig::default();
        cfg.server.host = "0.0.0.0".into();
        cfg.server.port = 3000;
        assert_eq!(bind_addr(&cfg)?.to_string(), "0.0.0.0:3000");
        Ok(())
    }
}

//! Application startup and lifecycle management.

use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::config::{IdentityConfig, StoreBackend};
use crate::services::metrics::init_metrics;
use crate::services::SessionRegistry;
use crate::store::{IdentityStore, MemoryStore, PostgresStore};
use crate::{build_router, AppState};

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: IdentityConfig) -> Result<Self, AppError> {
        init_metrics();

        let store = connect_store(&config).await?;
        let state = AppState::new(config.clone(), store)?;

        let addr = SocketAddr::new(config.common.host, config.common.port);
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, store = ?config.store, "Identity service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        spawn_session_sweeper(
            self.state.authenticator.sessions().clone(),
            self.state.config.session.cleanup_interval_seconds,
        );
        let router = build_router(self.state);

        tracing::info!(port = self.port, "HTTP server started");
        axum::serve(self.listener, router).await
    }
}

async fn connect_store(config: &IdentityConfig) -> Result<Arc<dyn IdentityStore>, AppError> {
    match config.store {
        StoreBackend::Postgres => {
            let store = PostgresStore::connect(&config.database).await.map_err(|e| {
                tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                AppError::DatabaseError(anyhow::anyhow!(e))
            })?;

            store.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                AppError::DatabaseError(anyhow::anyhow!(e))
            })?;

            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Periodically drop expired sessions that were never looked up again.
fn spawn_session_sweeper(sessions: SessionRegistry, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                tracing::debug!(purged_sessions = purged, "Periodic session cleanup");
            }
        }
    });
}

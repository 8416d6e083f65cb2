pub mod middleware;
pub mod openapi;
pub mod routes;

use agit_core::{Agit, AgitError, Settings};
use agit_vcs::GitBackend;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub agit: Arc<Agit<GitBackend>>,
}

impl AppState {
    pub fn new(agit: Agit<GitBackend>) -> Self {
        Self {
            agit: Arc::new(agit),
        }
    }

    pub fn open(settings: &Settings) -> Result<Self, AgitError> {
        let backend = GitBackend::open(&settings.repo_path)?;
        Ok(Self::new(Agit::new(backend, settings)))
    }

    /// Runs a core call on the blocking pool; every core call may shell out to git.
    pub async fn run<T, F>(&self, f: F) -> Result<T, AgitError>
    where
        F: FnOnce(&Agit<GitBackend>) -> Result<T, AgitError> + Send + 'static,
        T: Send + 'static,
    {
        let agit = Arc::clone(&self.agit);
        tokio::task::spawn_blocking(move || f(&agit))
            .await
            .map_err(|err| AgitError::internal(format!("worker task failed: {err}")))?
    }
}

pub fn app(state: AppState) -> Router {
    routes::router(state)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app(state)).await
}

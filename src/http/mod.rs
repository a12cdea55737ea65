//! HTTP surface: router, shared state and the server lifecycle.
//!
//! Routes:
//!
//! - `POST /documents` stores a raw text body and answers `{ "key" }`
//! - `GET|HEAD /documents/{id}` answers `{ "data", "key" }`
//! - `GET|HEAD /raw/{id}` answers the content as `text/plain`
//! - `GET /health` answers `{ "status": "ok" }`

mod error;
mod handlers;
mod rate_limit;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{Config, RateLimitConfig};
use crate::handler::DocumentHandler;

pub use rate_limit::{ClientRateLimiter, build_limiter};

/// How often idle client entries are dropped from the rate limiter.
const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// State shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<DocumentHandler>,
    pub limiter: Option<Arc<ClientRateLimiter>>,
}

impl AppState {
    pub fn new(handler: DocumentHandler) -> Self {
        Self {
            handler: Arc::new(handler),
            limiter: None,
        }
    }

    /// Enables per-client rate limiting; `None` leaves it off.
    ///
    /// # Errors
    ///
    /// Returns an error if the quota has a zero request count or window.
    pub fn with_rate_limit(mut self, config: Option<&RateLimitConfig>) -> crate::Result<Self> {
        self.limiter = config.map(build_limiter).transpose()?.map(Arc::new);
        Ok(self)
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/documents", post(handlers::documents::create))
        .route("/documents/{id}", get(handlers::documents::get))
        .route("/raw/{id}", get(handlers::documents::raw));

    // Health checks bypass the limiter
    let routes = match state.limiter.clone() {
        Some(limiter) => routes.layer(middleware::from_fn_with_state(
            limiter,
            rate_limit::enforce,
        )),
        None => routes,
    };

    routes
        .route("/health", get(handlers::health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured address and serves until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(config: &Config, handler: DocumentHandler) -> Result<()> {
    let state = AppState::new(handler)
        .with_rate_limit(config.rate_limit.as_ref())
        .context("Invalid rate limit configuration")?;

    let sweeper = state.handler.store().spawn_sweeper();
    let pruner = state.limiter.clone().map(|limiter| {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
            loop {
                ticker.tick().await;
                limiter.retain_recent();
                limiter.shrink_to_fit();
            }
        })
    });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        address = %addr,
        store = state.handler.store().backend_name(),
        rate_limited = state.limiter.is_some(),
        "Listening"
    );

    let app = router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server failed")?;

    for task in [sweeper, pruner].into_iter().flatten() {
        task.abort();
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

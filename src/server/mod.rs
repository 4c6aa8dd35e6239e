//! HTTP front end for the analyst
//!
//! `GET /` returns a usage hint. `POST /api/` takes a multipart upload with a
//! `questions.txt` file and any attachments, and answers with JSON or text.

mod error;
mod routes;
mod state;

pub use error::{ApiError, ErrorResponse};
pub use routes::USAGE_HINT;
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Upper bound on a whole multipart upload
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::usage))
        .route("/api/", post(routes::answer))
        .route("/api", post(routes::answer))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

pub struct AnalystServer {
    state: AppState,
    bind_address: SocketAddr,
}

impl AnalystServer {
    pub fn new(state: AppState, bind_address: SocketAddr) -> Self {
        Self {
            state,
            bind_address,
        }
    }

    pub async fn run(self) -> Result<(), std::io::Error> {
        self.run_until(shutdown_signal()).await
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state);
        let listener = TcpListener::bind(self.bind_address).await?;

        info!("Analyst listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Analyst shut down gracefully");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

//! HTTP surface: the single-page form plus the JSON API behind it.

mod error;
pub mod handlers;

pub use error::ErrorBody;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::draft::DraftGenerator;
use crate::llm::ChatClient;
use crate::mail::Dispatcher;

/// Application state shared across handlers. Read-only after startup.
#[derive(Clone, Debug)]
pub struct AppState {
    pub generator: Arc<DraftGenerator>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(generator: DraftGenerator, dispatcher: Dispatcher) -> Self {
        Self {
            generator: Arc::new(generator),
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Production wiring: OpenAI-compatible client and lettre SMTP.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            DraftGenerator::new(ChatClient::new(config.llm.clone())),
            Dispatcher::smtp(config.mail.clone()),
        )
    }
}

/// Build the Axum router.
pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/generate", post(handlers::generate))
        .route("/api/send", post(handlers::send))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: AppConfig) -> crate::error::Result<()> {
    let app = app_routes(AppState::from_config(&config));
    let listener = tokio::net::TcpListener::bind(config.server.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Email assistant listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

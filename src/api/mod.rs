//! HTTP API server for the journal gateway
//!
//! Function routes live under `/functions/v1`; `/health` and `/ready` sit at the root.

mod auth;
pub mod chat;
pub mod conversations;
pub mod error;
pub mod health;
pub mod rate_limit;
pub mod voice;

use std::sync::Arc;

use axum::Router;
use secrecy::SecretString;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::db::DbPool;
use crate::journal::JournalService;
use crate::voice::Transcriber;

pub use error::{ApiError, ErrorResponse};

/// Path prefix for function routes
pub const FUNCTIONS_PREFIX: &str = "/functions/v1";

/// Shared state for API handlers
pub struct ApiState {
    pub db: DbPool,
    pub journal: Arc<JournalService>,
    /// Absent when no transcription provider is configured
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub api_key: Option<SecretString>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    db: DbPool,
    journal: Arc<JournalService>,
    transcriber: Option<Arc<dyn Transcriber>>,
    api_key: Option<SecretString>,
    rate_limit_per_minute: Option<u32>,
    port: u16,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(db: DbPool, journal: Arc<JournalService>) -> Self {
        Self {
            db,
            journal,
            transcriber: None,
            api_key: None,
            rate_limit_per_minute: None,
            port: crate::config::DEFAULT_PORT,
        }
    }

    /// Set the speech-to-text provider
    #[must_use]
    pub fn transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Require a bearer key on function routes
    #[must_use]
    pub fn api_key(mut self, key: Option<SecretString>) -> Self {
        self.api_key = key;
        self
    }

    /// Limit requests per minute across all clients
    #[must_use]
    pub const fn rate_limit(mut self, per_minute: Option<u32>) -> Self {
        self.rate_limit_per_minute = per_minute;
        self
    }

    /// Set the listen port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = ApiState {
            db: self.db,
            journal: self.journal,
            transcriber: self.transcriber,
            api_key: self.api_key,
            rate_limiter: self.rate_limit_per_minute.map(rate_limit::create_limiter),
        };

        ApiServer {
            state: Arc::new(state),
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let functions = chat::router(self.state.clone())
            .merge(voice::router(self.state.clone()))
            .merge(conversations::router(self.state.clone()))
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                auth::require_api_key,
            ));

        let router = Router::new()
            .nest(FUNCTIONS_PREFIX, functions)
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()))
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                rate_limit::rate_limit_middleware,
            ));

        // Browsers call the functions cross-origin; preflights are answered here
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        if self.state.api_key.is_none() {
            tracing::warn!("JOURNAL_API_KEY not set - function routes are unauthenticated");
        }
        if self.state.transcriber.is_none() {
            tracing::info!("speech-to-text disabled");
        }

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

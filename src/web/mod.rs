use crate::db::Database;
use crate::error::{Error, Result};
use axum::{
    Router,
    routing::{get, post},
};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    /// Secret payment providers must present; `None` accepts every delivery.
    pub webhook_token: Option<Arc<str>>,
}

mod errors;
mod handlers;
pub mod payload;

pub use handlers::TOKEN_HEADER;

/// Build the axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/webhooks/prodamus", post(handlers::payment_webhook))
        .route(
            "/webhooks/prodamus/{token}",
            post(handlers::payment_webhook_with_token),
        )
        .route("/webhooks/tilda", post(handlers::payment_webhook))
        .route(
            "/webhooks/tilda/{token}",
            post(handlers::payment_webhook_with_token),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the webhook listener. Fails immediately if the address is taken.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Config(format!("failed to bind to {addr}: {e}")))?;
    info!(address = %addr, "webhook listener bound");
    Ok(listener)
}

/// Serve webhooks on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

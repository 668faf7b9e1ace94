//! HTTP server setup and routing

use crate::error::{Error, Result};
use crate::headless::HeadlessViewer;
use crate::session::ViewerSession;
use crate::state::SessionContext;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    /// Always present, even when startup failed, so errors stay visible
    pub ctx: Arc<SessionContext>,
    /// `None` when the directory could not be loaded
    pub session: Option<Arc<ViewerSession>>,
    /// Set when the session renders through the headless viewer
    pub headless: Option<Arc<HeadlessViewer>>,
}

pub fn build_router(app: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        .route("/status", get(super::handlers::status))
        .route("/models/next", post(super::handlers::next_model))
        .route("/models/previous", post(super::handlers::previous_model))
        .route("/autoplay/toggle", post(super::handlers::toggle_auto_play))
        .route("/ar/activate", post(super::handlers::activate_ar))
        .route("/lighting/exposure", post(super::handlers::set_exposure))
        .route("/lighting/shadow-intensity", post(super::handlers::set_shadow_intensity))
        .route("/camera", post(super::handlers::move_camera))
        .route("/events", get(super::sse::event_stream))
        .with_state(app)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API on `port` until `shutdown` resolves
pub async fn run(app: AppContext, port: u16, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let router = build_router(app);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("Server shutdown complete");
    Ok(())
}

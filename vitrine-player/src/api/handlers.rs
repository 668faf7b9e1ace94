//! HTTP request handlers

use crate::api::server::AppContext;
use crate::autoplay::AutoPlayState;
use crate::coordinator::SwitchTicket;
use crate::error::{Error, Result};
use crate::session::{SessionStatus, ViewerSession};
use crate::viewer::ChangeSource;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use vitrine_common::{CameraOrbit, CameraPose, CameraTarget, FieldOfView};

type ApiError = (StatusCode, Json<StatusResponse>);

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    current_index: usize,
    /// Absent when navigation is disabled
    generation: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct AutoPlayResponse {
    auto_play: AutoPlayState,
}

#[derive(Debug, Deserialize)]
pub struct AttributeRequest {
    value: String,
}

/// Camera pose in viewer attribute syntax
#[derive(Debug, Deserialize)]
pub struct CameraRequest {
    orbit: String,
    target: String,
    fov: String,
    #[serde(default = "default_change_source")]
    source: ChangeSource,
}

fn default_change_source() -> ChangeSource {
    ChangeSource::UserInteraction
}

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", message.into()),
        }),
    )
}

fn require_session(ctx: &AppContext) -> std::result::Result<&Arc<ViewerSession>, ApiError> {
    ctx.session.as_ref().ok_or_else(|| {
        let reason = ctx
            .ctx
            .last_error()
            .unwrap_or_else(|| "no models loaded".to_string());
        error_response(StatusCode::SERVICE_UNAVAILABLE, reason)
    })
}

fn navigation_result(
    session: &ViewerSession,
    result: Result<Option<SwitchTicket>>,
) -> std::result::Result<Json<NavigationResponse>, ApiError> {
    match result {
        Ok(ticket) => Ok(Json(NavigationResponse {
            current_index: session.context().current_index(),
            generation: ticket.map(|t| t.generation),
        })),
        Err(e @ Error::MissingKpi { .. }) => Err(error_response(StatusCode::CONFLICT, e.to_string())),
        Err(e) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

// ============================================================================
// Health and Status
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "vitrine-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /status
pub async fn status(State(ctx): State<AppContext>) -> std::result::Result<Json<SessionStatus>, ApiError> {
    let session = require_session(&ctx)?;
    Ok(Json(session.status()))
}

// ============================================================================
// Navigation
// ============================================================================

/// POST /models/next
pub async fn next_model(
    State(ctx): State<AppContext>,
) -> std::result::Result<Json<NavigationResponse>, ApiError> {
    let session = require_session(&ctx)?;
    navigation_result(session, session.next())
}

/// POST /models/previous
pub async fn previous_model(
    State(ctx): State<AppContext>,
) -> std::result::Result<Json<NavigationResponse>, ApiError> {
    let session = require_session(&ctx)?;
    navigation_result(session, session.previous())
}

/// POST /autoplay/toggle
pub async fn toggle_auto_play(
    State(ctx): State<AppContext>,
) -> std::result::Result<Json<AutoPlayResponse>, ApiError> {
    let session = require_session(&ctx)?;
    let auto_play = session.toggle_auto_play();
    info!(state = ?auto_play, "Auto-play toggled via API");
    Ok(Json(AutoPlayResponse { auto_play }))
}

// ============================================================================
// Viewer Controls
// ============================================================================

/// POST /ar/activate
pub async fn activate_ar(State(ctx): State<AppContext>) -> std::result::Result<StatusCode, ApiError> {
    let session = require_session(&ctx)?;
    session.activate_ar();
    Ok(StatusCode::ACCEPTED)
}

/// POST /lighting/exposure
pub async fn set_exposure(
    State(ctx): State<AppContext>,
    Json(req): Json<AttributeRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    let session = require_session(&ctx)?;
    session.set_exposure(&req.value);
    Ok(StatusCode::OK)
}

/// POST /lighting/shadow-intensity
pub async fn set_shadow_intensity(
    State(ctx): State<AppContext>,
    Json(req): Json<AttributeRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    let session = require_session(&ctx)?;
    session.set_shadow_intensity(&req.value);
    Ok(StatusCode::OK)
}

/// POST /camera - move the headless viewer's camera
pub async fn move_camera(
    State(ctx): State<AppContext>,
    Json(req): Json<CameraRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    let Some(viewer) = ctx.headless.as_ref() else {
        return Err(error_response(
            StatusCode::NOT_IMPLEMENTED,
            "camera injection requires the headless viewer",
        ));
    };

    let pose = parse_pose(&req).map_err(|e| {
        warn!("Rejected camera request: {}", e);
        error_response(StatusCode::BAD_REQUEST, e.to_string())
    })?;

    viewer.move_camera(pose, req.source);
    Ok(StatusCode::ACCEPTED)
}

fn parse_pose(req: &CameraRequest) -> Result<CameraPose> {
    Ok(CameraPose::new(
        req.orbit.parse::<CameraOrbit>()?,
        req.target.parse::<CameraTarget>()?,
        req.fov.parse::<FieldOfView>()?,
    ))
}

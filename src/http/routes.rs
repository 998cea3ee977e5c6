//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::runner::SessionCommand;
use crate::util::time::uptime_secs;
use crate::ws::protocol::HudSnapshot;
use crate::ws::ws_handler;

/// Plain HTTP requests never need longer than this
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.client_origins);

    // The WebSocket route stays outside the timeout; upgrades are long-lived
    let api_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/hud", get(hud_handler))
        .route("/session/restart", post(restart_handler))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    Router::new()
        .merge(api_routes)
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

/// CORS for the configured HUD origins; any origin when none are configured
fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(allowed)
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    session_id: Uuid,
    seed: u64,
    tick: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let info = state.session.info();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        session_id: info.session_id,
        seed: info.seed,
        tick: info.tick,
    })
}

// ============================================================================
// Session endpoints
// ============================================================================

async fn hud_handler(State(state): State<AppState>) -> Result<Json<HudSnapshot>, AppError> {
    state
        .session
        .latest_hud()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No HUD snapshot yet".to_string()))
}

#[derive(Serialize)]
struct RestartResponse {
    status: &'static str,
}

async fn restart_handler(State(state): State<AppState>) -> Result<Json<RestartResponse>, AppError> {
    if !state.session.send(SessionCommand::Restart).await {
        return Err(AppError::Unavailable);
    }

    Ok(Json(RestartResponse {
        status: "restarting",
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Session is not running")]
    Unavailable,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::game::runner::GameSession;
    use crate::game::session::GameTuning;

    fn app() -> (Router, GameSession) {
        let (session, handle) = GameSession::new(GameTuning::default(), Some(11), None).unwrap();
        let state = AppState::new(Config::default(), handle);
        (build_router(state), session)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_the_current_session() {
        let (router, _session) = app();
        let response = tokio_test::assert_ok!(
            router
                .oneshot(Request::get("/health").body(Body::empty()).unwrap())
                .await
        );

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["tick"], 0);
        assert_eq!(json["seed"], 11);
    }

    #[tokio::test]
    async fn hud_is_not_found_before_the_first_snapshot() {
        let (router, _session) = app();
        let response = router
            .oneshot(Request::get("/hud").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("No HUD snapshot"));
    }

    #[tokio::test]
    async fn restart_queues_a_command() {
        let (router, _session) = app();
        let response = router
            .oneshot(
                Request::post("/session/restart")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "restarting");
    }

    #[tokio::test]
    async fn restart_without_a_session_is_unavailable() {
        let (router, session) = app();
        drop(session);

        let response = router
            .oneshot(
                Request::post("/session/restart")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn cors_accepts_configured_origins() {
        // Building must not panic for either shape
        let _ = build_cors(&[]);
        let _ = build_cors(&["http://localhost:5173".to_string(), "not a header\n".to_string()]);
    }
}

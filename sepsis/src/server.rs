//! HTTP surface for the turn endpoint.
//!
//! `POST /api/simulate` runs one turn. `OPTIONS` is answered by the CORS
//! middleware; any other method gets 405.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use sepsis_core::{ServiceError, SimConfig, SimulationService};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid ALLOWED_ORIGIN {0:?}")]
    InvalidOrigin(String),
}

#[derive(Clone)]
struct AppState {
    service: Arc<SimulationService>,
    allowed_origin: HeaderValue,
}

pub async fn serve(addr: SocketAddr, config: &SimConfig) -> Result<(), ServerError> {
    let app = router(SimulationService::from_config(config), &config.allowed_origin)?;

    let listener = TcpListener::bind(addr).await?;
    log::info!("Serving POST /api/simulate on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(service: SimulationService, allowed_origin: &str) -> Result<Router, ServerError> {
    let allowed_origin = HeaderValue::from_str(allowed_origin)
        .map_err(|_| ServerError::InvalidOrigin(allowed_origin.to_string()))?;
    let state = AppState {
        service: Arc::new(service),
        allowed_origin,
    };

    Ok(Router::new()
        .route(
            "/api/simulate",
            post(simulate).fallback(method_not_allowed),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            cors_middleware,
        ))
        .with_state(state))
}

async fn simulate(State(state): State<AppState>, body: String) -> Result<Response, HttpApiError> {
    let turn = state.service.handle_json(&body).await?;
    Ok(Json(turn).into_response())
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
        .into_response()
}

async fn cors_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        apply_cors_headers(response.headers_mut(), &state.allowed_origin);
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut(), &state.allowed_origin);
    response
}

fn apply_cors_headers(headers: &mut HeaderMap, origin: &HeaderValue) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        origin.clone(),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("Content-Type, Authorization"),
    );
}

/// A service error rendered as `{"error": ...}` with its status.
#[derive(Debug)]
struct HttpApiError(ServiceError);

impl From<ServiceError> for HttpApiError {
    fn from(error: ServiceError) -> Self {
        Self(error)
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.0.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use sepsis_core::{Engine, TokenCodec};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let service = SimulationService::new(
            Engine::deterministic(),
            TokenCodec::new("server-test"),
            280,
        );
        router(service, "https://ward.example").unwrap()
    }

    fn request(method: Method, body: &str) -> Request {
        Request::builder()
            .method(method)
            .uri("/api/simulate")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_post_runs_turns() {
        let response = app().oneshot(request(Method::POST, "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://ward.example"
        );
        let first = json_body(response).await;
        assert_eq!(first["logEntry"]["action"], "Handoff");

        let body = json!({ "action": "hang zosyn", "token": first["token"] }).to_string();
        let response = app().oneshot(request(Method::POST, &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let second = json_body(response).await;
        assert_eq!(second["state"]["elapsedMinutes"], 6);
        assert_eq!(second["state"]["infusions"]["antibiotic"]["active"], true);
    }

    #[tokio::test]
    async fn test_options_preflight() {
        let response = app().oneshot(request(Method::OPTIONS, "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-methods"],
            "POST, OPTIONS"
        );
        assert_eq!(
            response.headers()["access-control-allow-headers"],
            "Content-Type, Authorization"
        );
    }

    #[tokio::test]
    async fn test_other_methods_are_rejected() {
        let response = app().oneshot(request(Method::GET, "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response
            .headers()
            .contains_key("access-control-allow-origin"));
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Method not allowed" })
        );
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let response = app()
            .oneshot(request(Method::POST, "{broken"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({ "error": "Invalid request" }));

        let body = json!({ "action": "wait", "token": "a.b.c" }).to_string();
        let response = app().oneshot(request(Method::POST, &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await.get("state").is_none());
    }

    #[test]
    fn test_invalid_origin_is_rejected() {
        let service = SimulationService::new(Engine::deterministic(), TokenCodec::new("x"), 280);
        assert!(matches!(
            router(service, "bad\norigin"),
            Err(ServerError::InvalidOrigin(_))
        ));
    }
}

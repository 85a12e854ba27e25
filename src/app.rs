use std::net::SocketAddr;

use axum::{
    handler::HandlerWithoutStateExt,
    http::{HeaderValue, Method, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{
    auth, categories,
    envelope::{ApiResponse, Envelope},
    products,
    state::AppState,
};

pub fn build_app(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.upload_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(not_found.into_service());
    let cors = cors_layer(&state.config.frontend_origin);

    Router::new()
        .nest("/api/auth", auth::router())
        .nest("/api/categories", categories::router())
        .nest("/api/products", products::router())
        .route("/api/health", get(health))
        .method_not_allowed_fallback(method_not_allowed)
        .nest_service("/uploads", uploads)
        .fallback(not_found)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

fn cors_layer(origin: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    match origin.parse::<HeaderValue>() {
        Ok(value) if origin != "*" => base.allow_origin(value),
        Ok(_) => base.allow_origin(Any),
        Err(e) => {
            tracing::warn!(%origin, error = %e, "unusable FRONTEND_ORIGIN; allowing any origin");
            base.allow_origin(Any)
        }
    }
}

async fn health() -> ApiResponse {
    ApiResponse::ok("ok", json!({}))
}

async fn not_found() -> (StatusCode, Json<Envelope>) {
    (
        StatusCode::NOT_FOUND,
        Json(Envelope::failure("Route not found", json!({}))),
    )
}

async fn method_not_allowed() -> (StatusCode, Json<Envelope>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(Envelope::failure("Method not allowed", json!({}))),
    )
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

//! HTTP 状态接口
//!
//! - /health - 基本健康状态与当前连接数
//! - /status - 连接数与各 provider 的可用状态

use axum::{
    extract::State,
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use senti_config::ServerConfig;
use senti_gateway::GatewayContext;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connections: usize,
}

/// 构建路由
pub fn router(context: GatewayContext, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(server))
        .with_state(context)
}

/// 根据 allowed_origins 构建 CORS 层
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET]);
    if server.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

async fn health_handler(State(context): State<GatewayContext>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        connections: context.sessions.count(),
    })
}

async fn status_handler(State(context): State<GatewayContext>) -> impl IntoResponse {
    Json(context.status())
}

//! WebSocket 网关层
//!
//! 传输接线：连接升级与准入、逐连接编排、诊断计量，以及绑定到
//! 认证身份上的消息 / 通知 / 在线状态处理器组。

mod auth;
mod connection;
mod handlers;
mod metrics;
mod protocol;
mod state;

use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub use auth::AuthGate;
pub use handlers::notifications::send_real_time;
pub use metrics::SystemMonitor;
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    Router::new()
        .route("/ws", get(connection::ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::new().allow_origin(AllowOrigin::list(origins)))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.registry.stats().await;
    Json(json!({
        "status": "ok",
        "connections": stats.connections,
        "online_users": stats.online_users,
        "rooms": stats.rooms,
    }))
}

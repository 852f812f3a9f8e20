//! 主程序入口
//!
//! 组装实时网关：配置、连接注册表、在线状态跟踪、准入验证和
//! WebSocket 路由，并负责优雅停机序列。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use application::{PresenceTracker, TaskQueue};
use domain::{events, Frame};
use infrastructure::{
    ConnectionRegistry, GatewayConfig, InMemoryMessageStore, InMemoryNotificationStore,
    InMemoryPresenceStore, InMemorySocialGraph, JwtTokenVerifier,
};
use ws_gateway::{router, AppState, AuthGate, SystemMonitor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Arc::new(GatewayConfig::from_env_with_defaults());

    let registry = Arc::new(ConnectionRegistry::new());
    let tasks = Arc::new(TaskQueue::new(config.limits.task_queue_capacity));

    // 协作方接口的内存实现 —— 生产部署替换为真实的持久化服务
    let messages = Arc::new(InMemoryMessageStore::new());
    let notifications = Arc::new(InMemoryNotificationStore::new());
    let social_graph = Arc::new(InMemorySocialGraph::new());
    let presence_store = Arc::new(InMemoryPresenceStore::new());

    let presence = Arc::new(PresenceTracker::new(
        registry.clone(),
        social_graph,
        presence_store,
        tasks.clone(),
    ));
    let auth_gate = Arc::new(AuthGate::new(
        Arc::new(JwtTokenVerifier::new(&config.auth.jwt_secret)),
        config.auth.cookie_name.clone(),
    ));

    let state = AppState::new(
        registry.clone(),
        presence,
        messages,
        notifications,
        auth_gate,
        tasks.clone(),
        config.clone(),
    );

    // 周期性系统指标快照
    let monitor = SystemMonitor::spawn(
        registry.clone(),
        Duration::from_secs(config.monitor.snapshot_interval_seconds),
    );

    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("实时网关启动在 ws://{}/ws", addr);

    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "server terminated with error");
        }
    });

    wait_for_signal().await;
    tracing::info!("收到终止信号，开始优雅停机");

    // 停机序列：停指标循环 → 广播维护通知 → 宽限期 → 关闭传输 →
    // 排空后台队列 → 清空注册表
    monitor.stop();
    registry
        .broadcast_all(Frame::new(
            events::system::MAINTENANCE,
            json!({
                "message": "server is going down for maintenance",
                "timestamp": Utc::now(),
            }),
        ))
        .await;
    tokio::time::sleep(Duration::from_millis(config.shutdown.grace_millis)).await;

    server.abort();
    tasks
        .drain(Duration::from_millis(config.shutdown.drain_timeout_millis))
        .await;
    registry.shutdown().await;
    tracing::info!("网关已停机");

    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

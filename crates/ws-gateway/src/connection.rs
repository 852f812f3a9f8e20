//! 连接编排
//!
//! 每条被接受的连接：诊断计量 → 准入验证 → 注册 → 绑定处理器组 →
//! 心跳探测 → 断连级联（停心跳、移出注册表、在线状态迁移）。
//! 准入失败先尽力把 `authentication_error` 发给对端，短暂宽限后
//! 强制关闭，绝不让未认证连接走到处理器注册。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use domain::events;
use domain::{
    AuthError, AuthenticatedUser, ConnectionInfo, ConnectionMetrics, DeviceInfo, Frame, UserId,
};

use crate::handlers::{self, ConnectionContext};
use crate::metrics::MeteredSink;
use crate::protocol::PongPayload;
use crate::state::AppState;

/// 认证错误帧的刷出宽限
const AUTH_REJECT_GRACE: Duration = Duration::from_millis(250);

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    // 准入在升级前完成，结果带进升级后的任务
    let admission = state.auth_gate.admit(&headers, &params).await;
    let max_payload = state.config.limits.max_payload_bytes;

    ws.max_message_size(max_payload)
        .on_upgrade(move |socket| async move {
            match admission {
                Ok((user, device)) => run_connection(socket, state, user, device).await,
                Err(err) => reject_connection(socket, err).await,
            }
        })
}

/// 准入失败路径：尽力通知后强制断开
async fn reject_connection(socket: WebSocket, err: AuthError) {
    tracing::warn!(error = %err, "connection rejected");

    let (mut sink, _stream) = socket.split();
    let frame = Frame::new(
        events::system::AUTHENTICATION_ERROR,
        json!({"error": err.to_string(), "timestamp": Utc::now()}),
    );
    if let Ok(text) = frame.to_json() {
        // 对端可能立即断开，发送失败可以接受
        let _ = sink.send(Message::Text(text.into())).await;
    }

    tokio::time::sleep(AUTH_REJECT_GRACE).await;
    let _ = sink.close().await;
}

async fn run_connection(
    socket: WebSocket,
    state: AppState,
    user: AuthenticatedUser,
    device: DeviceInfo,
) {
    let info = ConnectionInfo::new(&user, device.clone());
    let connection_id = info.connection_id;
    let user_id = info.user_id.clone();
    let metrics = info.metrics.clone();

    let (sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    state.registry.register(info, tx.clone()).await;
    state.presence.handle_connect(&user_id, &device).await;

    tracing::info!(
        connection_id = %connection_id,
        user_id = %user_id,
        device = device.device_type.as_str(),
        "WebSocket连接已建立"
    );

    // 发送任务：出站帧统一经过计量装饰器
    let mut metered = MeteredSink::new(sink, metrics.clone());
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame.to_json() {
                Ok(text) => {
                    if metered.send_text(text).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to serialize outbound frame");
                }
            }
        }
    });

    // 心跳任务：随连接生、随连接灭
    let heartbeat = tokio::spawn(heartbeat_loop(
        state.clone(),
        user_id.clone(),
        tx.clone(),
    ));

    let ctx = ConnectionContext {
        connection_id,
        user_id: user_id.clone(),
    };

    // 接收循环：单连接事件保持到达顺序
    while let Some(incoming) = stream.next().await {
        match incoming {
            Ok(Message::Text(text)) => {
                let text = text.to_string();
                metrics.record_inbound(text.len());
                dispatch(&state, &ctx, &metrics, &text).await;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                metrics.touch();
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!(connection_id = %connection_id, "binary frames not supported");
            }
            Ok(Message::Close(_)) => break,
            Err(err) => {
                tracing::debug!(connection_id = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    // 断连级联
    heartbeat.abort();
    if let Some(outcome) = state.registry.remove(connection_id).await {
        if outcome.went_offline {
            state.presence.handle_disconnect(&outcome.user_id).await;
        }
    }
    drop(tx);
    let _ = send_task.await;

    tracing::info!(connection_id = %connection_id, user_id = %user_id, "WebSocket连接已清理");
}

/// 入站事件分发
async fn dispatch(
    state: &AppState,
    ctx: &ConnectionContext,
    metrics: &Arc<ConnectionMetrics>,
    text: &str,
) {
    let frame = match Frame::from_json(text) {
        Ok(frame) => frame,
        Err(err) => {
            handlers::reply(
                state,
                ctx,
                handlers::validation_error(&format!("invalid frame: {err}")),
            )
            .await;
            return;
        }
    };

    match frame.event.as_str() {
        events::room::JOIN_CHAT => handlers::chat::handle_join(state, ctx, frame.data).await,
        events::room::LEAVE_CHAT => handlers::chat::handle_leave(state, ctx, frame.data).await,
        events::message::SEND_MESSAGE => handlers::chat::handle_send(state, ctx, frame.data).await,
        events::message::MESSAGE_STATUS_UPDATE => {
            handlers::chat::handle_status_update(state, ctx, frame.data).await
        }
        events::message::DELETE_MESSAGE => {
            handlers::chat::handle_delete(state, ctx, frame.data).await
        }
        events::typing::TYPING_STATUS => handlers::chat::handle_typing(state, ctx, frame.data).await,
        events::notification::NOTIFICATION_READ => {
            handlers::notifications::handle_mark_read(state, ctx, frame.data).await
        }
        events::notification::CLEAR_NOTIFICATIONS => {
            handlers::notifications::handle_clear_all(state, ctx).await
        }
        events::presence::USER_STATUS_CHANGE => {
            handlers::presence::handle_status_change(state, ctx, frame.data).await
        }
        events::presence::GET_ONLINE_USERS => {
            handlers::presence::handle_get_online_users(state, ctx, frame.data).await
        }
        events::system::PONG => handle_pong(state, ctx, metrics, frame.data).await,
        other => {
            tracing::debug!(event = other, user_id = %ctx.user_id, "unhandled event");
        }
    }
}

/// 心跳应答：测量往返延迟，只在超过阈值时记日志
async fn handle_pong(
    state: &AppState,
    ctx: &ConnectionContext,
    metrics: &Arc<ConnectionMetrics>,
    data: serde_json::Value,
) {
    let payload = serde_json::from_value::<PongPayload>(data).unwrap_or_default();
    if let Some(sent_at) = payload.sent_at {
        let latency = (Utc::now().timestamp_millis() - sent_at).max(0) as u64;
        metrics.record_latency(latency);
        if latency > state.config.heartbeat.latency_warn_ms {
            tracing::warn!(
                connection_id = %ctx.connection_id,
                user_id = %ctx.user_id,
                latency_ms = latency,
                "heartbeat latency above threshold"
            );
        }
    }
    state.presence.touch(&ctx.user_id).await;
}

/// 固定周期的心跳探测
///
/// 每跳同时刷新在线状态的 last_activity，纯本地记账，不触发广播。
async fn heartbeat_loop(state: AppState, user_id: UserId, tx: mpsc::UnboundedSender<Frame>) {
    let period = Duration::from_secs(state.config.heartbeat.interval_seconds.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let frame = Frame::new(
            events::system::PING,
            json!({"sent_at": Utc::now().timestamp_millis()}),
        );
        if tx.send(frame).is_err() {
            break;
        }
        state.presence.touch(&user_id).await;
    }
}

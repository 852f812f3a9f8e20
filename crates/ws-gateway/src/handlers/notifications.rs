//! 通知处理器
//!
//! 已读 / 清空走两段式：成功时回应请求方并同步到该用户其他设备，
//! 失败时只回应请求方。`send_real_time` 是给外部协作方用的即时
//! 推送原语，没有落盘兜底。

use chrono::Utc;
use serde_json::{json, Value};

use domain::events;
use domain::{Frame, Notification, UserId};

use super::{reply, ConnectionContext};
use crate::protocol::NotificationReadPayload;
use crate::state::AppState;

/// 标记单条通知已读
pub async fn handle_mark_read(state: &AppState, ctx: &ConnectionContext, data: Value) {
    let notification_id = serde_json::from_value::<NotificationReadPayload>(data)
        .ok()
        .and_then(|payload| payload.notification_id)
        .filter(|id| !id.is_empty());

    let Some(notification_id) = notification_id else {
        reply(
            state,
            ctx,
            Frame::new(
                events::notification::NOTIFICATION_READ,
                json!({"success": false, "error": "notification id required", "timestamp": Utc::now()}),
            ),
        )
        .await;
        return;
    };

    match state
        .notifications
        .mark_as_read(&ctx.user_id, &notification_id)
        .await
    {
        Ok(()) => {
            let frame = Frame::new(
                events::notification::NOTIFICATION_READ,
                json!({"success": true, "notification_id": notification_id, "timestamp": Utc::now()}),
            );
            reply(state, ctx, frame.clone()).await;
            // 多设备状态同步
            state
                .registry
                .emit_to_user_except(&ctx.user_id, ctx.connection_id, frame)
                .await;
        }
        Err(err) => {
            tracing::warn!(
                user_id = %ctx.user_id,
                notification_id = %notification_id,
                error = %err,
                "failed to mark notification read"
            );
            reply(
                state,
                ctx,
                Frame::new(
                    events::notification::NOTIFICATION_READ,
                    json!({
                        "success": false,
                        "notification_id": notification_id,
                        "error": "failed to mark notification read",
                        "timestamp": Utc::now(),
                    }),
                ),
            )
            .await;
        }
    }
}

/// 清空全部通知
pub async fn handle_clear_all(state: &AppState, ctx: &ConnectionContext) {
    match state.notifications.clear_all(&ctx.user_id).await {
        Ok(()) => {
            let frame = Frame::new(
                events::notification::CLEAR_NOTIFICATIONS,
                json!({"success": true, "timestamp": Utc::now()}),
            );
            reply(state, ctx, frame.clone()).await;
            state
                .registry
                .emit_to_user_except(&ctx.user_id, ctx.connection_id, frame)
                .await;
        }
        Err(err) => {
            tracing::warn!(user_id = %ctx.user_id, error = %err, "failed to clear notifications");
            // 失败不同步其他设备
            reply(
                state,
                ctx,
                Frame::new(
                    events::notification::CLEAR_NOTIFICATIONS,
                    json!({
                        "success": false,
                        "error": "failed to clear notifications",
                        "timestamp": Utc::now(),
                    }),
                ),
            )
            .await;
        }
    }
}

/// 即时推送原语
///
/// 返回是否至少有一条活跃连接收到了通知；为 false 时把通知落成
/// 未读完全是外部协作方的责任。
pub async fn send_real_time(state: &AppState, user: &UserId, notification: Notification) -> bool {
    state
        .registry
        .emit_to_user(
            user,
            Frame::new(
                events::notification::NEW_NOTIFICATION,
                json!({"notification": notification, "timestamp": Utc::now()}),
            ),
        )
        .await
}

//! 事件处理器组
//!
//! 每组处理器绑定一条已认证连接。错误上报策略全局一致：校验失败
//! 和协作方失败都只回给请求方，成功事件名从不携带错误形态。

pub mod chat;
pub mod notifications;
pub mod presence;

use chrono::Utc;
use serde_json::json;

use domain::events;
use domain::{ConnectionId, Frame, UserId};

use crate::state::AppState;

/// 绑定到单条连接的处理上下文
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
}

/// 只回给请求方
pub(crate) async fn reply(state: &AppState, ctx: &ConnectionContext, frame: Frame) {
    state
        .registry
        .emit_to_connection(ctx.connection_id, frame)
        .await;
}

pub(crate) fn validation_error(detail: &str) -> Frame {
    Frame::new(
        events::system::VALIDATION_ERROR,
        json!({"error": detail, "timestamp": Utc::now()}),
    )
}

pub(crate) fn server_error(detail: &str) -> Frame {
    Frame::new(
        events::system::SERVER_ERROR,
        json!({"error": detail, "timestamp": Utc::now()}),
    )
}

#[cfg(test)]
pub(crate) mod support {
    use std::sync::Arc;

    use application::{PresenceTracker, TaskQueue};
    use domain::{
        AuthenticatedUser, ConnectionInfo, DeviceInfo, Frame, MessageRepository,
        NotificationRepository, UserId,
    };
    use infrastructure::{
        ConnectionRegistry, GatewayConfig, InMemoryMessageStore, InMemoryNotificationStore,
        InMemoryPresenceStore, InMemorySocialGraph, JwtTokenVerifier,
    };
    use tokio::sync::mpsc;

    use crate::auth::AuthGate;
    use crate::state::AppState;

    use super::ConnectionContext;

    pub fn test_state() -> AppState {
        test_state_with(
            Arc::new(InMemoryMessageStore::new()),
            Arc::new(InMemoryNotificationStore::new()),
        )
    }

    pub fn test_state_with(
        messages: Arc<dyn MessageRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> AppState {
        let config = Arc::new(GatewayConfig::from_env_with_defaults());
        let registry = Arc::new(ConnectionRegistry::new());
        let tasks = Arc::new(TaskQueue::new(config.limits.task_queue_capacity));
        let presence = Arc::new(PresenceTracker::new(
            registry.clone(),
            Arc::new(InMemorySocialGraph::new()),
            Arc::new(InMemoryPresenceStore::new()),
            tasks.clone(),
        ));
        let auth_gate = Arc::new(AuthGate::new(
            Arc::new(JwtTokenVerifier::new(&config.auth.jwt_secret)),
            config.auth.cookie_name.clone(),
        ));

        AppState::new(
            registry,
            presence,
            messages,
            notifications,
            auth_gate,
            tasks,
            config,
        )
    }

    /// 注册一条假连接，返回其上下文和出站帧接收端
    pub async fn attach_connection(
        state: &AppState,
        user: &str,
    ) -> (ConnectionContext, mpsc::UnboundedReceiver<Frame>) {
        let auth = AuthenticatedUser {
            user_id: UserId::from(user),
            roles: Vec::new(),
            authenticated_at: chrono::Utc::now(),
        };
        let info = ConnectionInfo::new(&auth, DeviceInfo::from_request(None, None));
        let ctx = ConnectionContext {
            connection_id: info.connection_id,
            user_id: info.user_id.clone(),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        state.registry.register(info, tx).await;
        (ctx, rx)
    }

    /// 把接收端里积压的帧全部取出
    pub fn drain_frames(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

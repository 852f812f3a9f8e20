//! 外部持久化协作方接口
//!
//! 实时核心不拥有任何持久化，只通过这些窄接口消费外部服务。
//! 每个方法失败时返回错误，由调用方决定上报策略。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entities::message::{MessageDraft, MessageStatus};
use crate::ids::{RoomId, UserId};

/// 协作方调用失败
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

/// 消息持久化
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 创建消息，返回永久ID
    async fn create(&self, draft: MessageDraft) -> Result<String, RepositoryError>;

    /// 将会话中发给读者的消息全部标记已读
    async fn mark_conversation_read(
        &self,
        conversation: &RoomId,
        reader: &UserId,
    ) -> Result<(), RepositoryError>;

    async fn update_status(
        &self,
        conversation: &RoomId,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), RepositoryError>;

    async fn delete(&self, conversation: &RoomId, message_id: &str)
        -> Result<(), RepositoryError>;
}

/// 通知持久化
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn mark_as_read(
        &self,
        user: &UserId,
        notification_id: &str,
    ) -> Result<(), RepositoryError>;

    async fn clear_all(&self, user: &UserId) -> Result<(), RepositoryError>;
}

/// 在线状态持久化（尽力而为的 last-seen 落盘）
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait PresenceRepository: Send + Sync {
    async fn save_last_seen(
        &self,
        user: &UserId,
        last_seen: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

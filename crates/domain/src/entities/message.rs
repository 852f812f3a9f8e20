//! 聊天消息实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RoomId, UserId};

/// 投递状态对
///
/// 消息创建时即视为已投递、未读。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryState {
    pub delivered: bool,
    pub read: bool,
}

impl DeliveryState {
    pub fn created() -> Self {
        Self {
            delivered: true,
            read: false,
        }
    }
}

/// 消息状态更新取值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }
}

/// 交给消息持久化协作方的新消息
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub sender: UserId,
    pub recipient: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// 面向客户端的消息形态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: RoomId,
    pub sender: UserId,
    pub recipient: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryState,
}

impl ChatMessage {
    /// 根据持久化返回的永久ID构建客户端形态
    pub fn from_draft(id: String, draft: MessageDraft) -> Self {
        let conversation_id = RoomId::direct(&draft.sender, &draft.recipient);
        Self {
            id,
            conversation_id,
            sender: draft.sender,
            recipient: draft.recipient,
            content: draft.content,
            timestamp: draft.timestamp,
            status: DeliveryState::created(),
        }
    }
}

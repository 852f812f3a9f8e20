//! 入站负载形态
//!
//! 客户端帧的 `data` 部分反序列化目标。校验策略：字段缺失在各
//! 处理器里按其错误上报约定处理，这里只负责形态解析。

use domain::MessageStatus;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ConversationPayload {
    #[serde(default)]
    pub conversation_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessagePayload {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    /// 客户端本地生成的临时ID，用于发送确认的对账
    #[serde(default)]
    pub temporary_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdatePayload {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub status: Option<MessageStatus>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessagePayload {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TypingPayload {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub is_typing: bool,
}

#[derive(Debug, Deserialize)]
pub struct NotificationReadPayload {
    #[serde(default)]
    pub notification_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusChangePayload {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OnlineUsersPayload {
    #[serde(default)]
    pub user_ids: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PongPayload {
    #[serde(default)]
    pub sent_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_payload_tolerates_missing_fields() {
        let payload: SendMessagePayload = serde_json::from_value(json!({})).unwrap();
        assert!(payload.content.is_none());
        assert!(payload.recipient.is_none());
        assert!(payload.temporary_id.is_none());
    }

    #[test]
    fn unknown_status_value_fails_parsing() {
        let result: Result<StatusUpdatePayload, _> = serde_json::from_value(json!({
            "conversation_id": "c1",
            "message_id": "m1",
            "status": "teleported",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn typing_flag_defaults_to_false() {
        let payload: TypingPayload =
            serde_json::from_value(json!({"conversation_id": "c1"})).unwrap();
        assert!(!payload.is_typing);
    }
}

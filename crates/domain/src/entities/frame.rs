//! 线级消息帧
//!
//! 客户端和服务端交换的统一信封：`event` 携带事件目录中的事件名，
//! `data` 是任意JSON负载。

use serde::{Deserialize, Serialize};

use crate::errors::SocketError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn to_json(&self) -> Result<String, SocketError> {
        serde_json::to_string(self).map_err(|e| SocketError::InvalidFrame(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SocketError> {
        serde_json::from_str(json).map_err(|e| SocketError::InvalidFrame(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frame_roundtrip() {
        let frame = Frame::new("new_message", json!({"content": "hi"}));
        let parsed = Frame::from_json(&frame.to_json().unwrap()).unwrap();

        assert_eq!(parsed.event, "new_message");
        assert_eq!(parsed.data["content"], "hi");
    }

    #[test]
    fn frame_data_defaults_to_null() {
        let parsed = Frame::from_json(r#"{"event":"clear_notifications"}"#).unwrap();
        assert!(parsed.data.is_null());
    }
}

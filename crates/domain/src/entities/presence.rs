//! 在线状态实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::connection::DeviceInfo;

/// 用户状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    Busy,
    /// 隐身：内部仍视为在线，但对社交圈不可见，状态变更不广播
    Invisible,
    Offline,
}

impl PresenceStatus {
    /// 解析客户端提交的状态值
    ///
    /// 未知值静默映射为 `online`，不作为错误处理。
    pub fn from_client(raw: &str) -> Self {
        match raw {
            "online" => PresenceStatus::Online,
            "away" => PresenceStatus::Away,
            "busy" => PresenceStatus::Busy,
            "invisible" => PresenceStatus::Invisible,
            "offline" => PresenceStatus::Offline,
            _ => PresenceStatus::Online,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Away => "away",
            PresenceStatus::Busy => "busy",
            PresenceStatus::Invisible => "invisible",
            PresenceStatus::Offline => "offline",
        }
    }
}

/// 每用户一条的在线状态记录
///
/// 首次连接时创建，之后只更新从不删除；条目数以进程生命周期内
/// 出现过的用户数为上界。
#[derive(Debug, Clone, Serialize)]
pub struct PresenceRecord {
    pub online: bool,
    pub status: PresenceStatus,
    pub last_activity: DateTime<Utc>,
    /// 仅在完全离线时打点
    pub last_seen: Option<DateTime<Utc>>,
    pub device: Option<DeviceInfo>,
    pub last_updated: DateTime<Utc>,
}

impl PresenceRecord {
    pub fn connected(device: Option<DeviceInfo>) -> Self {
        let now = Utc::now();
        Self {
            online: true,
            status: PresenceStatus::Online,
            last_activity: now,
            last_seen: None,
            device,
            last_updated: now,
        }
    }
}

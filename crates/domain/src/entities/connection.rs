//! 连接实体
//!
//! 一条活跃传输连接的元数据：认证身份、设备信息和逐连接指标。
//! 指标使用原子计数器，在收发热路径上更新时不需要任何锁。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use crate::ids::{ConnectionId, UserId};

/// 设备类型
///
/// 仅作展示用途的推测值，来源是客户端自报的UA字符串，不可作为
/// 安全或计费依据。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

const TABLET_PATTERNS: &[&str] = &["ipad", "tablet", "kindle", "silk", "playbook"];
const MOBILE_PATTERNS: &[&str] = &["mobile", "iphone", "android", "blackberry", "windows phone"];

impl DeviceType {
    /// 根据UA子串推断设备类型
    ///
    /// 平板先于手机匹配：平板UA往往也命中手机关键字。
    pub fn classify(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();

        if TABLET_PATTERNS.iter().any(|p| ua.contains(p)) {
            DeviceType::Tablet
        } else if MOBILE_PATTERNS.iter().any(|p| ua.contains(p)) {
            DeviceType::Mobile
        } else {
            DeviceType::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
        }
    }
}

/// 客户端设备信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_type: DeviceType,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl DeviceInfo {
    pub fn from_request(user_agent: Option<String>, ip_address: Option<String>) -> Self {
        let device_type = user_agent
            .as_deref()
            .map(DeviceType::classify)
            .unwrap_or(DeviceType::Desktop);

        Self {
            device_type,
            user_agent,
            ip_address,
        }
    }
}

/// 通过准入验证的身份
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub roles: Vec<String>,
    pub authenticated_at: DateTime<Utc>,
}

/// 逐连接运行指标
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    events_in: AtomicU64,
    events_out: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    last_activity_ms: AtomicI64,
    latency_ms: AtomicU64,
}

impl ConnectionMetrics {
    pub fn record_inbound(&self, bytes: usize) {
        self.events_in.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(bytes as u64, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_outbound(&self, bytes: usize) {
        self.events_out.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_latency(&self, millis: u64) {
        self.latency_ms.store(millis, Ordering::Relaxed);
    }

    pub fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_in: self.events_in.load(Ordering::Relaxed),
            events_out: self.events_out.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            last_activity_ms: self.last_activity_ms.load(Ordering::Relaxed),
            latency_ms: self.latency_ms.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub events_in: u64,
    pub events_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub last_activity_ms: i64,
    pub latency_ms: u64,
}

/// 一条已注册连接的元数据
///
/// 传输任务是连接的唯一所有者，注册表只保存这里的元数据和发送端句柄。
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub roles: Vec<String>,
    pub device: DeviceInfo,
    pub connected_at: DateTime<Utc>,
    pub metrics: Arc<ConnectionMetrics>,
}

impl ConnectionInfo {
    pub fn new(user: &AuthenticatedUser, device: DeviceInfo) -> Self {
        Self {
            connection_id: ConnectionId::generate(),
            user_id: user.user_id.clone(),
            roles: user.roles.clone(),
            device,
            connected_at: Utc::now(),
            metrics: Arc::new(ConnectionMetrics::default()),
        }
    }
}

//! 领域层
//!
//! 定义实时网关的核心类型：标识符、事件目录、连接/在线状态/消息实体、
//! 外部协作方接口和错误类型。本层不依赖任何传输或存储实现。

pub mod entities;
pub mod errors;
pub mod events;
pub mod ids;
pub mod repositories;
pub mod services;

pub use entities::connection::{
    AuthenticatedUser, ConnectionInfo, ConnectionMetrics, DeviceInfo, DeviceType, MetricsSnapshot,
};
pub use entities::frame::Frame;
pub use entities::message::{ChatMessage, DeliveryState, MessageDraft, MessageStatus};
pub use entities::notification::Notification;
pub use entities::presence::{PresenceRecord, PresenceStatus};
pub use errors::{AuthError, SocketError};
pub use ids::{ConnectionId, RoomId, UserId};
pub use repositories::{
    MessageRepository, NotificationRepository, PresenceRepository, RepositoryError,
};
pub use services::{SocialGraph, TokenVerifier, VerifiedIdentity};

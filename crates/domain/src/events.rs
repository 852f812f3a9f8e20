//! 事件目录
//!
//! 套接字层全部线级事件标识，按关注点分组。入站分发按这些常量匹配，
//! 出站帧也从这里取事件名，所有组件都依赖本目录。

/// 连接生命周期事件
pub mod connection {
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const ERROR: &str = "error";
    pub const RECONNECT: &str = "reconnect";
    pub const RECONNECT_ATTEMPT: &str = "reconnect_attempt";
}

/// 聊天房间事件
pub mod room {
    pub const JOIN_CHAT: &str = "join_chat";
    pub const LEAVE_CHAT: &str = "leave_chat";
    pub const JOIN_SUCCESS: &str = "join_success";
    pub const JOIN_ERROR: &str = "join_error";
    pub const USER_JOINED: &str = "user_joined";
    pub const USER_LEFT: &str = "user_left";
}

/// 消息事件
pub mod message {
    pub const SEND_MESSAGE: &str = "send_message";
    pub const DELETE_MESSAGE: &str = "delete_message";
    pub const NEW_MESSAGE: &str = "new_message";
    pub const MESSAGE_DELETED: &str = "message_deleted";
    pub const MESSAGE_STATUS_UPDATE: &str = "message_status_update";
    pub const MESSAGE_DELIVERED: &str = "message_delivered";
    pub const MESSAGE_READ: &str = "message_read";
    pub const RECONCILE_MESSAGE: &str = "reconcile_message";
    pub const MESSAGE_SEND_FAILED: &str = "message_send_failed";
}

/// 输入状态事件
pub mod typing {
    pub const TYPING_STATUS: &str = "typing_status";
    pub const USER_TYPING: &str = "user_typing";
    pub const USER_STOPPED_TYPING: &str = "user_stopped_typing";
}

/// 通知事件
pub mod notification {
    pub const NEW_NOTIFICATION: &str = "new_notification";
    pub const NOTIFICATION_READ: &str = "notification_read";
    pub const CLEAR_NOTIFICATIONS: &str = "clear_notifications";
}

/// 在线状态事件
pub mod presence {
    pub const USER_STATUS_CHANGE: &str = "user_status_change";
    pub const USER_ONLINE: &str = "user_online";
    pub const USER_OFFLINE: &str = "user_offline";
    pub const USER_INACTIVE: &str = "user_inactive";
    pub const GET_ONLINE_USERS: &str = "get_online_users";
    pub const ONLINE_USERS_LIST: &str = "online_users_list";
}

/// 系统事件
pub mod system {
    pub const AUTHENTICATION_ERROR: &str = "authentication_error";
    pub const PERMISSION_ERROR: &str = "permission_error";
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const SERVER_ERROR: &str = "server_error";
    pub const MAINTENANCE: &str = "maintenance";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
}

//! 领域错误类型

use thiserror::Error;

/// 连接准入失败
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// 四个候选位置都没有携带令牌
    #[error("authentication token required")]
    MissingToken,
    /// 令牌验证失败
    #[error("invalid authentication token: {0}")]
    InvalidToken(String),
    /// 验证通过但负载缺少稳定的主体标识
    #[error("invalid token payload: {0}")]
    InvalidPayload(String),
}

/// 套接字层错误
#[derive(Debug, Clone, Error)]
pub enum SocketError {
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
    #[error("failed to send frame: {0}")]
    SendFailed(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

use domain::{RepositoryError, SocketError};
use thiserror::Error;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("{0}")]
    Internal(String),
}

//! 外部服务协作方接口

use async_trait::async_trait;

use crate::errors::AuthError;
use crate::ids::UserId;
use crate::repositories::RepositoryError;

/// 令牌验证结果
///
/// `subject` 是身份提供方给出的稳定主体标识；缺失时等同验证失败。
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub roles: Vec<String>,
}

/// 身份提供方的令牌验证
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}

/// 社交关系查询（好友列表）
///
/// 在线状态广播的作用域由这里给出。
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait SocialGraph: Send + Sync {
    async fn connections_of(&self, user: &UserId) -> Result<Vec<UserId>, RepositoryError>;
}

use async_trait::async_trait;
use domain::{Frame, UserId};

/// 在线状态广播所需的注册表能力
///
/// 由基础设施层的连接注册表实现；应用层只看到这两个操作。
#[async_trait]
pub trait PresenceFanout: Send + Sync {
    /// 把帧发给该用户的所有活跃连接；没有活跃连接时返回 false
    async fn emit_to_user(&self, user: &UserId, frame: Frame) -> bool;

    /// 注册表视角的在线判断
    async fn is_online(&self, user: &UserId) -> bool;
}

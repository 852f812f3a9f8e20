//! 基础设施层
//!
//! 进程内连接注册表、JWT令牌验证、环境配置，以及协作方接口的
//! 内存实现（用于开发接线和测试）。

pub mod config;
pub mod jwt;
pub mod registry;
pub mod stores;

pub use config::GatewayConfig;
pub use jwt::JwtTokenVerifier;
pub use registry::{ConnectionRegistry, RegistrySnapshot, RemovalOutcome};
pub use stores::{
    InMemoryMessageStore, InMemoryNotificationStore, InMemoryPresenceStore, InMemorySocialGraph,
};

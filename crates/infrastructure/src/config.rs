//! 网关配置
//!
//! 从环境变量加载，关键安全配置（JWT_SECRET）在生产入口缺失时 panic，
//! 开发和测试走 `from_env_with_defaults`。

use serde::{Deserialize, Serialize};
use std::env;

/// 全局网关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub heartbeat: HeartbeatConfig,
    pub monitor: MonitorConfig,
    pub shutdown: ShutdownConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// 令牌提取的第四候选位置：cookie 名
    pub cookie_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    pub interval_seconds: u64,
    /// 超过该往返延迟才记日志
    pub latency_warn_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub snapshot_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 维护通知发出后到关闭传输的等待时间
    pub grace_millis: u64,
    pub drain_timeout_millis: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_payload_bytes: usize,
    pub task_queue_capacity: usize,
}

impl GatewayConfig {
    /// 生产配置：JWT_SECRET 缺失直接 panic，避免带默认密钥上线
    pub fn from_env() -> Self {
        let mut config = Self::from_env_with_defaults();
        config.auth.jwt_secret =
            env::var("JWT_SECRET").expect("JWT_SECRET environment variable is required");
        config
    }

    /// 开发/测试配置：全部字段提供默认值
    pub fn from_env_with_defaults() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: parsed_env("SERVER_PORT", 8080),
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET")
                    .unwrap_or_else(|_| "dev-secret-change-in-production".to_string()),
                cookie_name: env::var("AUTH_COOKIE_NAME")
                    .unwrap_or_else(|_| "auth_token".to_string()),
            },
            cors: CorsConfig {
                allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                    .map(|raw| {
                        raw.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_else(|_| vec!["http://localhost:3000".to_string()]),
            },
            heartbeat: HeartbeatConfig {
                interval_seconds: parsed_env("HEARTBEAT_INTERVAL_SECONDS", 25),
                latency_warn_ms: parsed_env("LATENCY_WARN_MS", 1000),
            },
            monitor: MonitorConfig {
                snapshot_interval_seconds: parsed_env("METRICS_INTERVAL_SECONDS", 60),
            },
            shutdown: ShutdownConfig {
                grace_millis: parsed_env("SHUTDOWN_GRACE_MS", 1000),
                drain_timeout_millis: parsed_env("SHUTDOWN_DRAIN_TIMEOUT_MS", 5000),
            },
            limits: LimitsConfig {
                max_payload_bytes: parsed_env("MAX_PAYLOAD_BYTES", 1024 * 1024),
                task_queue_capacity: parsed_env("TASK_QUEUE_CAPACITY", 256),
            },
        }
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = GatewayConfig::from_env_with_defaults();

        assert!(!config.auth.jwt_secret.is_empty());
        assert_eq!(config.auth.cookie_name, "auth_token");
        assert!(config.heartbeat.interval_seconds > 0);
        assert!(config.limits.max_payload_bytes >= 64 * 1024);
    }
}

//! 诊断计量
//!
//! 出站流量走显式的装饰器 [`MeteredSink`]，入站在接收循环里计数，
//! 不在运行期替换任何传输对象的方法。[`SystemMonitor`] 周期性输出
//! 进程级聚合指标。

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::task::JoinHandle;

use domain::ConnectionMetrics;
use infrastructure::ConnectionRegistry;

/// 计量出站事件数和字节数的发送端包装
pub struct MeteredSink {
    inner: SplitSink<WebSocket, Message>,
    metrics: Arc<ConnectionMetrics>,
}

impl MeteredSink {
    pub fn new(inner: SplitSink<WebSocket, Message>, metrics: Arc<ConnectionMetrics>) -> Self {
        Self { inner, metrics }
    }

    pub async fn send_text(&mut self, text: String) -> Result<(), axum::Error> {
        self.metrics.record_outbound(text.len());
        self.inner.send(Message::Text(text.into())).await
    }
}

/// 进程级指标快照循环
pub struct SystemMonitor {
    handle: JoinHandle<()>,
}

impl SystemMonitor {
    pub fn spawn(registry: Arc<ConnectionRegistry>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // interval 的第一跳立即完成，跳过
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let stats = registry.stats().await;
                tracing::info!(
                    connections = stats.connections,
                    online_users = stats.online_users,
                    rooms = stats.rooms,
                    memory_bytes = process_memory_bytes(),
                    "system metrics snapshot"
                );
            }
        });

        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

/// 常驻内存占用，非Linux平台返回 None
fn process_memory_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * 4096)
}

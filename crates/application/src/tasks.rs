//! 尽力而为的后台任务队列
//!
//! 断连路径上的副作用（如 last-seen 落盘）不允许阻塞也不允许失败上抛，
//! 统一入队由单个工作协程顺序执行，失败只记日志。优雅停机时 `drain`
//! 等待已入队任务执行完毕。

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::error::ApplicationError;

enum Command {
    Run {
        name: &'static str,
        job: BoxFuture<'static, Result<(), ApplicationError>>,
    },
    Close,
}

pub struct TaskQueue {
    sender: mpsc::Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(command) = receiver.recv().await {
                match command {
                    Command::Run { name, job } => {
                        if let Err(err) = job.await {
                            tracing::warn!(task = name, error = %err, "best-effort task failed");
                        }
                    }
                    Command::Close => break,
                }
            }
        });

        Self {
            sender,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// 非阻塞入队
    ///
    /// 队列满时任务被丢弃并告警，调用方从不等待。
    pub fn enqueue<F>(&self, name: &'static str, job: F)
    where
        F: Future<Output = Result<(), ApplicationError>> + Send + 'static,
    {
        let command = Command::Run {
            name,
            job: Box::pin(job),
        };

        match self.sender.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(task = name, "task queue full, dropping task");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(task = name, "task queue already closed");
            }
        }
    }

    /// 停机时排空队列
    ///
    /// 在关闭标记之前入队的任务会被执行完；超时后放弃并中止工作协程。
    pub async fn drain(&self, timeout: Duration) {
        let _ = self.sender.send(Command::Close).await;

        let handle = self.worker.lock().expect("worker lock poisoned").take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(timeout, handle).await.is_err() {
                tracing::warn!("task queue drain timed out");
                abort.abort();
            }
        }
    }
}

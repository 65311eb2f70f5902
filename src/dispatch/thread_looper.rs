//! 独占线程的消息循环
//!
//! 启动一个命名线程，在线程内运行 tokio current-thread 运行时。调用方通过
//! 无界通道投递命令，因此投递永不阻塞；每个延时任务作为 `JoinSet` 中的
//! 一个 tokio 任务等待到期，`remove_all` 时统一中止。

use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::looper::{Looper, Task};
use crate::utils::{MessengerError, Result};

/// 消息循环命令
enum Command {
    /// 延时执行任务
    Post { task: Task, delay: Duration },
    /// 中止所有尚未执行的任务
    RemoveAll,
}

/// 独占线程的消息循环
///
/// 丢弃时关闭命令通道并等待线程退出（在自身线程上丢弃时不等待）。
pub struct ThreadLooper {
    name: String,
    commands: Option<mpsc::UnboundedSender<Command>>,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl ThreadLooper {
    /// 启动一个新的消息循环线程
    ///
    /// # Arguments
    ///
    /// * `name` - 线程名称，同时作为消息循环名称
    ///
    /// # Errors
    ///
    /// 运行时创建失败或线程启动失败时返回 `Io`
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let (tx, rx) = mpsc::unbounded_channel();

        let loop_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || runtime.block_on(run_loop(loop_name, rx)))?;
        let thread_id = handle.thread().id();

        info!(looper = %name, "消息循环线程已启动");

        Ok(Self {
            name,
            commands: Some(tx),
            thread_id,
            handle: Some(handle),
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .as_ref()
            .ok_or_else(|| MessengerError::LooperStopped(self.name.clone()))?
            .send(command)
            .map_err(|_| MessengerError::LooperStopped(self.name.clone()))
    }
}

impl Looper for ThreadLooper {
    fn name(&self) -> &str {
        &self.name
    }

    fn post_delayed(&self, task: Task, delay: Duration) -> Result<()> {
        self.send(Command::Post { task, delay })
    }

    fn remove_all(&self) {
        if let Err(e) = self.send(Command::RemoveAll) {
            debug!(looper = %self.name, error = %e, "消息循环已停止，忽略清空请求");
        }
    }

    fn is_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for ThreadLooper {
    fn drop(&mut self) {
        // 关闭通道后循环会退出
        self.commands.take();
        if let Some(handle) = self.handle.take() {
            if self.is_current_thread() {
                return;
            }
            if handle.join().is_err() {
                warn!(looper = %self.name, "消息循环线程异常退出");
            }
        }
    }
}

impl std::fmt::Debug for ThreadLooper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadLooper")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .field("running", &self.commands.is_some())
            .finish()
    }
}

/// 消息循环主体
async fn run_loop(name: String, mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut timers: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Post { task, delay }) => {
                    timers.spawn(async move {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        task();
                    });
                }
                Some(Command::RemoveAll) => {
                    let aborted = timers.len();
                    timers.abort_all();
                    debug!(looper = %name, aborted = aborted, "已中止所有未执行任务");
                }
                None => break,
            },
            Some(finished) = timers.join_next(), if !timers.is_empty() => {
                if let Err(e) = finished {
                    if e.is_panic() {
                        warn!(looper = %name, "消息循环任务发生 panic");
                    }
                }
            }
        }
    }

    timers.shutdown().await;
    info!(looper = %name, "消息循环线程已退出");
}

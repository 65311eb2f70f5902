//! 消息循环抽象
//!
//! 分发上下文不直接管理线程，而是把投递任务交给一个单线程消息循环执行。
//! 本 crate 提供两种实现：
//!
//! - [`ThreadLooper`](super::thread_looper::ThreadLooper): 独占一个命名线程
//! - [`MainLooper`](super::main_looper::MainLooper): 由宿主在指定线程上驱动

use std::time::Duration;

use crate::utils::Result;

/// 投递到消息循环的任务
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// 单线程消息循环
///
/// 实现必须保证：
///
/// - 任务只在消息循环自己的线程上执行，且同一时刻最多执行一个
/// - 任务不会早于 `delay` 执行
/// - 投递不阻塞调用方
pub trait Looper: Send + Sync {
    /// 消息循环名称
    fn name(&self) -> &str;

    /// 投递一个延时任务
    ///
    /// # Errors
    ///
    /// 消息循环已停止时返回 `LooperStopped`
    fn post_delayed(&self, task: Task, delay: Duration) -> Result<()>;

    /// 移除所有尚未执行的任务，正在执行的任务不受影响
    fn remove_all(&self);

    /// 调用方是否运行在该消息循环的线程上
    fn is_current_thread(&self) -> bool;
}

//! 消息分发入口
//!
//! `Messengers` 持有两个分发上下文：工作上下文和主上下文。发送消息时按标识
//! 奇偶选择上下文，生成新键，写入待投递表并在对应消息循环上调度投递。
//!
//! # 示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use messengers::dispatch::{payload, Messengers, Payload, Tag};
//! use messengers::MessengerConfig;
//!
//! fn main() -> messengers::Result<()> {
//!     let messengers = Messengers::new(&MessengerConfig::default())?;
//!
//!     let listener = Arc::new(|tag: Tag, payload: Option<Payload>| {
//!         println!("收到消息 {tag}: {:?}", payload.is_some());
//!     });
//!
//!     // 偶数标识投递到工作线程
//!     messengers.send_payload(2, payload("done"), &listener)?;
//!     // 奇数标识投递到主上下文，由宿主在主线程上驱动
//!     messengers.send_delayed(3, Duration::from_millis(100), &listener)?;
//!
//!     if let Some(main) = messengers.main_looper() {
//!         main.run_for(Duration::from_millis(200))?;
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::context::{DispatchContext, Route};
use super::holder::Holder;
use super::listener::{OnMessageReceive, Payload, Tag, RESERVED_TAG};
use super::looper::Looper;
use super::main_looper::MainLooper;
use super::thread_looper::ThreadLooper;
use crate::core::config::{MessengerConfig, PrimaryMode};
use crate::utils::id::next_key;
use crate::utils::{MessengerError, Result};

/// 进程级实例
static GLOBAL: OnceLock<Messengers> = OnceLock::new();

// ============================================================================
// Messengers
// ============================================================================

/// 跨线程消息分发器
///
/// 所有方法都可以在任意线程调用，包括两个上下文自己的线程（监听器回调中也可以）。
pub struct Messengers {
    worker: Arc<DispatchContext>,
    primary: Arc<DispatchContext>,
    main_looper: Option<Arc<MainLooper>>,
}

impl Messengers {
    // ========================================================================
    // 创建
    // ========================================================================

    /// 按配置创建分发器
    ///
    /// 工作上下文总是运行在独占线程上；主上下文按 `primary.mode` 选择：
    ///
    /// - `hosted`: 由宿主驱动的 [`MainLooper`]，通过 [`main_looper`](Self::main_looper) 获取
    /// - `thread`: 独占线程
    ///
    /// # Errors
    ///
    /// 配置无效或线程启动失败时返回错误
    pub fn new(config: &MessengerConfig) -> Result<Self> {
        config.validate()?;

        let worker: Arc<dyn Looper> = Arc::new(ThreadLooper::spawn(&config.worker.thread_name)?);

        let (primary, main_looper): (Arc<dyn Looper>, Option<Arc<MainLooper>>) =
            match config.primary.mode {
                PrimaryMode::Hosted => {
                    let main = Arc::new(MainLooper::new(&config.primary.thread_name));
                    let looper: Arc<dyn Looper> = main.clone();
                    (looper, Some(main))
                }
                PrimaryMode::Thread => (
                    Arc::new(ThreadLooper::spawn(&config.primary.thread_name)?),
                    None,
                ),
            };

        info!(
            worker = %config.worker.thread_name,
            primary = %config.primary.thread_name,
            mode = ?config.primary.mode,
            "消息分发器已创建"
        );
        Ok(Self::assemble(worker, primary, main_looper))
    }

    /// 使用外部提供的消息循环创建分发器
    pub fn with_loopers(worker: Arc<dyn Looper>, primary: Arc<dyn Looper>) -> Self {
        Self::assemble(worker, primary, None)
    }

    fn assemble(
        worker: Arc<dyn Looper>,
        primary: Arc<dyn Looper>,
        main_looper: Option<Arc<MainLooper>>,
    ) -> Self {
        Self {
            worker: DispatchContext::new(Route::Worker, worker),
            primary: DispatchContext::new(Route::Primary, primary),
            main_looper,
        }
    }

    /// 获取进程级实例，首次调用时按默认配置创建
    ///
    /// 并发首次调用时只有一个实例会被保留，其余的立即释放。
    pub fn global() -> Result<&'static Messengers> {
        if let Some(messengers) = GLOBAL.get() {
            return Ok(messengers);
        }
        let created = Messengers::new(&MessengerConfig::default())?;
        Ok(GLOBAL.get_or_init(|| created))
    }

    /// 按指定配置初始化进程级实例
    ///
    /// # Errors
    ///
    /// 进程级实例已存在时返回 `InitFailed`
    pub fn init_global(config: &MessengerConfig) -> Result<&'static Messengers> {
        if GLOBAL.get().is_some() {
            return Err(MessengerError::InitFailed("进程级消息分发器已初始化".to_string()));
        }
        let created = Messengers::new(config)?;
        if GLOBAL.set(created).is_err() {
            return Err(MessengerError::InitFailed("进程级消息分发器已初始化".to_string()));
        }
        GLOBAL
            .get()
            .ok_or_else(|| MessengerError::InitFailed("进程级消息分发器不可用".to_string()))
    }

    // ========================================================================
    // 发送
    // ========================================================================

    /// 发送一条消息
    ///
    /// 偶数标识投递到工作上下文，奇数标识投递到主上下文；投递不早于 `delay`。
    /// 只保存监听器的弱引用，监听器在投递前被释放时消息静默丢弃。
    ///
    /// # Errors
    ///
    /// - `ReservedTag`: 标识为 0，不会保存或调度任何内容
    /// - `LooperStopped`: 目标消息循环已停止
    pub fn send<L>(
        &self,
        tag: Tag,
        delay: Duration,
        payload: Option<Payload>,
        listener: &Arc<L>,
    ) -> Result<()>
    where
        L: OnMessageReceive + 'static,
    {
        if tag == RESERVED_TAG {
            warn!(tag = tag, "拒绝发送保留标识");
            return Err(MessengerError::ReservedTag(tag));
        }

        let key = next_key();
        self.context(Route::of(tag))
            .enqueue(key, Holder::new(tag, payload, listener), delay)
    }

    /// 立即发送一条不带负载的消息
    pub fn send_empty<L>(&self, tag: Tag, listener: &Arc<L>) -> Result<()>
    where
        L: OnMessageReceive + 'static,
    {
        self.send(tag, Duration::ZERO, None, listener)
    }

    /// 立即发送一条带负载的消息
    pub fn send_payload<L>(&self, tag: Tag, payload: Option<Payload>, listener: &Arc<L>) -> Result<()>
    where
        L: OnMessageReceive + 'static,
    {
        self.send(tag, Duration::ZERO, payload, listener)
    }

    /// 延时发送一条不带负载的消息
    pub fn send_delayed<L>(&self, tag: Tag, delay: Duration, listener: &Arc<L>) -> Result<()>
    where
        L: OnMessageReceive + 'static,
    {
        self.send(tag, delay, None, listener)
    }

    // ========================================================================
    // 取消
    // ========================================================================

    /// 取消标识为 `tag`、监听器为 `listener` 的所有待投递消息
    ///
    /// 幂等；已经开始执行的回调不会被中断。返回本次取消的消息数。
    pub fn remove<L>(&self, tag: Tag, listener: &Arc<L>) -> usize
    where
        L: OnMessageReceive + 'static,
    {
        let identity = Arc::as_ptr(listener).cast::<()>();
        self.context(Route::of(tag)).remove_listener(tag, identity)
    }

    /// 丢弃两个上下文中所有待投递消息
    pub fn remove_all(&self) {
        let dropped = self.worker.drop_all() + self.primary.drop_all();
        debug!(dropped = dropped, "已丢弃所有待投递消息");
    }

    // ========================================================================
    // 查询
    // ========================================================================

    /// 标识对应的投递目标
    pub fn route(&self, tag: Tag) -> Route {
        Route::of(tag)
    }

    /// 工作上下文
    pub fn worker(&self) -> &Arc<DispatchContext> {
        &self.worker
    }

    /// 主上下文
    pub fn primary(&self) -> &Arc<DispatchContext> {
        &self.primary
    }

    /// 宿主驱动的主消息循环（仅 `hosted` 模式）
    pub fn main_looper(&self) -> Option<&Arc<MainLooper>> {
        self.main_looper.as_ref()
    }

    fn context(&self, route: Route) -> &Arc<DispatchContext> {
        match route {
            Route::Worker => &self.worker,
            Route::Primary => &self.primary,
        }
    }
}

impl fmt::Debug for Messengers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messengers")
            .field("worker", &self.worker)
            .field("primary", &self.primary)
            .field("hosted", &self.main_looper.is_some())
            .finish()
    }
}

// ============================================================================
// 测试
// ============================================================================

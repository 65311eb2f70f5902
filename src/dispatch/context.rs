//! 分发上下文
//!
//! 一个分发上下文 = 一个单线程消息循环 + 一张待投递表（键 -> 消息记录）。
//!
//! # 并发模型
//!
//! 待投递表由一把互斥锁保护：
//!
//! - 插入可以在任意线程进行（`send` 所在线程）
//! - 无条件移除只发生在 `deliver`（消息循环线程）和 `drop_all`
//! - `remove_listener` 只清除记录中的监听器引用，不移除表项；表项在
//!   下一次 `deliver` 访问该键时回收
//!
//! 监听器回调在释放锁之后执行，回调内可以再次发送或取消消息。

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::holder::Holder;
use super::listener::Tag;
use super::looper::Looper;
use crate::utils::id::Key;
use crate::utils::Result;

/// 投递目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// 工作上下文（偶数标识）
    Worker,
    /// 主上下文（奇数标识）
    Primary,
}

impl Route {
    /// 按标识奇偶选择投递目标
    ///
    /// 偶数（含负偶数）投递到工作上下文，奇数（含负奇数）投递到主上下文。
    ///
    /// ```
    /// use messengers::dispatch::Route;
    ///
    /// assert_eq!(Route::of(2), Route::Worker);
    /// assert_eq!(Route::of(3), Route::Primary);
    /// assert_eq!(Route::of(-3), Route::Primary);
    /// ```
    pub fn of(tag: Tag) -> Self {
        if tag % 2 == 0 {
            Route::Worker
        } else {
            Route::Primary
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Worker => write!(f, "worker"),
            Route::Primary => write!(f, "primary"),
        }
    }
}

/// 上下文统计计数
#[derive(Debug, Default)]
struct ContextStats {
    scheduled: AtomicU64,
    delivered: AtomicU64,
    discarded: AtomicU64,
    stale: AtomicU64,
    cancelled: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
    last_delivery_at: Mutex<Option<DateTime<Utc>>>,
}

/// 上下文统计快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStatsSnapshot {
    /// 投递目标
    pub route: Route,
    /// 消息循环名称
    pub looper: String,
    /// 当前待投递表大小（含已取消、尚未回收的记录）
    pub pending: usize,
    /// 已调度的消息数
    pub scheduled: u64,
    /// 已投递给监听器的消息数
    pub delivered: u64,
    /// 因监听器已释放或已取消而丢弃的消息数
    pub discarded: u64,
    /// 投递时记录已不存在的次数
    pub stale: u64,
    /// 被 `remove` 清除监听器的记录数
    pub cancelled: u64,
    /// 被 `drop_all` 清空的记录数
    pub dropped: u64,
    /// 监听器回调 panic 的次数
    pub failed: u64,
    /// 最近一次成功投递的时间
    pub last_delivery_at: Option<DateTime<Utc>>,
}

/// 分发上下文
pub struct DispatchContext {
    route: Route,
    looper: Arc<dyn Looper>,
    pending: Mutex<HashMap<Key, Holder>>,
    stats: ContextStats,
}

impl DispatchContext {
    /// 在给定消息循环上创建分发上下文
    pub fn new(route: Route, looper: Arc<dyn Looper>) -> Arc<Self> {
        info!(context = %route, looper = %looper.name(), "创建分发上下文");
        Arc::new(Self {
            route,
            looper,
            pending: Mutex::new(HashMap::new()),
            stats: ContextStats::default(),
        })
    }

    /// 投递目标
    pub fn route(&self) -> Route {
        self.route
    }

    /// 底层消息循环
    pub fn looper(&self) -> &Arc<dyn Looper> {
        &self.looper
    }

    /// 调用方是否运行在该上下文的线程上
    pub fn is_current_thread(&self) -> bool {
        self.looper.is_current_thread()
    }

    /// 当前待投递表大小
    pub fn pending_len(&self) -> usize {
        self.lock_pending().len()
    }

    /// 插入消息记录并调度投递
    ///
    /// 投递失败（消息循环已停止）时撤回记录并返回错误。
    pub(crate) fn enqueue(self: &Arc<Self>, key: Key, holder: Holder, delay: Duration) -> Result<()> {
        let tag = holder.tag();
        self.lock_pending().insert(key, holder);

        if let Err(e) = self.schedule(key, delay) {
            self.lock_pending().remove(&key);
            warn!(context = %self.route, tag = tag, key = key, error = %e, "调度投递失败");
            return Err(e);
        }

        self.stats.scheduled.fetch_add(1, Ordering::Relaxed);
        debug!(
            context = %self.route,
            tag = tag,
            key = key,
            delay_ms = delay.as_millis() as u64,
            "消息已调度"
        );
        Ok(())
    }

    /// 在消息循环上调度一次 `deliver(key)`，不早于 `delay` 执行
    pub fn schedule(self: &Arc<Self>, key: Key, delay: Duration) -> Result<()> {
        let context: Weak<Self> = Arc::downgrade(self);
        self.looper.post_delayed(
            Box::new(move || {
                if let Some(context) = context.upgrade() {
                    context.deliver(key);
                }
            }),
            delay,
        )
    }

    /// 投递一条消息（只在消息循环线程上调用）
    ///
    /// 找到记录后无条件从表中移除，然后解析监听器：存活则同步回调，否则静默丢弃。
    /// 记录不存在（已投递或已清空）时什么也不做。
    pub fn deliver(&self, key: Key) {
        debug_assert!(
            self.looper.is_current_thread(),
            "deliver 只能在消息循环线程上执行"
        );

        let Some(holder) = self.lock_pending().remove(&key) else {
            self.stats.stale.fetch_add(1, Ordering::Relaxed);
            trace!(context = %self.route, key = key, "记录不存在，跳过投递");
            return;
        };

        let (tag, payload, listener) = holder.into_parts();
        let Some(listener) = listener else {
            self.stats.discarded.fetch_add(1, Ordering::Relaxed);
            trace!(context = %self.route, tag = tag, key = key, "监听器已释放或已取消，丢弃消息");
            return;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_receive(tag, payload)));
        match outcome {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                *self
                    .stats
                    .last_delivery_at
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
                trace!(context = %self.route, tag = tag, key = key, "消息已投递");
            }
            Err(_) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(context = %self.route, tag = tag, key = key, "监听器处理消息时发生 panic");
            }
        }
    }

    /// 清除所有标识为 `tag` 且监听器为 `listener` 的记录中的监听器引用
    ///
    /// 不移除表项，返回本次清除的记录数。
    pub(crate) fn remove_listener(&self, tag: Tag, listener: *const ()) -> usize {
        let cleared = self
            .lock_pending()
            .values_mut()
            .filter(|holder| holder.matches(tag, listener))
            .map(|holder| holder.clear_listener())
            .filter(|&cleared| cleared)
            .count();

        if cleared > 0 {
            self.stats.cancelled.fetch_add(cleared as u64, Ordering::Relaxed);
        }
        debug!(context = %self.route, tag = tag, cleared = cleared, "取消消息监听");
        cleared
    }

    /// 移除消息循环上所有尚未执行的任务并清空待投递表
    ///
    /// 已经开始执行的投递不会被中断。先清任务再清表：并发发送的记录要么随表
    /// 一起清除（残留任务只会命中空键），要么连同任务一起保留并正常投递。
    pub fn drop_all(&self) -> usize {
        self.looper.remove_all();
        let dropped = {
            let mut pending = self.lock_pending();
            let dropped = pending.len();
            pending.clear();
            dropped
        };

        self.stats.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        info!(context = %self.route, dropped = dropped, "已清空所有待投递消息");
        dropped
    }

    /// 获取统计快照
    pub fn stats(&self) -> ContextStatsSnapshot {
        ContextStatsSnapshot {
            route: self.route,
            looper: self.looper.name().to_string(),
            pending: self.pending_len(),
            scheduled: self.stats.scheduled.load(Ordering::Relaxed),
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            discarded: self.stats.discarded.load(Ordering::Relaxed),
            stale: self.stats.stale.load(Ordering::Relaxed),
            cancelled: self.stats.cancelled.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            last_delivery_at: *self
                .stats
                .last_delivery_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<Key, Holder>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchContext")
            .field("route", &self.route)
            .field("looper", &self.looper.name())
            .field("pending", &self.pending_len())
            .finish()
    }
}

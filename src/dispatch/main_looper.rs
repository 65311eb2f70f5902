//! 宿主驱动的消息循环
//!
//! `MainLooper` 没有自己的线程：宿主在指定线程（通常是进程主线程）上调用
//! `run` / `run_for` / `run_pending` 驱动它。第一个驱动它的线程成为所属线程，
//! 之后从其他线程驱动会返回 `WrongThread`。投递和清空可以在任意线程进行。
//!
//! 时钟有两种：系统时钟（真实时间）和手动时钟（测试中用 `advance` 推进）。

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::looper::{Looper, Task};
use crate::utils::{MessengerError, Result};

/// 消息循环时钟，返回自创建以来经过的时间
#[derive(Debug)]
enum Clock {
    System(Instant),
    Manual(Mutex<Duration>),
}

impl Clock {
    fn now(&self) -> Duration {
        match self {
            Clock::System(origin) => origin.elapsed(),
            Clock::Manual(elapsed) => *elapsed.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// 已排队的任务
///
/// 到期时间早的先出；到期时间相同时按投递顺序（FIFO）。
struct Scheduled {
    due: Duration,
    sequence: u64,
    task: Task,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.sequence == other.sequence
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap 是最大堆，这里反转顺序
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Default)]
struct QueueState {
    queue: BinaryHeap<Scheduled>,
    quit: bool,
}

/// 宿主驱动的消息循环
pub struct MainLooper {
    name: String,
    clock: Clock,
    state: Mutex<QueueState>,
    wakeup: Condvar,
    owner: OnceLock<ThreadId>,
    sequence: AtomicU64,
}

impl MainLooper {
    /// 创建使用系统时钟的消息循环
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_clock(name.into(), Clock::System(Instant::now()))
    }

    /// 创建使用手动时钟的消息循环，时间只通过 [`advance`](Self::advance) 前进
    pub fn with_manual_clock(name: impl Into<String>) -> Self {
        Self::with_clock(name.into(), Clock::Manual(Mutex::new(Duration::ZERO)))
    }

    fn with_clock(name: String, clock: Clock) -> Self {
        debug!(looper = %name, manual_clock = matches!(clock, Clock::Manual(_)), "创建宿主消息循环");
        Self {
            name,
            clock,
            state: Mutex::new(QueueState::default()),
            wakeup: Condvar::new(),
            owner: OnceLock::new(),
            sequence: AtomicU64::new(0),
        }
    }

    /// 把当前线程绑定为所属线程
    ///
    /// # Errors
    ///
    /// 已绑定到其他线程时返回 `WrongThread`
    pub fn bind_current_thread(&self) -> Result<()> {
        let current = thread::current().id();
        if *self.owner.get_or_init(|| current) == current {
            Ok(())
        } else {
            Err(MessengerError::WrongThread {
                looper: self.name.clone(),
            })
        }
    }

    /// 已排队（尚未执行）的任务数
    pub fn queued(&self) -> usize {
        self.lock_state().queue.len()
    }

    /// 距离下一个任务到期还有多久；队列为空时返回 `None`
    pub fn next_due_in(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.lock_state()
            .queue
            .peek()
            .map(|next| next.due.saturating_sub(now))
    }

    /// 执行所有已到期的任务，返回执行数量
    ///
    /// 只执行本轮开始时已到期且已投递的任务；执行过程中新投递的任务留到下一轮。
    pub fn run_pending(&self) -> Result<usize> {
        self.bind_current_thread()?;

        let now = self.clock.now();
        let horizon = self.sequence.load(AtomicOrdering::SeqCst);
        let mut executed = 0;

        while let Some(task) = self.pop_due(now, horizon) {
            task();
            executed += 1;
        }

        if executed > 0 {
            trace!(looper = %self.name, executed = executed, "执行到期任务");
        }
        Ok(executed)
    }

    /// 在当前线程上驱动消息循环，直到经过 `duration` 或调用了 [`quit`](Self::quit)
    ///
    /// 使用手动时钟时不会阻塞，等价于 `advance(duration)`。
    pub fn run_for(&self, duration: Duration) -> Result<usize> {
        self.bind_current_thread()?;
        if matches!(self.clock, Clock::Manual(_)) {
            return self.advance(duration);
        }

        let deadline = self.clock.now().saturating_add(duration);
        self.drive(Some(deadline))
    }

    /// 在当前线程上驱动消息循环，直到调用了 [`quit`](Self::quit)
    pub fn run(&self) -> Result<usize> {
        self.bind_current_thread()?;
        self.drive(None)
    }

    /// 请求 `run` / `run_for` 返回，可在任意线程调用
    pub fn quit(&self) {
        self.lock_state().quit = true;
        self.wakeup.notify_all();
    }

    /// 推进手动时钟并执行到期任务
    ///
    /// # Errors
    ///
    /// 使用系统时钟时返回 `ManualClockRequired`；非所属线程调用返回 `WrongThread`
    pub fn advance(&self, by: Duration) -> Result<usize> {
        self.bind_current_thread()?;
        match self.clock {
            Clock::Manual(ref elapsed) => {
                let mut elapsed = elapsed.lock().unwrap_or_else(PoisonError::into_inner);
                *elapsed = elapsed.saturating_add(by);
            }
            Clock::System(_) => {
                return Err(MessengerError::ManualClockRequired {
                    looper: self.name.clone(),
                })
            }
        }
        self.run_pending()
    }

    fn drive(&self, deadline: Option<Duration>) -> Result<usize> {
        let mut executed = 0;
        loop {
            executed += self.run_pending()?;

            let now = self.clock.now();
            if deadline.is_some_and(|d| now >= d) {
                break;
            }

            let mut state = self.lock_state();
            if state.quit {
                state.quit = false;
                break;
            }

            let until_next = state.queue.peek().map(|next| next.due.saturating_sub(now));
            let until_deadline = deadline.map(|d| d.saturating_sub(now));
            let wait = match (until_next, until_deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            match wait {
                Some(wait) if wait.is_zero() => continue,
                Some(wait) => {
                    drop(
                        self.wakeup
                            .wait_timeout(state, wait)
                            .unwrap_or_else(PoisonError::into_inner),
                    );
                }
                None => {
                    drop(self.wakeup.wait(state).unwrap_or_else(PoisonError::into_inner));
                }
            }
        }
        Ok(executed)
    }

    fn pop_due(&self, now: Duration, horizon: u64) -> Option<Task> {
        let mut state = self.lock_state();
        let ready = state
            .queue
            .peek()
            .is_some_and(|next| next.due <= now && next.sequence < horizon);
        if ready {
            state.queue.pop().map(|scheduled| scheduled.task)
        } else {
            None
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Looper for MainLooper {
    fn name(&self) -> &str {
        &self.name
    }

    fn post_delayed(&self, task: Task, delay: Duration) -> Result<()> {
        let sequence = self.sequence.fetch_add(1, AtomicOrdering::SeqCst);
        // 超长延时截断为最远的到期时间
        let due = self.clock.now().saturating_add(delay);
        self.lock_state().queue.push(Scheduled {
            due,
            sequence,
            task,
        });
        self.wakeup.notify_all();
        Ok(())
    }

    fn remove_all(&self) {
        let removed = {
            let mut state = self.lock_state();
            let removed = state.queue.len();
            state.queue.clear();
            removed
        };
        self.wakeup.notify_all();
        debug!(looper = %self.name, removed = removed, "已移除所有未执行任务");
    }

    fn is_current_thread(&self) -> bool {
        self.owner.get() == Some(&thread::current().id())
    }
}

impl std::fmt::Debug for MainLooper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainLooper")
            .field("name", &self.name)
            .field("owner", &self.owner.get())
            .field("queued", &self.queued())
            .finish()
    }
}

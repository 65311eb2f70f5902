//! 消息键生成器
//!
//! 每条待投递消息都有一个键，用于把消息循环中的定时任务和待投递表中的
//! 记录关联起来。键由原子计数器生成，0 为保留值，第一个键为 1。

use std::sync::atomic::{AtomicU64, Ordering};

/// 消息键
pub type Key = u64;

/// 保留键，生成器永远不会产出该值
pub const RESERVED_KEY: Key = 0;

/// 进程级键生成器，所有 `Messengers` 实例共享
static PROCESS_KEYS: KeyGenerator = KeyGenerator::new();

/// 原子递增的键生成器
///
/// 只依赖一次 `fetch_add`，不需要额外的同步。
#[derive(Debug)]
pub struct KeyGenerator {
    last: AtomicU64,
}

impl KeyGenerator {
    /// 创建新的生成器，下一个键为 1
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(RESERVED_KEY),
        }
    }

    /// 生成下一个键
    pub fn next_key(&self) -> Key {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 最近一次生成的键（尚未生成时为 `RESERVED_KEY`）
    pub fn last_key(&self) -> Key {
        self.last.load(Ordering::Relaxed)
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// 从进程级生成器获取下一个键
///
/// # Example
///
/// ```
/// use messengers::utils::id::{next_key, RESERVED_KEY};
///
/// let a = next_key();
/// let b = next_key();
/// assert_ne!(a, RESERVED_KEY);
/// assert!(b > a);
/// ```
pub fn next_key() -> Key {
    PROCESS_KEYS.next_key()
}

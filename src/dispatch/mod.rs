//! 消息分发模块
//!
//! 包含监听器、消息循环、分发上下文和对外的 `Messengers` 入口。

pub mod context;
mod holder;
pub mod listener;
pub mod looper;
pub mod main_looper;
pub mod messengers;
pub mod thread_looper;

// 重导出常用类型
pub use context::{ContextStatsSnapshot, DispatchContext, Route};
pub use listener::{payload, OnMessageReceive, Payload, Tag, RESERVED_TAG};
pub use looper::{Looper, Task};
pub use main_looper::MainLooper;
pub use messengers::Messengers;
pub use thread_looper::ThreadLooper;

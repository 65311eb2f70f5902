//! 消息监听器与负载类型

use std::any::Any;

/// 消息标识
///
/// 奇偶决定投递上下文：偶数投递到工作上下文，奇数投递到主上下文。
/// 0 为保留值，发送时会被拒绝。
pub type Tag = i32;

/// 保留标识
pub const RESERVED_TAG: Tag = 0;

/// 消息携带的不透明负载，投递时移交给监听器
pub type Payload = Box<dyn Any + Send>;

/// 把任意值包装为负载
///
/// # Example
///
/// ```
/// use messengers::dispatch::payload;
///
/// let p = payload("done");
/// assert_eq!(p.and_then(|p| p.downcast::<&str>().ok()).map(|s| *s), Some("done"));
/// ```
pub fn payload<T: Any + Send>(value: T) -> Option<Payload> {
    Some(Box::new(value))
}

/// 消息监听器
///
/// 系统只持有监听器的弱引用，监听器的生命周期完全由应用控制。
/// 监听器被释放后，尚未投递的消息会在投递时被静默丢弃。
///
/// 闭包 `Fn(Tag, Option<Payload>)` 也实现了该 trait。
pub trait OnMessageReceive: Send + Sync {
    /// 接收消息，在消息所属上下文的线程上同步调用
    fn on_receive(&self, tag: Tag, payload: Option<Payload>);
}

impl<F> OnMessageReceive for F
where
    F: Fn(Tag, Option<Payload>) + Send + Sync,
{
    fn on_receive(&self, tag: Tag, payload: Option<Payload>) {
        self(tag, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_closure_listener() {
        let seen = Arc::new(AtomicI32::new(0));
        let seen_clone = seen.clone();
        let listener = move |tag: Tag, _payload: Option<Payload>| {
            seen_clone.store(tag, Ordering::SeqCst);
        };
        listener.on_receive(7, None);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_payload_downcast() {
        let p = payload(42_u32).unwrap();
        assert_eq!(*p.downcast::<u32>().unwrap(), 42);

        let p = payload(String::from("x")).unwrap();
        assert!(p.downcast::<u32>().is_err());
    }
}

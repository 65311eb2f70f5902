//! 待投递消息记录

use std::fmt;
use std::sync::{Arc, Weak};

use super::listener::{OnMessageReceive, Payload, Tag};

/// 待投递消息
///
/// 标识和负载不可变；监听器以弱引用保存，只能被清除一次（幂等）。
/// 从插入待投递表到投递或丢弃期间，由分发上下文独占。
pub(crate) struct Holder {
    tag: Tag,
    payload: Option<Payload>,
    listener: Option<Weak<dyn OnMessageReceive>>,
}

impl Holder {
    pub(crate) fn new<L>(tag: Tag, payload: Option<Payload>, listener: &Arc<L>) -> Self
    where
        L: OnMessageReceive + 'static,
    {
        let weak = Arc::downgrade(listener);
        let weak: Weak<dyn OnMessageReceive> = weak;
        Self {
            tag,
            payload,
            listener: Some(weak),
        }
    }

    pub(crate) fn tag(&self) -> Tag {
        self.tag
    }

    /// 标识相同且监听器为同一对象（按地址比较）
    pub(crate) fn matches(&self, tag: Tag, listener: *const ()) -> bool {
        self.tag == tag
            && self
                .listener
                .as_ref()
                .is_some_and(|weak| weak.as_ptr().cast::<()>() == listener)
    }

    /// 清除监听器引用，返回本次是否真正清除
    pub(crate) fn clear_listener(&mut self) -> bool {
        self.listener.take().is_some()
    }

    pub(crate) fn is_cleared(&self) -> bool {
        self.listener.is_none()
    }

    /// 拆分为标识、负载和仍然存活的监听器
    pub(crate) fn into_parts(self) -> (Tag, Option<Payload>, Option<Arc<dyn OnMessageReceive>>) {
        let listener = self.listener.and_then(|weak| weak.upgrade());
        (self.tag, self.payload, listener)
    }
}

impl fmt::Debug for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Holder")
            .field("tag", &self.tag)
            .field("has_payload", &self.payload.is_some())
            .field("cleared", &self.is_cleared())
            .finish()
    }
}

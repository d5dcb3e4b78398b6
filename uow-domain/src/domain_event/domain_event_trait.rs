use super::phase::PhaseMarkers;
use crate::describe::Describe;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 领域事件需要满足的通用能力边界。
///
/// 事件本身不带标识，标识由入队时的聚合键与聚合类型提供。
pub trait DomainEvent: Describe + EventEq + fmt::Debug + Send + Sync + 'static {
    /// 事件类型名（形如 `OrderPlaced` 或 `OrderEvent.Placed`）
    fn event_type(&self) -> &'static str;

    /// 写入事件日志的描述，默认与类型名相同
    fn description(&self) -> String {
        self.event_type().to_string()
    }

    /// 阶段标记，默认为提交后事件
    fn phase_markers(&self) -> PhaseMarkers {
        PhaseMarkers::POST_COMMIT
    }
}

/// 类型擦除后的共享事件
pub type AnyEvent = Arc<dyn DomainEvent>;

/// 事件的结构相等与运行时类型访问，对所有 `PartialEq` 类型自动实现
pub trait EventEq {
    fn as_any(&self) -> &(dyn Any + Send + Sync);

    fn event_eq(&self, other: &(dyn Any + Send + Sync)) -> bool;
}

impl<T> EventEq for T
where
    T: PartialEq + Any + Send + Sync,
{
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn event_eq(&self, other: &(dyn Any + Send + Sync)) -> bool {
        other.downcast_ref::<T>().is_some_and(|other| self == other)
    }
}

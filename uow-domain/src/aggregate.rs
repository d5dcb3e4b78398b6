//! 聚合（Aggregate）抽象
//!
//! 聚合是一致性边界，在一次工作单元内通过 `EventRecorder` 记录尚未发布的
//! 领域事件。事件管道只读取这些事件，从不持久化或缓存聚合本身：
//! - `Aggregate`：强类型聚合（通常由 `#[aggregate]` 宏生成实现）；
//! - `EventSource`：管道所需的最小视图（键、类型、未发布事件）；
//! - `PendingAggregate`：持久化上下文交给管道的快照。
//!
use crate::domain_event::{AnyEvent, DomainEvent};
use crate::entity::Entity;
use serde::{Serialize, de::DeserializeOwned};
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 聚合根接口
pub trait Aggregate: Entity + Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;

    fn recorder(&self) -> &EventRecorder;

    fn recorder_mut(&mut self) -> &mut EventRecorder;

    /// 记录一条领域事件，等待工作单元提交时处理
    fn record_event<E: DomainEvent>(&mut self, event: E)
    where
        Self: Sized,
    {
        self.recorder_mut().record(event);
    }
}

/// 聚合类型标识：以 `TypeId` 判等，附带可读名称
#[derive(Clone, Copy)]
pub struct AggregateType {
    type_id: TypeId,
    name: &'static str,
}

impl AggregateType {
    pub fn of<A: Aggregate>() -> Self {
        Self {
            type_id: TypeId::of::<A>(),
            name: A::TYPE,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for AggregateType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for AggregateType {}

impl Hash for AggregateType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 聚合内记录的未发布事件列表
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Vec<AnyEvent>,
}

impl EventRecorder {
    pub fn record<E: DomainEvent>(&mut self, event: E) {
        self.events.push(Arc::new(event));
    }

    pub fn record_shared(&mut self, event: AnyEvent) {
        self.events.push(event);
    }

    pub fn unpublished(&self) -> &[AnyEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// 逐条按结构比较，便于聚合本身派生 PartialEq
impl PartialEq for EventRecorder {
    fn eq(&self, other: &Self) -> bool {
        self.events.len() == other.events.len()
            && self
                .events
                .iter()
                .zip(&other.events)
                .all(|(a, b)| a.event_eq(b.as_any()))
    }
}

/// 事件来源：事件队列工厂扫描的最小视图
pub trait EventSource {
    fn aggregate_key(&self) -> String;

    fn aggregate_type(&self) -> AggregateType;

    fn unpublished_events(&self) -> &[AnyEvent];
}

impl<A: Aggregate> EventSource for A {
    fn aggregate_key(&self) -> String {
        self.id().to_string()
    }

    fn aggregate_type(&self) -> AggregateType {
        AggregateType::of::<A>()
    }

    fn unpublished_events(&self) -> &[AnyEvent] {
        self.recorder().unpublished()
    }
}

/// 待提交聚合的快照（事件以 `Arc` 共享，不复制载荷）
#[derive(Debug, Clone)]
pub struct PendingAggregate {
    key: String,
    aggregate_type: AggregateType,
    events: Vec<AnyEvent>,
}

impl PendingAggregate {
    pub fn new(key: impl Into<String>, aggregate_type: AggregateType, events: Vec<AnyEvent>) -> Self {
        Self {
            key: key.into(),
            aggregate_type,
            events,
        }
    }

    pub fn from_aggregate<A: Aggregate>(aggregate: &A) -> Self {
        Self::new(
            aggregate.aggregate_key(),
            AggregateType::of::<A>(),
            aggregate.unpublished_events().to_vec(),
        )
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn events(&self) -> &[AnyEvent] {
        &self.events
    }
}

impl EventSource for PendingAggregate {
    fn aggregate_key(&self) -> String {
        self.key.clone()
    }

    fn aggregate_type(&self) -> AggregateType {
        self.aggregate_type
    }

    fn unpublished_events(&self) -> &[AnyEvent] {
        &self.events
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::AggregateType;
    use std::any::TypeId;

    pub(crate) fn aggregate_type(type_id: TypeId, name: &'static str) -> AggregateType {
        AggregateType { type_id, name }
    }
}

//! 事件队列（EventQueue）
//!
//! 一次工作单元内的有序事件集合：
//! - `EventQueueItem`：`(聚合键, 聚合类型, 事件)` 三元组，按结构判等；
//! - `EventQueue`：先进先出，支持与另一组条目做差集；
//! - `EventQueueFactory`：按阶段扫描聚合的未发布事件生成队列。
//!
use crate::aggregate::{AggregateType, EventSource};
use crate::domain_event::{AnyEvent, DomainEvent, Phase};
use crate::error::{DomainError, DomainResult};
use std::collections::VecDeque;
use std::collections::vec_deque;

/// 队列条目：事件及其来源聚合
#[derive(Debug, Clone)]
pub struct EventQueueItem {
    aggregate_key: String,
    aggregate_type: AggregateType,
    event: AnyEvent,
}

impl EventQueueItem {
    pub fn new(aggregate_key: impl Into<String>, aggregate_type: AggregateType, event: AnyEvent) -> Self {
        Self {
            aggregate_key: aggregate_key.into(),
            aggregate_type,
            event,
        }
    }

    pub fn aggregate_key(&self) -> &str {
        &self.aggregate_key
    }

    pub fn aggregate_type(&self) -> AggregateType {
        self.aggregate_type
    }

    pub fn event(&self) -> &dyn DomainEvent {
        &*self.event
    }

    pub fn event_type(&self) -> &'static str {
        self.event().event_type()
    }
}

impl PartialEq for EventQueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.aggregate_key == other.aggregate_key
            && self.aggregate_type == other.aggregate_type
            && self.event().event_eq(other.event().as_any())
    }
}

/// 先进先出的事件队列
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    items: VecDeque<EventQueueItem>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: EventQueueItem) {
        self.items.push_back(item);
    }

    /// 弹出队首条目，空队列返回 `EmptyQueue`
    pub fn get_next(&mut self) -> DomainResult<EventQueueItem> {
        self.items.pop_front().ok_or(DomainError::EmptyQueue)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, EventQueueItem> {
        self.items.iter()
    }

    /// 返回不含 `removed` 中任一（结构相等）条目的新队列，保持原有顺序
    pub fn remove(&self, removed: &[EventQueueItem]) -> EventQueue {
        self.items
            .iter()
            .filter(|item| !removed.contains(item))
            .cloned()
            .collect()
    }
}

impl FromIterator<EventQueueItem> for EventQueue {
    fn from_iter<I: IntoIterator<Item = EventQueueItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for EventQueue {
    type Item = EventQueueItem;
    type IntoIter = vec_deque::IntoIter<EventQueueItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a EventQueue {
    type Item = &'a EventQueueItem;
    type IntoIter = vec_deque::Iter<'a, EventQueueItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// 事件队列工厂：只读扫描，不修改聚合
#[derive(Debug, Clone, Copy, Default)]
pub struct EventQueueFactory;

impl EventQueueFactory {
    /// 先按聚合顺序、再按事件记录顺序，收集属于 `phase` 的未发布事件
    pub fn create_queue<S: EventSource>(&self, phase: Phase, aggregates: &[S]) -> EventQueue {
        let mut queue = EventQueue::new();

        for aggregate in aggregates {
            let key = aggregate.aggregate_key();
            let aggregate_type = aggregate.aggregate_type();

            for event in aggregate.unpublished_events() {
                if event.phase_markers().includes(phase) {
                    queue.add(EventQueueItem::new(key.clone(), aggregate_type, event.clone()));
                }
            }
        }

        queue
    }
}

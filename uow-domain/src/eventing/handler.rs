//! 事件处理器（EventHandler）
//!
//! 定义消费某一类事件的处理逻辑与元信息（名称、所属阶段）。
//!
use crate::aggregate::AggregateType;
use crate::domain_event::{DomainEvent, Phase, PhaseMarkers};
use async_trait::async_trait;

/// 分发时传给处理器的上下文：事件来源聚合与当前阶段
#[derive(Debug, Clone)]
pub struct DispatchContext {
    aggregate_key: String,
    aggregate_type: AggregateType,
    phase: Phase,
}

impl DispatchContext {
    pub fn new(aggregate_key: impl Into<String>, aggregate_type: AggregateType, phase: Phase) -> Self {
        Self {
            aggregate_key: aggregate_key.into(),
            aggregate_type,
            phase,
        }
    }

    pub fn aggregate_key(&self) -> &str {
        &self.aggregate_key
    }

    pub fn aggregate_type(&self) -> AggregateType {
        self.aggregate_type
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// 事件处理器：处理某一类型的事件
#[async_trait]
pub trait EventHandler<E>: Send + Sync
where
    E: DomainEvent,
{
    /// 处理器名称（用于故障定位与日志）
    fn handler_name(&self) -> &str;

    /// 处理器所属阶段，默认为提交后
    fn phase_markers(&self) -> PhaseMarkers {
        PhaseMarkers::POST_COMMIT
    }

    /// 处理事件
    async fn handle(&self, event: &E, context: &DispatchContext) -> anyhow::Result<()>;
}

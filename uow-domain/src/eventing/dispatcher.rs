use super::handler::DispatchContext;
use super::registry::{HandlerRegistry, RegisteredHandler};
use crate::domain_event::{DomainEvent, Phase};
use crate::error::{DomainError, DomainResult};
use crate::event_queue::EventQueueItem;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tracing::debug;

/// 事件分发器：按事件类型与处理器阶段解析处理器并顺序执行。
///
/// 首个失败的处理器立即中止本次分发（后续处理器不再执行）。
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<HandlerRegistry>,
}

impl EventDispatcher {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// 已知具体事件类型时的分发入口，返回执行的处理器数量
    pub async fn dispatch<E: DomainEvent>(
        &self,
        event: &E,
        context: &DispatchContext,
    ) -> DomainResult<usize> {
        self.dispatch_erased(TypeId::of::<E>(), event.as_any(), event.event_type(), context)
            .await
    }

    /// 只持有 `dyn DomainEvent` 时的入口：运行时解析具体类型后走同一条路径
    pub async fn dispatch_any(
        &self,
        event: &dyn DomainEvent,
        context: &DispatchContext,
    ) -> DomainResult<usize> {
        let payload = event.as_any();
        self.dispatch_erased(Any::type_id(payload), payload, event.event_type(), context)
            .await
    }

    /// 分发队列条目（工作单元使用）
    pub async fn dispatch_item(&self, item: &EventQueueItem, phase: Phase) -> DomainResult<usize> {
        let context = DispatchContext::new(item.aggregate_key(), item.aggregate_type(), phase);
        self.dispatch_any(item.event(), &context).await
    }

    async fn dispatch_erased(
        &self,
        type_id: TypeId,
        event: &(dyn Any + Send + Sync),
        event_type: &str,
        context: &DispatchContext,
    ) -> DomainResult<usize> {
        let handlers = self.registry.resolve(type_id, context.phase());

        for handler in &handlers {
            debug!(
                handler = handler.name(),
                event_type,
                aggregate_key = context.aggregate_key(),
                phase = %context.phase(),
                "dispatching event"
            );

            if let Err(err) = handler.invoke(event, context).await {
                return Err(handler_fault(handler, event_type, context, err));
            }
        }

        Ok(handlers.len())
    }
}

fn handler_fault(
    handler: &RegisteredHandler,
    event_type: &str,
    context: &DispatchContext,
    err: anyhow::Error,
) -> DomainError {
    DomainError::HandlerFault {
        handler: handler.name().to_string(),
        event_type: event_type.to_string(),
        aggregate_key: context.aggregate_key().to_string(),
        aggregate_type: context.aggregate_type().name().to_string(),
        phase: context.phase(),
        reason: format!("{err:#}"),
    }
}

use super::handler::{DispatchContext, EventHandler};
use crate::domain_event::{DomainEvent, Phase, PhaseMarkers};
use futures_util::future::BoxFuture;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

type HandlerFn = Arc<
    dyn for<'a> Fn(&'a (dyn Any + Send + Sync), &'a DispatchContext) -> BoxFuture<'a, anyhow::Result<()>>
        + Send
        + Sync,
>;

// 借助 Fn 约束让闭包推导出高阶生命周期签名
fn erase<F>(f: F) -> HandlerFn
where
    F: for<'a> Fn(&'a (dyn Any + Send + Sync), &'a DispatchContext) -> BoxFuture<'a, anyhow::Result<()>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// 已注册的处理器（类型擦除）
#[derive(Clone)]
pub struct RegisteredHandler {
    name: String,
    markers: PhaseMarkers,
    invoke: HandlerFn,
}

impl RegisteredHandler {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase_markers(&self) -> PhaseMarkers {
        self.markers
    }

    pub(crate) async fn invoke(
        &self,
        event: &(dyn Any + Send + Sync),
        context: &DispatchContext,
    ) -> anyhow::Result<()> {
        (self.invoke)(event, context).await
    }
}

/// 处理器注册表
/// - 以事件的 `TypeId` 为键，启动时一次性构建
/// - 同一事件类型下保持注册顺序
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    by_type: HashMap<TypeId, Vec<RegisteredHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册事件 `E` 的处理器
    pub fn register<E, H>(&mut self, handler: Arc<H>) -> &mut Self
    where
        E: DomainEvent,
        H: EventHandler<E> + 'static,
    {
        let name = handler.handler_name().to_string();
        let markers = handler.phase_markers();

        let invoke = erase(move |event, context| {
            let handler = handler.clone();

            Box::pin(async move {
                // 正常情况下这里的 downcast 永远不会失败（键与闭包同一泛型 E）
                match event.downcast_ref::<E>() {
                    Some(event) => handler.handle(event, context).await,
                    None => Err(anyhow::anyhow!(
                        "type mismatch: expected {}",
                        std::any::type_name::<E>()
                    )),
                }
            })
        });

        self.by_type
            .entry(TypeId::of::<E>())
            .or_default()
            .push(RegisteredHandler {
                name,
                markers,
                invoke,
            });
        self
    }

    /// 该事件类型下、属于 `phase` 的处理器（按注册顺序）
    pub fn resolve(&self, event_type: TypeId, phase: Phase) -> Vec<RegisteredHandler> {
        self.by_type
            .get(&event_type)
            .map(|handlers| {
                handlers
                    .iter()
                    .filter(|h| h.markers.includes(phase))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

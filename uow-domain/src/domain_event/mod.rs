//! 领域事件（Domain Event）与阶段分类
//!
//! 定义事件载荷需要实现的最小接口（`DomainEvent`）、类型擦除后的共享形态
//! `AnyEvent`，以及决定事件/处理器所属阶段的 `PhaseMarkers`。

mod domain_event_trait;
mod phase;

pub use domain_event_trait::{AnyEvent, DomainEvent, EventEq};
pub use phase::{Phase, PhaseMarkers};

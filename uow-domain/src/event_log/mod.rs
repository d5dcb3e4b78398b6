//! 事件日志（EventLog）
//!
//! 提交后阶段为每个已分发事件生成一条审计日志：
//! - `EventLogFlattener`：把事件载荷（`Describe`）递归展开为 `DetailNode` 树；
//! - `EventLogEntry`：日志条目，可转为带父引用的行形态 `DetailRow`；
//! - `EventLogStore`：只追加的日志存储协议，内置 `InMemoryEventLogStore`。
//!
mod entry;
mod flattener;
mod store;
#[cfg(feature = "inmemory")]
mod store_inmemory;

pub use entry::{DetailNode, DetailRow, EventLogEntry};
pub use flattener::EventLogFlattener;
pub use store::EventLogStore;
#[cfg(feature = "inmemory")]
pub use store_inmemory::InMemoryEventLogStore;

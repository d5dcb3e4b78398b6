//! 持久化（persist）
//!
//! 工作单元依赖的持久化协议及内存实现：
//! - `PersistenceContext`：待提交聚合、事务边界、刷新与事件清理；
//! - `InMemoryStore`/`InMemorySession`：带版本号与乐观并发检查的内存会话，
//!   用于测试、演示与本地开发。
//!
//! 生产存储后端由上层实现 `PersistenceContext` 并注入工作单元。
//!
mod context;
#[cfg(feature = "inmemory")]
mod session_inmemory;

pub use context::{IsolationLevel, PersistenceContext};
#[cfg(feature = "inmemory")]
pub use session_inmemory::{InMemorySession, InMemoryStore};

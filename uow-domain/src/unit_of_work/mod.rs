//! 工作单元（UnitOfWork）
//!
//! 在一次提交中编排领域事件的处理：
//! - 预提交阶段做不动点迭代，处理器可以继续修改聚合并产生新事件；
//! - 提交阶段在事务内落盘，并发冲突时回滚并刷新已跟踪聚合；
//! - 提交后阶段投递通知并写入事件日志，单条失败不影响其余事件。
//!
//! 冲突后的整体重试由调用方通过 `retry_on_conflict` 决定。
//!
mod config;
mod retry;
mod state;
mod work;

pub use config::{RetryPolicy, UnitOfWorkConfig};
pub use retry::retry_on_conflict;
pub use state::UnitOfWorkState;
pub use work::{CommitReport, UnitOfWork};

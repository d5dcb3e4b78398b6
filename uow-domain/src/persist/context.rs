//! 持久化上下文协议
//!
//! 工作单元只通过该协议与存储交互：读取待提交聚合、管理事务、
//! 在提交成功后清空聚合的未发布事件。
//!
use crate::aggregate::PendingAggregate;
use crate::error::DomainResult as Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// 事务隔离级别
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IsolationLevel::ReadUncommitted => "read-uncommitted",
            IsolationLevel::ReadCommitted => "read-committed",
            IsolationLevel::RepeatableRead => "repeatable-read",
            IsolationLevel::Serializable => "serializable",
        };
        f.write_str(name)
    }
}

#[async_trait]
pub trait PersistenceContext: Send + Sync {
    /// 当前有待提交变更或未发布事件的聚合快照，按跟踪顺序
    async fn pending_aggregates(&self) -> Result<Vec<PendingAggregate>>;

    async fn begin_transaction(&self, isolation: IsolationLevel) -> Result<()>;

    /// 把变更写入事务，返回受影响行数
    async fn flush(&self) -> Result<usize>;

    async fn commit(&self) -> Result<()>;

    /// 没有打开的事务时为空操作
    async fn rollback(&self) -> Result<()>;

    /// 丢弃内存中的变更，从存储重新加载所有已跟踪聚合
    async fn refresh_all(&self) -> Result<()>;

    /// 清空这些聚合的未发布事件
    async fn mark_published(&self, aggregates: &[PendingAggregate]) -> Result<()>;
}

#[async_trait]
impl<T: PersistenceContext + ?Sized> PersistenceContext for Arc<T> {
    async fn pending_aggregates(&self) -> Result<Vec<PendingAggregate>> {
        (**self).pending_aggregates().await
    }

    async fn begin_transaction(&self, isolation: IsolationLevel) -> Result<()> {
        (**self).begin_transaction(isolation).await
    }

    async fn flush(&self) -> Result<usize> {
        (**self).flush().await
    }

    async fn commit(&self) -> Result<()> {
        (**self).commit().await
    }

    async fn rollback(&self) -> Result<()> {
        (**self).rollback().await
    }

    async fn refresh_all(&self) -> Result<()> {
        (**self).refresh_all().await
    }

    async fn mark_published(&self, aggregates: &[PendingAggregate]) -> Result<()> {
        (**self).mark_published(aggregates).await
    }
}

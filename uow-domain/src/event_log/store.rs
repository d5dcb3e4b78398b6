use super::entry::EventLogEntry;
use crate::error::DomainResult as Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// 事件日志存储：只追加，按时间区间或键查询
#[async_trait]
pub trait EventLogStore: Send + Sync {
    async fn append(&self, entry: EventLogEntry) -> Result<()>;

    async fn get(&self, lookup_key: &str) -> Result<Option<EventLogEntry>>;

    /// `date_created` 落在 `[start, end]` 的日志，新的在前；`end` 为空表示不设上限
    async fn query(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventLogEntry>>;

    /// 某个聚合的全部日志，新的在前
    async fn query_by_aggregate(&self, aggregate_key: &str) -> Result<Vec<EventLogEntry>>;
}

#[async_trait]
impl<T: EventLogStore + ?Sized> EventLogStore for Arc<T> {
    async fn append(&self, entry: EventLogEntry) -> Result<()> {
        (**self).append(entry).await
    }

    async fn get(&self, lookup_key: &str) -> Result<Option<EventLogEntry>> {
        (**self).get(lookup_key).await
    }

    async fn query(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventLogEntry>> {
        (**self).query(start, end).await
    }

    async fn query_by_aggregate(&self, aggregate_key: &str) -> Result<Vec<EventLogEntry>> {
        (**self).query_by_aggregate(aggregate_key).await
    }
}

use super::entry::EventLogEntry;
use super::store::EventLogStore;
use crate::error::{DomainError, DomainResult as Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};

/// 基于内存的事件日志存储
#[derive(Debug, Default)]
pub struct InMemoryEventLogStore {
    entries: DashMap<String, (u64, EventLogEntry)>,
    sequence: AtomicU64,
}

impl InMemoryEventLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // 新的在前；时间相同时后写入的在前
    fn collect<F>(&self, filter: F) -> Vec<EventLogEntry>
    where
        F: Fn(&EventLogEntry) -> bool,
    {
        let mut matched: Vec<(u64, EventLogEntry)> = self
            .entries
            .iter()
            .filter(|kv| filter(&kv.value().1))
            .map(|kv| kv.value().clone())
            .collect();
        matched.sort_by(|(seq_a, a), (seq_b, b)| {
            b.date_created()
                .cmp(&a.date_created())
                .then_with(|| seq_b.cmp(seq_a))
        });
        matched.into_iter().map(|(_, entry)| entry).collect()
    }
}

#[async_trait]
impl EventLogStore for InMemoryEventLogStore {
    async fn append(&self, entry: EventLogEntry) -> Result<()> {
        match self.entries.entry(entry.lookup_key().to_string()) {
            Entry::Occupied(_) => Err(DomainError::event_log(format!(
                "duplicate lookup key {}",
                entry.lookup_key()
            ))),
            Entry::Vacant(slot) => {
                let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
                slot.insert((seq, entry));
                Ok(())
            }
        }
    }

    async fn get(&self, lookup_key: &str) -> Result<Option<EventLogEntry>> {
        Ok(self.entries.get(lookup_key).map(|kv| kv.value().1.clone()))
    }

    async fn query(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventLogEntry>> {
        Ok(self.collect(|e| {
            e.date_created() >= start && end.is_none_or(|end| e.date_created() <= end)
        }))
    }

    async fn query_by_aggregate(&self, aggregate_key: &str) -> Result<Vec<EventLogEntry>> {
        Ok(self.collect(|e| e.aggregate_key() == aggregate_key))
    }
}

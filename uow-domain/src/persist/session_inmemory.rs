//! 基于内存的持久化上下文
//!
//! `InMemoryStore` 保存每个聚合的 JSON 快照与版本号，可被多个会话共享；
//! `InMemorySession` 跟踪强类型聚合的变更，在事务中暂存写入，
//! 以版本号做乐观并发检查。
//!
use super::context::{IsolationLevel, PersistenceContext};
use crate::aggregate::{Aggregate, AggregateType, EventSource, PendingAggregate};
use crate::error::{DomainError, DomainResult as Result};
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type RecordKey = (AggregateType, String);

#[derive(Debug, Clone)]
struct StoredRecord {
    version: u64,
    state: Value,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 共享的内存存储
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Arc<Mutex<HashMap<RecordKey, StoredRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 基于该存储打开一个新会话
    pub fn session(&self) -> InMemorySession {
        InMemorySession::new(self.clone())
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 已提交的版本号（首次插入为 1）
    pub fn version<A: Aggregate>(&self, key: &str) -> Option<u64> {
        lock(&self.records)
            .get(&(AggregateType::of::<A>(), key.to_string()))
            .map(|r| r.version)
    }

    /// 读取已提交的聚合状态
    pub fn get<A: Aggregate>(&self, key: &str) -> Result<Option<A>> {
        let record = lock(&self.records)
            .get(&(AggregateType::of::<A>(), key.to_string()))
            .cloned();
        record
            .map(|r| serde_json::from_value(r.state).map_err(DomainError::from))
            .transpose()
    }

    fn fetch(&self, key: &RecordKey) -> Option<StoredRecord> {
        lock(&self.records).get(key).cloned()
    }
}

/// 会话内跟踪的聚合（类型擦除）
trait TrackedAggregate: Send + Sync {
    fn snapshot(&self) -> PendingAggregate;

    fn has_events(&self) -> bool;

    fn to_state(&self) -> Result<Value>;

    fn reload(&mut self, state: Value) -> Result<()>;

    fn clear_events(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Typed<A>(A);

impl<A: Aggregate> TrackedAggregate for Typed<A> {
    fn snapshot(&self) -> PendingAggregate {
        PendingAggregate::from_aggregate(&self.0)
    }

    fn has_events(&self) -> bool {
        !self.0.recorder().is_empty()
    }

    fn to_state(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.0)?)
    }

    fn reload(&mut self, state: Value) -> Result<()> {
        self.0 = serde_json::from_value(state)?;
        Ok(())
    }

    fn clear_events(&mut self) {
        self.0.recorder_mut().clear();
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Unchanged,
    Added,
    Modified,
    Deleted,
}

struct TrackedEntry {
    aggregate_type: AggregateType,
    key: String,
    state: EntryState,
    /// 加载或上次提交时的存储版本；新增的聚合为空
    loaded_version: Option<u64>,
    aggregate: Box<dyn TrackedAggregate>,
}

impl TrackedEntry {
    fn record_key(&self) -> RecordKey {
        (self.aggregate_type, self.key.clone())
    }

    fn matches(&self, aggregate_type: AggregateType, key: &str) -> bool {
        self.aggregate_type == aggregate_type && self.key == key
    }
}

#[derive(Debug, Clone)]
enum StagedWrite {
    Insert { key: RecordKey, state: Value },
    Update { key: RecordKey, expected: u64, state: Value },
    Delete { key: RecordKey, expected: u64 },
}

impl StagedWrite {
    fn key(&self) -> &RecordKey {
        match self {
            StagedWrite::Insert { key, .. }
            | StagedWrite::Update { key, .. }
            | StagedWrite::Delete { key, .. } => key,
        }
    }
}

#[derive(Debug)]
struct Transaction {
    isolation: IsolationLevel,
    staged: Vec<StagedWrite>,
}

/// 变更跟踪会话
pub struct InMemorySession {
    store: InMemoryStore,
    tracked: Mutex<Vec<TrackedEntry>>,
    transaction: Mutex<Option<Transaction>>,
}

impl InMemorySession {
    pub fn new(store: InMemoryStore) -> Self {
        Self {
            store,
            tracked: Mutex::new(Vec::new()),
            transaction: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// 跟踪一个新聚合；同一会话内重复的键返回 `DuplicateKey`
    pub fn add<A: Aggregate>(&self, aggregate: A) -> Result<()> {
        let aggregate_type = AggregateType::of::<A>();
        let key = aggregate.id().to_string();
        let mut tracked = lock(&self.tracked);
        if tracked.iter().any(|e| e.matches(aggregate_type, &key)) {
            return Err(DomainError::DuplicateKey {
                aggregate_key: key,
                aggregate_type: aggregate_type.name().to_string(),
            });
        }
        tracked.push(TrackedEntry {
            aggregate_type,
            key,
            state: EntryState::Added,
            loaded_version: None,
            aggregate: Box::new(Typed(aggregate)),
        });
        Ok(())
    }

    /// 从存储加载并跟踪聚合；已跟踪时直接返回 `true`，不存在返回 `false`
    pub fn load<A: Aggregate>(&self, key: &str) -> Result<bool> {
        let aggregate_type = AggregateType::of::<A>();
        if lock(&self.tracked).iter().any(|e| e.matches(aggregate_type, key)) {
            return Ok(true);
        }

        let Some(record) = self.store.fetch(&(aggregate_type, key.to_string())) else {
            return Ok(false);
        };
        let aggregate: A = serde_json::from_value(record.state)?;

        lock(&self.tracked).push(TrackedEntry {
            aggregate_type,
            key: key.to_string(),
            state: EntryState::Unchanged,
            loaded_version: Some(record.version),
            aggregate: Box::new(Typed(aggregate)),
        });
        Ok(true)
    }

    /// 只读访问已跟踪的聚合。闭包内不可再调用本会话
    pub fn read<A: Aggregate, R>(&self, key: &str, f: impl FnOnce(&A) -> R) -> Result<R> {
        let tracked = lock(&self.tracked);
        let entry = find(&tracked, AggregateType::of::<A>(), key)?;
        let aggregate = downcast_ref::<A>(entry)?;
        Ok(f(aggregate))
    }

    pub fn get<A: Aggregate + Clone>(&self, key: &str) -> Result<A> {
        self.read(key, |a: &A| a.clone())
    }

    /// 修改已跟踪的聚合并标记为已变更。闭包内不可再调用本会话
    pub fn update<A: Aggregate, R>(&self, key: &str, f: impl FnOnce(&mut A) -> R) -> Result<R> {
        let aggregate_type = AggregateType::of::<A>();
        let mut tracked = lock(&self.tracked);
        let entry = tracked
            .iter_mut()
            .find(|e| e.matches(aggregate_type, key) && e.state != EntryState::Deleted)
            .ok_or_else(|| not_found(aggregate_type, key))?;

        let found = entry.aggregate_type.name();
        let aggregate = entry
            .aggregate
            .as_any_mut()
            .downcast_mut::<A>()
            .ok_or_else(|| DomainError::TypeMismatch {
                expected: A::TYPE.to_string(),
                found: found.to_string(),
            })?;
        let out = f(aggregate);

        if entry.state == EntryState::Unchanged {
            entry.state = EntryState::Modified;
        }
        Ok(out)
    }

    /// 标记删除；尚未提交的新增聚合直接停止跟踪
    pub fn remove<A: Aggregate>(&self, key: &str) -> Result<()> {
        let aggregate_type = AggregateType::of::<A>();
        let mut tracked = lock(&self.tracked);
        let index = tracked
            .iter()
            .position(|e| e.matches(aggregate_type, key) && e.state != EntryState::Deleted)
            .ok_or_else(|| not_found(aggregate_type, key))?;

        if tracked[index].state == EntryState::Added {
            tracked.remove(index);
        } else {
            tracked[index].state = EntryState::Deleted;
        }
        Ok(())
    }

    pub fn is_tracked<A: Aggregate>(&self, key: &str) -> bool {
        let aggregate_type = AggregateType::of::<A>();
        lock(&self.tracked).iter().any(|e| e.matches(aggregate_type, key))
    }

    pub fn has_changes(&self) -> bool {
        lock(&self.tracked)
            .iter()
            .any(|e| e.state != EntryState::Unchanged)
    }

    pub fn in_transaction(&self) -> bool {
        lock(&self.transaction).is_some()
    }

    // 在存储锁内校验暂存写入是否仍然有效
    fn verify(records: &HashMap<RecordKey, StoredRecord>, write: &StagedWrite) -> Result<()> {
        let (aggregate_type, key) = write.key();
        match write {
            StagedWrite::Insert { .. } => {
                if records.contains_key(write.key()) {
                    return Err(DomainError::DuplicateKey {
                        aggregate_key: key.clone(),
                        aggregate_type: aggregate_type.name().to_string(),
                    });
                }
            }
            StagedWrite::Update { expected, .. } | StagedWrite::Delete { expected, .. } => {
                let actual = records.get(write.key()).map_or(0, |r| r.version);
                if actual != *expected {
                    return Err(DomainError::Concurrency {
                        aggregate_key: key.clone(),
                        aggregate_type: aggregate_type.name().to_string(),
                        expected: *expected,
                        actual,
                    });
                }
            }
        }
        Ok(())
    }
}

fn not_found(aggregate_type: AggregateType, key: &str) -> DomainError {
    DomainError::NotFound {
        reason: format!("aggregate {aggregate_type}#{key} is not tracked"),
    }
}

fn find<'a>(
    tracked: &'a [TrackedEntry],
    aggregate_type: AggregateType,
    key: &str,
) -> Result<&'a TrackedEntry> {
    tracked
        .iter()
        .find(|e| e.matches(aggregate_type, key))
        .ok_or_else(|| not_found(aggregate_type, key))
}

fn downcast_ref<A: Aggregate>(entry: &TrackedEntry) -> Result<&A> {
    entry
        .aggregate
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| DomainError::TypeMismatch {
            expected: A::TYPE.to_string(),
            found: entry.aggregate_type.name().to_string(),
        })
}

#[async_trait]
impl PersistenceContext for InMemorySession {
    async fn pending_aggregates(&self) -> Result<Vec<PendingAggregate>> {
        Ok(lock(&self.tracked)
            .iter()
            .filter(|e| e.state != EntryState::Unchanged || e.aggregate.has_events())
            .map(|e| e.aggregate.snapshot())
            .collect())
    }

    async fn begin_transaction(&self, isolation: IsolationLevel) -> Result<()> {
        let mut transaction = lock(&self.transaction);
        if transaction.is_some() {
            return Err(DomainError::transaction("a transaction is already open"));
        }
        tracing::debug!(%isolation, "transaction started");
        *transaction = Some(Transaction {
            isolation,
            staged: Vec::new(),
        });
        Ok(())
    }

    async fn flush(&self) -> Result<usize> {
        let mut transaction = lock(&self.transaction);
        let transaction = transaction
            .as_mut()
            .ok_or_else(|| DomainError::transaction("flush without an open transaction"))?;

        let tracked = lock(&self.tracked);
        let records = lock(&self.store.records);
        let mut staged = Vec::new();
        for entry in tracked.iter() {
            let key = entry.record_key();
            let write = match (entry.state, entry.loaded_version) {
                (EntryState::Unchanged, _) => continue,
                (EntryState::Added, _) => StagedWrite::Insert {
                    key,
                    state: entry.aggregate.to_state()?,
                },
                (EntryState::Modified, Some(expected)) => StagedWrite::Update {
                    key,
                    expected,
                    state: entry.aggregate.to_state()?,
                },
                (EntryState::Deleted, Some(expected)) => StagedWrite::Delete { key, expected },
                (_, None) => {
                    return Err(DomainError::Persistence {
                        reason: format!("aggregate {}#{} has no loaded version", entry.aggregate_type, entry.key),
                    });
                }
            };
            Self::verify(&records, &write)?;
            staged.push(write);
        }

        let rows = staged.len();
        tracing::debug!(rows, isolation = %transaction.isolation, "changes flushed");
        transaction.staged = staged;
        Ok(rows)
    }

    async fn commit(&self) -> Result<()> {
        let mut transaction = lock(&self.transaction);
        let staged = match transaction.as_ref() {
            Some(open) => open.staged.clone(),
            None => return Err(DomainError::transaction("commit without an open transaction")),
        };

        let mut records = lock(&self.store.records);
        for write in &staged {
            Self::verify(&records, write)?;
        }

        let mut committed = HashMap::new();
        for write in staged {
            match write {
                StagedWrite::Insert { key, state } => {
                    records.insert(key.clone(), StoredRecord { version: 1, state });
                    committed.insert(key, Some(1));
                }
                StagedWrite::Update { key, expected, state } => {
                    let version = expected + 1;
                    records.insert(key.clone(), StoredRecord { version, state });
                    committed.insert(key, Some(version));
                }
                StagedWrite::Delete { key, .. } => {
                    records.remove(&key);
                    committed.insert(key, None);
                }
            }
        }
        drop(records);
        *transaction = None;

        let mut tracked = lock(&self.tracked);
        tracked.retain_mut(|entry| match committed.get(&entry.record_key()) {
            Some(Some(version)) => {
                entry.state = EntryState::Unchanged;
                entry.loaded_version = Some(*version);
                true
            }
            Some(None) => false,
            None => true,
        });
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        if let Some(discarded) = lock(&self.transaction).take() {
            tracing::debug!(discarded = discarded.staged.len(), "transaction rolled back");
        }
        Ok(())
    }

    async fn refresh_all(&self) -> Result<()> {
        let mut tracked = lock(&self.tracked);
        let records = lock(&self.store.records);
        let mut failure = None;

        // 重新加载失败的聚合保持原状并继续跟踪，只返回第一个错误
        tracked.retain_mut(|entry| {
            if entry.state == EntryState::Added {
                return true;
            }
            // 存储中已不存在的聚合停止跟踪
            let Some(record) = records.get(&entry.record_key()) else {
                return false;
            };
            match entry.aggregate.reload(record.state.clone()) {
                Ok(()) => {
                    entry.loaded_version = Some(record.version);
                    entry.state = EntryState::Unchanged;
                }
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
            true
        });

        failure.map_or(Ok(()), Err)
    }

    async fn mark_published(&self, aggregates: &[PendingAggregate]) -> Result<()> {
        let mut tracked = lock(&self.tracked);
        for pending in aggregates {
            if let Some(entry) = tracked
                .iter_mut()
                .find(|e| e.matches(pending.aggregate_type(), pending.key()))
            {
                entry.aggregate.clear_events();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::EventRecorder;
    use crate::describe::{Describe, DetailValue};
    use crate::domain_event::DomainEvent;
    use crate::entity::Entity;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq)]
    struct Renamed;

    impl Describe for Renamed {
        fn describe(&self) -> DetailValue {
            DetailValue::object("Renamed", vec![])
        }
    }

    impl DomainEvent for Renamed {
        fn event_type(&self) -> &'static str {
            "Renamed"
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Account {
        id: String,
        name: String,
        #[serde(skip)]
        events: EventRecorder,
    }

    impl Entity for Account {
        type Id = String;

        fn new(id: Self::Id) -> Self {
            Self {
                id,
                ..Default::default()
            }
        }

        fn id(&self) -> &Self::Id {
            &self.id
        }
    }

    impl Aggregate for Account {
        const TYPE: &'static str = "account";

        fn recorder(&self) -> &EventRecorder {
            &self.events
        }

        fn recorder_mut(&mut self) -> &mut EventRecorder {
            &mut self.events
        }
    }

    // NaN 序列化为 null，之后无法再反序列化为 f64
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Gauge {
        id: String,
        reading: f64,
        #[serde(skip)]
        events: EventRecorder,
    }

    impl Entity for Gauge {
        type Id = String;

        fn new(id: Self::Id) -> Self {
            Self {
                id,
                ..Default::default()
            }
        }

        fn id(&self) -> &Self::Id {
            &self.id
        }
    }

    impl Aggregate for Gauge {
        const TYPE: &'static str = "gauge";

        fn recorder(&self) -> &EventRecorder {
            &self.events
        }

        fn recorder_mut(&mut self) -> &mut EventRecorder {
            &mut self.events
        }
    }

    fn account(id: &str, name: &str) -> Account {
        let mut a = Account::new(id.to_string());
        a.name = name.to_string();
        a
    }

    async fn save(session: &InMemorySession) -> Result<usize> {
        session.begin_transaction(IsolationLevel::default()).await?;
        let rows = match session.flush().await {
            Ok(rows) => rows,
            Err(err) => {
                session.rollback().await?;
                return Err(err);
            }
        };
        session.commit().await?;
        Ok(rows)
    }

    #[tokio::test]
    async fn add_flush_commit_writes_version_one() {
        let store = InMemoryStore::new();
        let session = store.session();
        session.add(account("a-1", "alice")).unwrap();

        assert_eq!(save(&session).await.unwrap(), 1);
        assert_eq!(store.version::<Account>("a-1"), Some(1));
        assert_eq!(store.get::<Account>("a-1").unwrap().unwrap().name, "alice");
        assert!(!session.has_changes());
        assert!(!session.in_transaction());

        // 再次保存没有变更
        assert_eq!(save(&session).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_keys_are_rejected_in_session_and_store() {
        let store = InMemoryStore::new();
        let first = store.session();
        first.add(account("a-1", "alice")).unwrap();
        let err = first.add(account("a-1", "again")).unwrap_err();
        assert!(matches!(err, DomainError::DuplicateKey { .. }));
        save(&first).await.unwrap();

        let second = store.session();
        second.add(account("a-1", "mallory")).unwrap();
        let err = save(&second).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::DuplicateKey { ref aggregate_key, .. } if aggregate_key == "a-1"
        ));
        assert_eq!(store.get::<Account>("a-1").unwrap().unwrap().name, "alice");
    }

    #[tokio::test]
    async fn stale_versions_are_reported_and_refresh_reloads() {
        let store = InMemoryStore::new();
        let seed = store.session();
        seed.add(account("a-1", "alice")).unwrap();
        save(&seed).await.unwrap();

        let mine = store.session();
        let theirs = store.session();
        assert!(mine.load::<Account>("a-1").unwrap());
        assert!(theirs.load::<Account>("a-1").unwrap());

        theirs.update("a-1", |a: &mut Account| a.name = "bob".into()).unwrap();
        save(&theirs).await.unwrap();
        assert_eq!(store.version::<Account>("a-1"), Some(2));

        mine.update("a-1", |a: &mut Account| {
            a.name = "carol".into();
            a.record_event(Renamed);
        })
        .unwrap();
        let err = save(&mine).await.unwrap_err();
        match err {
            DomainError::Concurrency { expected, actual, .. } => {
                assert_eq!((expected, actual), (1, 2));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!mine.in_transaction());

        mine.refresh_all().await.unwrap();
        assert_eq!(mine.get::<Account>("a-1").unwrap().name, "bob");
        assert!(!mine.has_changes());
        assert!(mine.pending_aggregates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes_and_is_idempotent() {
        let store = InMemoryStore::new();
        let session = store.session();
        session.rollback().await.unwrap();

        session.add(account("a-1", "alice")).unwrap();
        session.begin_transaction(IsolationLevel::Serializable).await.unwrap();
        assert_eq!(session.flush().await.unwrap(), 1);
        session.rollback().await.unwrap();
        session.rollback().await.unwrap();

        assert!(store.is_empty());
        assert!(session.has_changes());
        assert!(matches!(
            session.commit().await,
            Err(DomainError::Transaction { .. })
        ));
    }

    #[tokio::test]
    async fn pending_aggregates_and_mark_published() {
        let store = InMemoryStore::new();
        let session = store.session();
        let mut a = account("a-1", "alice");
        a.record_event(Renamed);
        session.add(a).unwrap();
        session.add(account("a-2", "bob")).unwrap();
        save(&session).await.unwrap();

        // 提交后仍有未发布事件的聚合保持待处理
        let pending = session.pending_aggregates().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key(), "a-1");
        assert_eq!(pending[0].unpublished_events().len(), 1);

        session.mark_published(&pending).await.unwrap();
        assert!(session.pending_aggregates().await.unwrap().is_empty());
        assert!(session.read("a-1", |a: &Account| a.recorder().is_empty()).unwrap());
    }

    #[tokio::test]
    async fn remove_deletes_committed_and_forgets_added() {
        let store = InMemoryStore::new();
        let session = store.session();
        session.add(account("a-1", "alice")).unwrap();
        save(&session).await.unwrap();

        session.add(account("a-2", "bob")).unwrap();
        session.remove::<Account>("a-2").unwrap();
        assert!(!session.is_tracked::<Account>("a-2"));

        session.remove::<Account>("a-1").unwrap();
        assert_eq!(save(&session).await.unwrap(), 1);
        assert!(store.is_empty());
        assert!(!session.is_tracked::<Account>("a-1"));
        assert!(matches!(
            session.update("a-1", |_: &mut Account| ()),
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failed_reload_keeps_every_aggregate_tracked() {
        let store = InMemoryStore::new();
        let seed = store.session();
        seed.add(account("a-1", "alice")).unwrap();
        let mut gauge = Gauge::new("g-1".to_string());
        gauge.reading = 1.5;
        seed.add(gauge).unwrap();
        save(&seed).await.unwrap();

        let mine = store.session();
        assert!(mine.load::<Account>("a-1").unwrap());
        assert!(mine.load::<Gauge>("g-1").unwrap());
        mine.update("a-1", |a: &mut Account| a.name = "local".into()).unwrap();

        let theirs = store.session();
        assert!(theirs.load::<Account>("a-1").unwrap());
        assert!(theirs.load::<Gauge>("g-1").unwrap());
        theirs.update("a-1", |a: &mut Account| a.name = "bob".into()).unwrap();
        theirs.update("g-1", |g: &mut Gauge| g.reading = f64::NAN).unwrap();
        save(&theirs).await.unwrap();

        let err = mine.refresh_all().await.unwrap_err();
        assert!(matches!(err, DomainError::Serde { .. }));

        // 其余聚合照常刷新，失败的聚合保留原有状态
        assert!(mine.is_tracked::<Account>("a-1"));
        assert!(mine.is_tracked::<Gauge>("g-1"));
        assert_eq!(mine.get::<Account>("a-1").unwrap().name, "bob");
        assert_eq!(mine.get::<Gauge>("g-1").unwrap().reading, 1.5);
    }
}

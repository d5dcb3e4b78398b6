//! 领域层统一错误定义
//!
//! 覆盖事件管道各阶段的故障：处理器执行、预提交不动点、并发冲突、
//! 提交后投递/日志，以及持久化、事件日志等基础设施错误，
//! 便于在调用方统一匹配 `DomainError`。
//!
use crate::domain_event::Phase;
use crate::event_queue::EventQueueItem;
use crate::unit_of_work::UnitOfWorkState;
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 事件分发 ---
    #[error(
        "event handler failed: handler={handler}, event={event_type}, aggregate={aggregate_type}#{aggregate_key}, phase={phase}, reason={reason}"
    )]
    HandlerFault {
        handler: String,
        event_type: String,
        aggregate_key: String,
        aggregate_type: String,
        phase: Phase,
        reason: String,
    },
    #[error("event queue is empty")]
    EmptyQueue,

    // --- 工作单元 ---
    #[error("pre-commit loop did not converge after {rounds} rounds, {pending} events still pending")]
    PreCommitLoop { rounds: usize, pending: usize },
    #[error(transparent)]
    PostCommit(Box<PostCommitFault>),
    #[error("unit of work cancelled during {state}")]
    Cancelled { state: UnitOfWorkState },
    #[error("concurrency conflict retries exhausted after {attempts} attempts: {last}")]
    ConflictRetriesExhausted {
        attempts: usize,
        last: Box<DomainError>,
    },

    // --- 持久化 ---
    #[error(
        "concurrency conflict: aggregate={aggregate_type}#{aggregate_key}, expected_version={expected}, actual_version={actual}"
    )]
    Concurrency {
        aggregate_key: String,
        aggregate_type: String,
        expected: u64,
        actual: u64,
    },
    #[error("duplicate key: aggregate={aggregate_type}#{aggregate_key}")]
    DuplicateKey {
        aggregate_key: String,
        aggregate_type: String,
    },
    #[error("transaction error: {reason}")]
    Transaction { reason: String },
    #[error("persistence error: {reason}")]
    Persistence { reason: String },
    #[error("not found: {reason}")]
    NotFound { reason: String },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },

    // --- 事件日志 ---
    #[error("event log error: {reason}")]
    EventLog { reason: String },

    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

impl DomainError {
    pub fn transaction(reason: impl Into<String>) -> Self {
        DomainError::Transaction {
            reason: reason.into(),
        }
    }

    pub fn event_log(reason: impl Into<String>) -> Self {
        DomainError::EventLog {
            reason: reason.into(),
        }
    }

    /// 是否为乐观并发冲突（调用方可据此决定重试整个工作单元）
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, DomainError::Concurrency { .. })
    }

    /// 业务数据是否已经落盘（仅提交后阶段的故障为真）
    pub fn is_committed(&self) -> bool {
        matches!(self, DomainError::PostCommit(_))
    }
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

/// 提交后处理所处的环节
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostCommitStage {
    Dispatch,
    Log,
}

/// 单条事件在提交后阶段的失败记录
#[derive(Debug)]
pub struct PostCommitFailure {
    pub item: EventQueueItem,
    pub stage: PostCommitStage,
    pub error: DomainError,
}

/// 提交成功后，通知或日志环节出现的故障。
///
/// 事务已经提交，不会回滚；这里保留已处理与失败的队列状态，
/// 投递语义为“至多一次，可能零次”。
#[derive(Debug, Error)]
#[error(
    "post-commit processing failed for {} event(s); {rows_affected} row(s) already committed",
    .failures.len()
)]
pub struct PostCommitFault {
    /// 已提交的行数
    pub rows_affected: usize,
    /// 分发与日志均成功的事件
    pub delivered: Vec<EventQueueItem>,
    /// 失败的事件（同一事件可能在分发与日志两处各失败一次）
    pub failures: Vec<PostCommitFailure>,
}

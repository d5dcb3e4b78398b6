use super::config::UnitOfWorkConfig;
use super::state::UnitOfWorkState;
use crate::aggregate::PendingAggregate;
use crate::domain_event::Phase;
use crate::error::{DomainError, DomainResult, PostCommitFailure, PostCommitFault, PostCommitStage};
use crate::event_log::{EventLogFlattener, EventLogStore};
use crate::event_queue::{EventQueue, EventQueueFactory, EventQueueItem};
use crate::eventing::EventDispatcher;
use crate::persist::PersistenceContext;
use bon::Builder;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 一次成功提交的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// 持久化上下文报告的受影响行数
    pub rows_affected: usize,
    /// 实际执行的预提交轮数
    pub pre_commit_rounds: usize,
    /// 预提交阶段分发的事件数
    pub pre_commit_dispatched: usize,
    /// 提交后阶段分发成功的事件数
    pub post_commit_dispatched: usize,
    /// 写入事件日志的条数
    pub logged: usize,
}

/// 工作单元：把聚合变更与其领域事件的处理编排为一次提交。
///
/// 1. 预提交：反复扫描待提交聚合、分发预提交事件，直到没有新事件；
/// 2. 提交：在事务内 flush 并提交，成功后清空聚合的未发布事件；
/// 3. 提交后：分发提交前收集的提交后事件，并逐条写入事件日志。
#[derive(Builder)]
pub struct UnitOfWork {
    persistence: Arc<dyn PersistenceContext>,
    dispatcher: EventDispatcher,
    event_log: Option<Arc<dyn EventLogStore>>,
    #[builder(default)]
    factory: EventQueueFactory,
    #[builder(default)]
    flattener: EventLogFlattener,
    #[builder(default)]
    config: UnitOfWorkConfig,
}

impl UnitOfWork {
    pub fn config(&self) -> &UnitOfWorkConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub async fn commit(&self) -> DomainResult<CommitReport> {
        self.commit_with_cancellation(&CancellationToken::new()).await
    }

    /// 取消只在预提交各轮之前与开启事务之前生效；事务一旦开启必定提交或回滚
    pub async fn commit_with_cancellation(
        &self,
        token: &CancellationToken,
    ) -> DomainResult<CommitReport> {
        let mut cycle = CommitCycle::default();
        let mut report = CommitReport::default();

        cycle.enter(UnitOfWorkState::PreCommitLoop);
        if let Err(err) = self.run_pre_commit(token, &mut report).await {
            cycle.enter(UnitOfWorkState::Failed);
            return Err(err);
        }

        cycle.enter(UnitOfWorkState::Committing);
        let post_queue = match self.run_commit(token, &mut report).await {
            Ok(queue) => queue,
            Err(err) => {
                cycle.enter(UnitOfWorkState::Failed);
                return Err(err);
            }
        };

        cycle.enter(UnitOfWorkState::PostCommit);
        let outcome = self.run_post_commit(post_queue, &mut report).await;
        cycle.enter(UnitOfWorkState::Idle);
        outcome.map(|()| report)
    }

    async fn run_pre_commit(
        &self,
        token: &CancellationToken,
        report: &mut CommitReport,
    ) -> DomainResult<()> {
        // 跨轮累积，仍留在聚合里的事件不会被重复分发
        let mut processed: Vec<EventQueueItem> = Vec::new();

        loop {
            if token.is_cancelled() {
                return Err(DomainError::Cancelled {
                    state: UnitOfWorkState::PreCommitLoop,
                });
            }

            let pending = self.persistence.pending_aggregates().await?;
            let queue = self
                .factory
                .create_queue(Phase::PreCommit, &pending)
                .remove(&processed);
            if queue.is_empty() {
                return Ok(());
            }
            if report.pre_commit_rounds >= self.config.max_pre_commit_rounds {
                warn!(
                    rounds = report.pre_commit_rounds,
                    pending = queue.len(),
                    "pre-commit loop did not converge"
                );
                return Err(DomainError::PreCommitLoop {
                    rounds: report.pre_commit_rounds,
                    pending: queue.len(),
                });
            }

            report.pre_commit_rounds += 1;
            debug!(round = report.pre_commit_rounds, events = queue.len(), "pre-commit round");

            for item in queue {
                self.dispatcher.dispatch_item(&item, Phase::PreCommit).await?;
                report.pre_commit_dispatched += 1;
                processed.push(item);
            }
        }
    }

    async fn run_commit(
        &self,
        token: &CancellationToken,
        report: &mut CommitReport,
    ) -> DomainResult<EventQueue> {
        // 预提交最后一轮读取待提交聚合期间，令牌可能被其他任务取消
        if token.is_cancelled() {
            return Err(DomainError::Cancelled {
                state: UnitOfWorkState::Committing,
            });
        }

        // 提交后队列取自提交前的快照
        let pending = self.persistence.pending_aggregates().await?;
        let post_queue = self.factory.create_queue(Phase::PostCommit, &pending);

        self.persistence
            .begin_transaction(self.config.isolation_level)
            .await?;
        let rows_affected = match self.flush_and_commit().await {
            Ok(rows) => rows,
            Err(err) => return Err(self.abort(err).await),
        };
        report.rows_affected = rows_affected;

        self.publish(&pending).await;
        info!(
            rows_affected,
            aggregates = pending.len(),
            post_commit_events = post_queue.len(),
            "unit of work committed"
        );
        Ok(post_queue)
    }

    async fn flush_and_commit(&self) -> DomainResult<usize> {
        let rows = self.persistence.flush().await?;
        self.persistence.commit().await?;
        Ok(rows)
    }

    async fn abort(&self, err: DomainError) -> DomainError {
        match self.persistence.rollback().await {
            Ok(()) => warn!(error = %err, "transaction rolled back"),
            Err(rollback_err) => {
                error!(error = %err, rollback_error = %rollback_err, "rollback failed")
            }
        }

        if err.is_concurrency_conflict() {
            warn!(error = %err, "concurrency conflict, refreshing tracked aggregates");
            if let Err(refresh_err) = self.persistence.refresh_all().await {
                error!(error = %refresh_err, "refresh after concurrency conflict failed");
            }
        }
        err
    }

    // 事务已提交：清理失败只记录，不影响本次结果
    async fn publish(&self, pending: &[PendingAggregate]) {
        if let Err(err) = self.persistence.mark_published(pending).await {
            warn!(error = %err, "failed to clear published events");
        }
    }

    async fn run_post_commit(
        &self,
        queue: EventQueue,
        report: &mut CommitReport,
    ) -> DomainResult<()> {
        let mut delivered = Vec::new();
        let mut failures = Vec::new();

        for item in queue {
            let mut ok = true;

            match self.dispatcher.dispatch_item(&item, Phase::PostCommit).await {
                Ok(_) => report.post_commit_dispatched += 1,
                Err(err) => {
                    warn!(
                        event_type = item.event_type(),
                        aggregate_key = item.aggregate_key(),
                        error = %err,
                        "post-commit dispatch failed"
                    );
                    failures.push(PostCommitFailure {
                        item: item.clone(),
                        stage: PostCommitStage::Dispatch,
                        error: err,
                    });
                    ok = false;
                }
            }

            // 分发失败的事件同样写入日志
            if let Some(store) = &self.event_log {
                let entry = self.flattener.build_entry(&item);
                match store.append(entry).await {
                    Ok(()) => report.logged += 1,
                    Err(err) => {
                        warn!(
                            event_type = item.event_type(),
                            aggregate_key = item.aggregate_key(),
                            error = %err,
                            "event log append failed"
                        );
                        failures.push(PostCommitFailure {
                            item: item.clone(),
                            stage: PostCommitStage::Log,
                            error: err,
                        });
                        ok = false;
                    }
                }
            }

            if ok {
                delivered.push(item);
            }
        }

        if failures.is_empty() {
            return Ok(());
        }
        Err(DomainError::PostCommit(Box::new(PostCommitFault {
            rows_affected: report.rows_affected,
            delivered,
            failures,
        })))
    }
}

/// 单次提交的阶段跟踪
#[derive(Debug, Default)]
struct CommitCycle {
    state: UnitOfWorkState,
}

impl CommitCycle {
    fn enter(&mut self, next: UnitOfWorkState) {
        debug_assert!(
            self.state.can_enter(next),
            "invalid unit of work transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "unit of work state changed");
        self.state = next;
    }
}

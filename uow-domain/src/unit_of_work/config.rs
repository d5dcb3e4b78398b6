use crate::persist::IsolationLevel;
use bon::Builder;
use std::time::Duration;

/// 工作单元配置
#[derive(Debug, Clone, Builder)]
pub struct UnitOfWorkConfig {
    /// 预提交不动点迭代的最大轮数，超出即失败
    #[builder(default = 16)]
    pub max_pre_commit_rounds: usize,
    /// 提交事务的隔离级别
    #[builder(default)]
    pub isolation_level: IsolationLevel,
}

impl Default for UnitOfWorkConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// 并发冲突时重跑整个工作单元的策略
#[derive(Debug, Clone, Builder)]
pub struct RetryPolicy {
    /// 最多尝试次数（含首次）
    #[builder(default = 3)]
    pub max_attempts: usize,
    /// 两次尝试之间的固定等待
    #[builder(default = Duration::from_millis(50))]
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

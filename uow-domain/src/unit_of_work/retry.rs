use super::config::RetryPolicy;
use crate::error::{DomainError, DomainResult};
use std::future::Future;
use tracing::warn;

/// 在调用方层面按策略重跑工作单元：仅并发冲突会触发重试。
///
/// `op` 接收从 1 开始的尝试序号，每次都应重新加载聚合并重新执行业务操作。
/// 次数用尽时返回 `ConflictRetriesExhausted`，其中保留最后一次冲突。
pub async fn retry_on_conflict<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> DomainResult<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Err(err) if err.is_concurrency_conflict() => {
                if attempt >= max_attempts {
                    return Err(DomainError::ConflictRetriesExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                warn!(attempt, max_attempts, error = %err, "concurrency conflict, retrying unit of work");
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn conflict() -> DomainError {
        DomainError::Concurrency {
            aggregate_key: "o-1".into(),
            aggregate_type: "order".into(),
            expected: 1,
            actual: 2,
        }
    }

    fn policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let mut seen = Vec::new();
        let out = retry_on_conflict(&policy(3), |attempt| {
            seen.push(attempt);
            async move {
                if attempt < 3 {
                    Err(conflict())
                } else {
                    Ok(attempt * 10)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(out, 30);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let err = retry_on_conflict(&policy(2), |_| {
            calls += 1;
            async { Err::<(), _>(conflict()) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls, 2);
        match err {
            DomainError::ConflictRetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(last.is_concurrency_conflict());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let mut calls = 0;
        let err = retry_on_conflict(&policy(5), |_| {
            calls += 1;
            async { Err::<(), _>(DomainError::transaction("down")) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls, 1);
        assert!(matches!(err, DomainError::Transaction { .. }));
    }
}

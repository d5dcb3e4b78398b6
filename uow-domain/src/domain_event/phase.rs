use serde::{Deserialize, Serialize};
use std::fmt;

/// 事件管道的执行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// 事务提交前（如校验），可继续修改聚合
    PreCommit,
    /// 事务提交成功后（如通知、审计日志）
    PostCommit,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::PreCommit => f.write_str("pre-commit"),
            Phase::PostCommit => f.write_str("post-commit"),
        }
    }
}

/// 事件或处理器声明的阶段标记。
///
/// - 仅带 `pre_commit`：只属于预提交阶段；
/// - 不带 `pre_commit`：属于提交后阶段（默认）；
/// - 同时带两者：两个阶段都属于。
///
/// 处理器使用同一规则，但只按处理器自身的标记过滤，与事件的标记无关。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhaseMarkers {
    pre_commit: bool,
    post_commit: bool,
}

impl PhaseMarkers {
    pub const POST_COMMIT: Self = Self::new(false, false);
    pub const PRE_COMMIT: Self = Self::new(true, false);
    pub const BOTH: Self = Self::new(true, true);

    pub const fn new(pre_commit: bool, post_commit: bool) -> Self {
        Self {
            pre_commit,
            post_commit,
        }
    }

    pub const fn is_pre_commit(&self) -> bool {
        self.pre_commit
    }

    pub const fn is_post_commit(&self) -> bool {
        !self.pre_commit || self.post_commit
    }

    pub const fn includes(&self, phase: Phase) -> bool {
        match phase {
            Phase::PreCommit => self.is_pre_commit(),
            Phase::PostCommit => self.is_post_commit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmarked_is_post_commit_only() {
        let m = PhaseMarkers::default();
        assert_eq!(m, PhaseMarkers::POST_COMMIT);
        assert!(!m.is_pre_commit());
        assert!(m.is_post_commit());
    }

    #[test]
    fn only_both_markers_overlap() {
        for pre in [false, true] {
            for post in [false, true] {
                let m = PhaseMarkers::new(pre, post);
                let overlap = m.is_pre_commit() && m.is_post_commit();
                assert_eq!(overlap, pre && post, "pre={pre}, post={post}");
                // 至少属于一个阶段
                assert!(m.is_pre_commit() || m.is_post_commit());
            }
        }
    }

    #[test]
    fn post_commit_marker_alone_changes_nothing() {
        let m = PhaseMarkers::new(false, true);
        assert!(m.includes(Phase::PostCommit));
        assert!(!m.includes(Phase::PreCommit));
        assert!(PhaseMarkers::BOTH.includes(Phase::PreCommit));
        assert!(PhaseMarkers::BOTH.includes(Phase::PostCommit));
        assert!(!PhaseMarkers::PRE_COMMIT.includes(Phase::PostCommit));
    }
}

use std::fmt;

/// 一次提交所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitOfWorkState {
    #[default]
    Idle,
    PreCommitLoop,
    Committing,
    PostCommit,
    Failed,
}

impl UnitOfWorkState {
    /// 是否允许从当前阶段进入 `next`
    pub fn can_enter(self, next: UnitOfWorkState) -> bool {
        use UnitOfWorkState::*;
        matches!(
            (self, next),
            (Idle, PreCommitLoop)
                | (PreCommitLoop, Committing)
                | (PreCommitLoop, Failed)
                | (Committing, PostCommit)
                | (Committing, Failed)
                | (PostCommit, Idle)
                | (Failed, Idle)
        )
    }
}

impl fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitOfWorkState::Idle => "idle",
            UnitOfWorkState::PreCommitLoop => "pre-commit loop",
            UnitOfWorkState::Committing => "committing",
            UnitOfWorkState::PostCommit => "post-commit",
            UnitOfWorkState::Failed => "failed",
        };
        f.write_str(name)
    }
}

use thiserror::Error;

/// 引擎内所有可预期的失败。审核拦截不是错误，见 [`crate::ModerationDecision`]。
#[derive(Debug, Error)]
pub enum Error {
    /// 网络或超时，总是可以在下一轮重试
    #[error("transport error: {0}")]
    Transport(String),
    /// 队列/缓存里的坏条目，跳过即可
    #[error("invalid entry: {0}")]
    Validation(String),
    /// 写盘失败，本轮在此中止
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("text generation failed: {0}")]
    Generation(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("config error: {0}")]
    Config(String),
    /// 任务 panic 或被取消
    #[error("job aborted: {0}")]
    Aborted(String),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Generation(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

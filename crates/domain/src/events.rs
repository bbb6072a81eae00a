use crate::commands::JobKind;
use crate::models::PostSource;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    ReplySent {
        comment_id: String,
        post_id: Option<String>,
    },
    ReplyHeld {
        comment_id: String,
        reply: String,
    },
    PostPublished {
        post_id: u64,
        title: String,
        source: PostSource,
    },
    JobFailed {
        job: JobKind,
        error: String,
    },
}

use crate::models::Post;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Reply,
    Publish,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Reply => write!(f, "reply"),
            JobKind::Publish => write!(f, "publish"),
        }
    }
}

/// 宿主转发进来的指令（`/blog publish` 已由宿主解析完毕）
#[derive(Debug)]
pub enum AppCommand {
    PublishPost {
        title: String,
        content: String,
        requester: Option<String>,
    },
    RunJob(JobKind),
}

#[derive(Debug)]
pub enum CommandOutcome {
    Published(Post),
    JobFinished(JobKind),
    // 同类任务仍在运行
    JobSkipped(JobKind),
}

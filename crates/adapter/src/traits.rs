use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{prompt::Persona, Comment, ModerationPolicy, Post, Result};
use serde::Deserialize;

/// 评论来源：拉取待回复评论、提交回复
#[async_trait]
pub trait CommentSource: Send + Sync {
    async fn fetch_pending(&self, since: DateTime<Utc>) -> Result<Vec<Comment>>;
    async fn submit_reply(&self, comment: &Comment, reply: &str) -> Result<()>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// 宿主侧的只读配置。每次调用都重新读取，调用方不得跨轮缓存
#[async_trait]
pub trait PolicyProvider: Send + Sync {
    async fn switches(&self) -> Result<Switches>;
    async fn moderation(&self) -> Result<ModerationPolicy>;
    async fn persona(&self) -> Result<Persona>;
}

/// 把本地发布的文章同步到远端博客，返回远端 id
#[async_trait]
pub trait RemotePublisher: Send + Sync {
    async fn publish(&self, post: &Post) -> Result<Option<String>>;
}

/// 运行时开关，在下一次 tick 生效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Switches {
    pub plugin_enabled: bool,
    pub monitor_enabled: bool,
    pub reply_enabled: bool,
    pub schedule_enabled: bool,
}

impl Default for Switches {
    fn default() -> Self {
        Self {
            plugin_enabled: true,
            monitor_enabled: true,
            reply_enabled: true,
            schedule_enabled: false,
        }
    }
}

impl Switches {
    pub fn reply_job_enabled(&self) -> bool {
        self.plugin_enabled && self.monitor_enabled
    }

    pub fn publish_job_enabled(&self) -> bool {
        self.plugin_enabled && self.schedule_enabled
    }
}

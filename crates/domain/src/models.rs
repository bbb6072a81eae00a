use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::protocol::{lenient_timestamp, opt_string_or_number, string_or_number};

/// 评论 API 返回的待回复评论，只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "content", default)]
    pub body: String,
    #[serde(rename = "visitor_name", default)]
    pub author: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub post_id: Option<String>,
    #[serde(default)]
    pub post_title: String,
    #[serde(default)]
    pub post_summary: String,
}

/// 定时发布队列里的一条。`publish_at` 缺失或无法解析时视为立即到期
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub publish_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSource {
    Command,
    Schedule,
}

impl fmt::Display for PostSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostSource::Command => write!(f, "command"),
            PostSource::Schedule => write!(f, "schedule"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub author: String,
    #[serde(alias = "created_at")]
    pub published_at: DateTime<FixedOffset>,
    pub source: PostSource,
}

/// 写入 post store 之前的文章，id 与时间由 store 分配
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author: String,
    pub source: PostSource,
}

/// 人工审核模式下生成但未发送的回复
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldReply {
    pub comment: Comment,
    pub reply: String,
    pub held_at: DateTime<Utc>,
}

//! 黑白名单 / 违禁词 / 人工审核。纯函数，同样的输入永远得到同样的结论。

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationPolicy {
    #[serde(alias = "blocked_visitor_names")]
    pub blacklist: Vec<String>,
    pub whitelist: Vec<String>,
    pub forbidden_words: Vec<String>,
    #[serde(alias = "enable_review")]
    pub manual_review: bool,
    /// 非空时只处理这些文章下的评论
    pub allowed_post_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationRule {
    Blacklisted(String),
    NotWhitelisted(String),
    ForbiddenWord(String),
}

impl fmt::Display for ModerationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModerationRule::Blacklisted(a) => write!(f, "author '{}' is blacklisted", a),
            ModerationRule::NotWhitelisted(a) => write!(f, "author '{}' is not whitelisted", a),
            ModerationRule::ForbiddenWord(w) => write!(f, "contains forbidden word '{}'", w),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationDecision {
    Allow,
    Block(ModerationRule),
    NeedsReview,
}

impl ModerationDecision {
    pub fn is_block(&self) -> bool {
        matches!(self, ModerationDecision::Block(_))
    }
}

/// 按优先级匹配，命中即返回：黑名单 > 白名单 > 违禁词 > 人工审核 > 放行
pub fn evaluate(text: &str, author: &str, policy: &ModerationPolicy) -> ModerationDecision {
    let author = author.trim();

    if policy.blacklist.iter().any(|b| b.trim() == author) {
        return ModerationDecision::Block(ModerationRule::Blacklisted(author.to_string()));
    }

    if !policy.whitelist.is_empty() && !policy.whitelist.iter().any(|w| w.trim() == author) {
        return ModerationDecision::Block(ModerationRule::NotWhitelisted(author.to_string()));
    }

    let lowered = text.to_lowercase();
    if let Some(word) = policy
        .forbidden_words
        .iter()
        .map(|w| w.trim())
        .find(|w| !w.is_empty() && lowered.contains(&w.to_lowercase()))
    {
        return ModerationDecision::Block(ModerationRule::ForbiddenWord(word.to_string()));
    }

    if policy.manual_review {
        return ModerationDecision::NeedsReview;
    }

    ModerationDecision::Allow
}

pub fn post_allowed(post_id: Option<&str>, policy: &ModerationPolicy) -> bool {
    if policy.allowed_post_ids.is_empty() {
        return true;
    }
    match post_id {
        Some(id) => policy.allowed_post_ids.iter().any(|p| p.trim() == id),
        None => false,
    }
}

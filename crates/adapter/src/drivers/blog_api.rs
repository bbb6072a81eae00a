use crate::common::http::{build_client, normalize_base_url, transport_error, with_retry};
use crate::traits::{CommentSource, RemotePublisher};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::protocol::{ApiEnvelope, RemotePostPayload, RemotePostRecord, ReplyPayload};
use domain::{Comment, Error, Post, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "X-API-KEY";
const ADMIN_PASSWORD_HEADER: &str = "X-ADMIN-PASSWORD";

#[derive(Debug, Clone)]
pub struct BlogApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub admin_password: Option<String>,
    pub timeout: Duration,
    pub retry_times: u32,
    pub retry_delay: Duration,
    /// 回复评论时使用的作者名
    pub reply_author: String,
}

/// 博客评论 API 客户端，同时负责把文章镜像到远端
pub struct BlogApiClient {
    http: reqwest::Client,
    config: BlogApiConfig,
    base_url: String,
}

impl BlogApiClient {
    pub fn new(config: BlogApiConfig) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url);
        if base_url.is_empty() {
            return Err(Error::Config("blog_api.base_url is not configured".into()));
        }
        Ok(Self {
            http: build_client(config.timeout)?,
            config,
            base_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => req.header(API_KEY_HEADER, key),
            None => req,
        }
    }

    /// 发请求并解出信封。HTTP 层失败最多尝试 `attempts` 次，`code != 0` 不重试
    async fn call<T, F>(&self, what: &str, attempts: u32, build: F) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let build = &build;
        let envelope: ApiEnvelope<T> = with_retry(
            what,
            attempts,
            self.config.retry_delay,
            move || async move {
                let resp = build()
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| transport_error(what, e))?;
                resp.json::<ApiEnvelope<T>>()
                    .await
                    .map_err(|e| transport_error(what, e))
            },
        )
        .await?;

        envelope.into_result()
    }
}

#[async_trait]
impl CommentSource for BlogApiClient {
    async fn fetch_pending(&self, since: DateTime<Utc>) -> Result<Vec<Comment>> {
        let url = self.url("/api/v1/comments/pending");
        let since = since.timestamp();

        let data: Option<Vec<Value>> = self
            .call("fetch pending comments", self.config.retry_times, || {
                self.with_key(self.http.get(&url).query(&[("since", since)]))
            })
            .await?;

        let comments: Vec<Comment> = data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Comment>(raw) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!("Skipping malformed comment from api: {}", e);
                    None
                }
            })
            .collect();

        debug!("Fetched {} pending comment(s) since {}", comments.len(), since);
        Ok(comments)
    }

    async fn submit_reply(&self, comment: &Comment, reply: &str) -> Result<()> {
        let url = self.url("/api/v1/comments");
        let payload = ReplyPayload {
            post_id: comment.post_id.clone(),
            parent_id: comment.id.clone(),
            author: self.config.reply_author.clone(),
            content: reply.to_string(),
        };

        // 只发一次：超时的请求可能已经落库，重发会产生重复回复
        let _: Option<Value> = self
            .call("submit reply", 1, || {
                self.with_key(self.http.post(&url).json(&payload))
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RemotePublisher for BlogApiClient {
    async fn publish(&self, post: &Post) -> Result<Option<String>> {
        let url = self.url("/api/v1/posts");
        let payload = RemotePostPayload {
            title: post.title.clone(),
            content: post.content.clone(),
        };

        let mut req = self.http.post(&url).json(&payload);
        if let Some(pw) = self.config.admin_password.as_deref().filter(|p| !p.is_empty()) {
            req = req.header(ADMIN_PASSWORD_HEADER, pw);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| transport_error("remote publish", e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "remote publish rejected: HTTP {} {}",
                status, body
            )));
        }

        let envelope: ApiEnvelope<RemotePostRecord> = resp
            .json()
            .await
            .map_err(|e| transport_error("remote publish", e))?;
        let remote_id = envelope.into_result()?.and_then(|r| r.id);
        info!("Mirrored post '{}' to remote blog (id={:?})", post.title, remote_id);
        Ok(remote_id)
    }
}

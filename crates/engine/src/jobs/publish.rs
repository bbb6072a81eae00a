use adapter::RemotePublisher;
use chrono::{DateTime, Utc};
use domain::queue::plan_run;
use domain::{EngineEvent, Error, NewPost, Post, PostSource, Result, Zone};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use storage::Store;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// 往 post store 追加文章的唯一入口，命令和定时任务共用
pub struct Publisher {
    store: Store,
    zone: Zone,
    remote: Option<Arc<dyn RemotePublisher>>,
    events: broadcast::Sender<EngineEvent>,
}

impl Publisher {
    pub fn new(store: Store, zone: Zone, events: broadcast::Sender<EngineEvent>) -> Self {
        Self {
            store,
            zone,
            remote: None,
            events,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemotePublisher>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub async fn publish(
        &self,
        title: &str,
        content: &str,
        author: &str,
        source: PostSource,
    ) -> Result<Post> {
        self.publish_at(title, content, author, source, Utc::now())
            .await
    }

    pub async fn publish_at(
        &self,
        title: &str,
        content: &str,
        author: &str,
        source: PostSource,
        at: DateTime<Utc>,
    ) -> Result<Post> {
        let title = title.trim();
        let content = content.trim();
        if title.is_empty() || content.is_empty() {
            return Err(Error::Validation("title and content must not be empty".into()));
        }

        let post = self
            .store
            .append_post(
                NewPost {
                    title: title.to_string(),
                    content: content.to_string(),
                    author: author.to_string(),
                    source,
                },
                self.zone.to_local(at),
            )
            .await?;
        info!("Published post #{} '{}' ({})", post.id, post.title, source);

        // 远端只是镜像，失败不影响本地记录
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.publish(&post).await {
                warn!("Failed to mirror post #{} to remote blog: {}", post.id, e);
            }
        }

        let _ = self.events.send(EngineEvent::PostPublished {
            post_id: post.id,
            title: post.title.clone(),
            source,
        });
        Ok(post)
    }
}

#[derive(Debug, Default)]
pub struct PublishReport {
    pub published: Vec<Post>,
    pub deferred: usize,
    pub not_yet_due: usize,
    pub malformed: usize,
}

pub struct QueueProcessor {
    store: Store,
    publisher: Arc<Publisher>,
    zone: Zone,
    max_per_run: usize,
    default_author: String,
}

impl QueueProcessor {
    pub fn new(
        store: Store,
        publisher: Arc<Publisher>,
        zone: Zone,
        max_per_run: usize,
        default_author: impl Into<String>,
    ) -> Self {
        Self {
            store,
            publisher,
            zone,
            max_per_run,
            default_author: default_author.into(),
        }
    }

    /// 发布到期条目，最多 `max_per_run` 条。
    /// 每篇追加成功后立刻重写队列，中途崩溃最坏是重复发布，不会丢条目
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<PublishReport> {
        let items = self.store.load_queue().await?;
        let plan = plan_run(&items, now, self.zone, self.max_per_run);

        for (idx, e) in &plan.malformed {
            warn!("Keeping malformed queue entry #{} untouched: {}", idx, e);
        }

        let mut report = PublishReport {
            published: Vec::new(),
            deferred: plan.deferred,
            not_yet_due: plan.not_yet_due,
            malformed: plan.malformed.len(),
        };
        if plan.selected.is_empty() {
            info!(
                "No due entries in publish queue ({} waiting)",
                report.not_yet_due
            );
            return Ok(report);
        }

        let mut pending: BTreeMap<usize, Value> = items.into_iter().enumerate().collect();
        for (idx, entry) in plan.selected {
            let author = entry
                .author
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .unwrap_or(&self.default_author);

            let post = self
                .publisher
                .publish_at(&entry.title, &entry.content, author, PostSource::Schedule, now)
                .await?;

            pending.remove(&idx);
            self.store
                .save_queue(pending.values().cloned().collect())
                .await?;
            report.published.push(post);
        }

        info!(
            "Publish run done: {} published, {} rolled over, {} not yet due",
            report.published.len(),
            report.deferred,
            report.not_yet_due
        );
        Ok(report)
    }
}

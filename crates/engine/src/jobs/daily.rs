//! 每天固定时间点执行的任务：发布队列、按主题生成文章。

use super::publish::{PublishReport, QueueProcessor, Publisher};
use adapter::{PolicyProvider, TextGenerator};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use domain::prompt::{parse_generated_post, target_length, topic_prompt};
use domain::{Error, Post, PostSource, Result, Zone};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use storage::Store;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[default]
    Queue,
    Topic,
    #[serde(other)]
    Unsupported,
}

impl TaskKind {
    fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Queue => "queue",
            TaskKind::Topic => "topic",
            TaskKind::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskSpec {
    /// 本地时间 `HH:MM`
    pub time: String,
    #[serde(rename = "type", default)]
    pub kind: TaskKind,
    #[serde(default)]
    pub topic: Option<String>,
}

impl TaskSpec {
    /// sha256(`type-time-topic`)，配置不变 id 就不变
    pub fn id(&self) -> String {
        let raw = format!(
            "{}-{}-{}",
            self.kind.as_str(),
            self.time.trim(),
            self.topic.as_deref().unwrap_or("")
        );
        hex::encode(Sha256::digest(raw.as_bytes()))
    }

    pub fn at(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(self.time.trim(), "%H:%M").ok()
    }

    /// 本地时间已过 `time` 且今天还没成功跑过
    pub fn is_due(&self, local_now: DateTime<FixedOffset>, last_run: Option<NaiveDate>) -> bool {
        let Some(at) = self.at() else {
            return false;
        };
        local_now.time() >= at && last_run != Some(local_now.date_naive())
    }
}

/// 用文本生成服务按主题写一篇文章并发布
pub struct TopicWriter {
    generator: Arc<dyn TextGenerator>,
    policy: Arc<dyn PolicyProvider>,
    publisher: Arc<Publisher>,
    zone: Zone,
    base_length: u32,
    timeout: Duration,
    author: String,
}

impl TopicWriter {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        policy: Arc<dyn PolicyProvider>,
        publisher: Arc<Publisher>,
        zone: Zone,
        base_length: u32,
        timeout: Duration,
        author: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            policy,
            publisher,
            zone,
            base_length,
            timeout,
            author: author.into(),
        }
    }

    pub async fn write(&self, topic: &str, now: DateTime<Utc>) -> Result<Post> {
        let persona = self.policy.persona().await?;
        let local = self.zone.to_local(now).format("%Y-%m-%d %H:%M").to_string();
        let prompt = {
            let mut rng = rand::thread_rng();
            let length = target_length(self.base_length, &mut rng);
            topic_prompt(
                topic,
                length,
                persona.active_personality(&mut rng),
                &persona.reply_style,
                &local,
            )
        };

        let text = tokio::time::timeout(self.timeout, self.generator.generate(&prompt))
            .await
            .map_err(|_| Error::Transport("topic generation timed out".into()))??;
        let post = parse_generated_post(&text, topic)
            .ok_or_else(|| Error::Generation(format!("empty post for topic '{}'", topic)))?;

        self.publisher
            .publish_at(&post.title, &post.body, &self.author, PostSource::Schedule, now)
            .await
    }
}

#[derive(Debug, Default)]
pub struct DailyReport {
    pub ran: Vec<String>,
    pub published: usize,
    pub failed: Vec<(String, Error)>,
}

pub struct DailyTasks {
    store: Store,
    tasks: Vec<TaskSpec>,
    zone: Zone,
    queue: Arc<QueueProcessor>,
    topics: Option<TopicWriter>,
}

impl DailyTasks {
    pub fn new(
        store: Store,
        tasks: Vec<TaskSpec>,
        zone: Zone,
        queue: Arc<QueueProcessor>,
        topics: Option<TopicWriter>,
    ) -> Self {
        for t in &tasks {
            if t.at().is_none() {
                warn!("Daily task has invalid time '{}', it will never run", t.time);
            }
        }
        Self {
            store,
            tasks,
            zone,
            queue,
            topics,
        }
    }

    pub fn queue(&self) -> &Arc<QueueProcessor> {
        &self.queue
    }

    /// 跑一遍所有到点的任务。成功后才记录日期，失败的下个 tick 重试
    pub async fn run_due_at(&self, now: DateTime<Utc>) -> Result<DailyReport> {
        let status: BTreeMap<String, NaiveDate> = self.store.load_task_status().await?;
        let local = self.zone.to_local(now);
        let today = local.date_naive();
        let mut report = DailyReport::default();

        for task in &self.tasks {
            let id = task.id();
            if !task.is_due(local, status.get(&id).copied()) {
                continue;
            }

            info!("Running daily {} task at {}", task.kind.as_str(), task.time);
            match self.run_task(task, now).await {
                Ok(published) => {
                    self.store.mark_task_run(&id, today).await?;
                    report.published += published;
                    report.ran.push(id);
                }
                Err(e) => {
                    error!("Daily {} task at {} failed: {}", task.kind.as_str(), task.time, e);
                    report.failed.push((id, e));
                }
            }
        }
        Ok(report)
    }

    async fn run_task(&self, task: &TaskSpec, now: DateTime<Utc>) -> Result<usize> {
        match task.kind {
            TaskKind::Queue => {
                let PublishReport { published, .. } = self.queue.run_at(now).await?;
                Ok(published.len())
            }
            TaskKind::Topic => {
                let topic = task
                    .topic
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| Error::Config("topic task without a topic".into()))?;
                let writer = self
                    .topics
                    .as_ref()
                    .ok_or_else(|| Error::Config("no text generator for topic tasks".into()))?;
                writer.write(topic, now).await.map(|_| 1)
            }
            TaskKind::Unsupported => {
                // 记一次日期，免得每个 tick 都刷一遍日志
                warn!("Skipping unsupported daily task type at {}", task.time);
                Ok(0)
            }
        }
    }
}

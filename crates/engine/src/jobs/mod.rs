pub mod daily;
pub mod publish;
pub mod reply;

use crate::scheduler::Job;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use daily::DailyTasks;
use domain::{JobKind, Result};
use reply::ReplyPipeline;

#[async_trait]
impl Job for ReplyPipeline {
    fn kind(&self) -> JobKind {
        JobKind::Reply
    }

    async fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        self.run_at(now).await.map(|_| ())
    }
}

#[async_trait]
impl Job for DailyTasks {
    fn kind(&self) -> JobKind {
        JobKind::Publish
    }

    async fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        let report = self.run_due_at(now).await?;
        // 有失败就交给调度器记一次失败，日期没记所以下个 tick 会重试
        match report.failed.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(()),
        }
    }

    /// 手动触发直接清一遍队列，不看时间点
    async fn run_now(&self, now: DateTime<Utc>) -> Result<()> {
        self.queue().run_at(now).await.map(|_| ())
    }
}

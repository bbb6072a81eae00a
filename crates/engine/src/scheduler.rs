use adapter::{PolicyProvider, Switches};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{EngineEvent, Error, JobKind, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 连续失败这么多次后额外冷却一段时间
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;
pub const FAILURE_COOLDOWN: Duration = Duration::from_secs(30);

#[async_trait]
pub trait Job: Send + Sync {
    fn kind(&self) -> JobKind;

    /// 定时触发
    async fn tick(&self, now: DateTime<Utc>) -> Result<()>;

    /// 宿主手动触发，默认与定时触发相同
    async fn run_now(&self, now: DateTime<Utc>) -> Result<()> {
        self.tick(now).await
    }
}

/// 同一种任务同时只允许一个在跑
#[derive(Clone, Default)]
pub struct JobSlot {
    busy: Arc<AtomicBool>,
}

pub struct SlotGuard {
    busy: Arc<AtomicBool>,
}

impl JobSlot {
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Finished,
    Skipped,
    Failed(Error),
}

/// 任务 + 它的互斥槽。定时循环和命令通道共用同一个 runner
#[derive(Clone)]
pub struct JobRunner {
    job: Arc<dyn Job>,
    slot: JobSlot,
    events: broadcast::Sender<EngineEvent>,
}

impl JobRunner {
    pub fn new(job: Arc<dyn Job>, events: broadcast::Sender<EngineEvent>) -> Self {
        Self {
            job,
            slot: JobSlot::default(),
            events,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.job.kind()
    }

    pub fn slot(&self) -> &JobSlot {
        &self.slot
    }

    /// 槽被占用时直接跳过。任务在独立 task 里执行，panic 也只算一次失败
    pub async fn run_exclusive(&self, now: DateTime<Utc>, forced: bool) -> RunOutcome {
        let kind = self.job.kind();
        let Some(_guard) = self.slot.try_acquire() else {
            info!("Previous {} job still running, skipping this tick", kind);
            return RunOutcome::Skipped;
        };

        let job = self.job.clone();
        let handle = tokio::spawn(async move {
            if forced {
                job.run_now(now).await
            } else {
                job.tick(now).await
            }
        });

        let err = match handle.await {
            Ok(Ok(())) => return RunOutcome::Finished,
            Ok(Err(e)) => e,
            Err(join_err) => Error::Aborted(join_err.to_string()),
        };

        error!("{} job failed: {}", kind, err);
        let _ = self.events.send(EngineEvent::JobFailed {
            job: kind,
            error: err.to_string(),
        });
        RunOutcome::Failed(err)
    }
}

struct Entry {
    runner: JobRunner,
    every: Duration,
    enabled: fn(&Switches) -> bool,
    cooldown: Option<Duration>,
}

pub struct Scheduler {
    entries: Vec<Entry>,
    policy: Arc<dyn PolicyProvider>,
}

impl Scheduler {
    pub fn new(policy: Arc<dyn PolicyProvider>) -> Self {
        Self {
            entries: Vec::new(),
            policy,
        }
    }

    /// `enabled` 每个 tick 用最新的开关重新判断；`cooldown` 为连续失败后的额外等待
    pub fn add(
        mut self,
        runner: JobRunner,
        every: Duration,
        enabled: fn(&Switches) -> bool,
        cooldown: Option<Duration>,
    ) -> Self {
        self.entries.push(Entry {
            runner,
            every,
            enabled,
            cooldown,
        });
        self
    }

    /// 每个任务一个独立循环，互不阻塞
    pub fn spawn(self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        self.entries
            .into_iter()
            .map(|entry| {
                let policy = self.policy.clone();
                let cancel = cancel.clone();
                tokio::spawn(drive(entry, policy, cancel))
            })
            .collect()
    }
}

async fn drive(entry: Entry, policy: Arc<dyn PolicyProvider>, cancel: CancellationToken) {
    let kind = entry.runner.kind();
    let mut ticker = tokio::time::interval(entry.every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut failures = 0u32;
    info!("Scheduling {} job every {:?}", kind, entry.every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let switches = match policy.switches().await {
            Ok(s) => s,
            Err(e) => {
                warn!("Cannot read switches for {} job: {}", kind, e);
                continue;
            }
        };
        if !(entry.enabled)(&switches) {
            debug!("{} job disabled, skipping tick", kind);
            continue;
        }

        match entry.runner.run_exclusive(Utc::now(), false).await {
            RunOutcome::Finished => failures = 0,
            RunOutcome::Skipped => {}
            RunOutcome::Failed(_) => {
                failures += 1;
                let Some(cooldown) = entry.cooldown else {
                    continue;
                };
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    warn!(
                        "{} job failed {} times in a row, cooling down for {:?}",
                        kind, failures, cooldown
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(cooldown) => {}
                    }
                    failures = 0;
                }
            }
        }
    }
    info!("{} job loop stopped", kind);
}

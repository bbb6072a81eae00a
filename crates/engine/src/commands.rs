use crate::jobs::publish::Publisher;
use crate::scheduler::{JobRunner, RunOutcome};
use chrono::Utc;
use domain::{AppCommand, CommandOutcome, Error, JobKind, PostSource, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

// --- 信封模式：宿主发指令，等 oneshot 回执 ---
pub struct CommandEnvelope {
    pub cmd: AppCommand,
    pub resp: oneshot::Sender<Result<CommandOutcome>>,
}

pub struct CommandWorker {
    publisher: Arc<Publisher>,
    runners: HashMap<JobKind, JobRunner>,
    admins: Vec<String>,
    author: String,
}

impl CommandWorker {
    pub fn new(publisher: Arc<Publisher>, admins: Vec<String>, author: impl Into<String>) -> Self {
        Self {
            publisher,
            runners: HashMap::new(),
            admins,
            author: author.into(),
        }
    }

    pub fn with_runner(mut self, runner: JobRunner) -> Self {
        self.runners.insert(runner.kind(), runner);
        self
    }

    pub async fn run(self, mut rx: mpsc::Receiver<CommandEnvelope>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                envelope = rx.recv() => {
                    let Some(CommandEnvelope { cmd, resp }) = envelope else {
                        break;
                    };

                    let result = self.execute(cmd).await;
                    if let Err(e) = &result {
                        error!("Command execution failed: {}", e);
                    }
                    let _ = resp.send(result);
                }
            }
        }
        info!("Command worker stopped");
    }

    pub async fn execute(&self, cmd: AppCommand) -> Result<CommandOutcome> {
        match cmd {
            AppCommand::PublishPost {
                title,
                content,
                requester,
            } => {
                self.check_admin(requester.as_deref())?;
                let post = self
                    .publisher
                    .publish(&title, &content, &self.author, PostSource::Command)
                    .await?;
                Ok(CommandOutcome::Published(post))
            }
            AppCommand::RunJob(kind) => {
                let runner = self
                    .runners
                    .get(&kind)
                    .ok_or_else(|| Error::Config(format!("{} job is not configured", kind)))?;
                match runner.run_exclusive(Utc::now(), true).await {
                    RunOutcome::Finished => Ok(CommandOutcome::JobFinished(kind)),
                    RunOutcome::Skipped => Ok(CommandOutcome::JobSkipped(kind)),
                    RunOutcome::Failed(e) => Err(e),
                }
            }
        }
    }

    /// 没配置管理员时所有人都可以发布
    fn check_admin(&self, requester: Option<&str>) -> Result<()> {
        if self.admins.is_empty() {
            return Ok(());
        }
        match requester.map(str::trim) {
            Some(r) if self.admins.iter().any(|a| a.trim() == r) => Ok(()),
            other => Err(Error::PermissionDenied(format!(
                "{} is not an admin",
                other.unwrap_or("anonymous")
            ))),
        }
    }
}

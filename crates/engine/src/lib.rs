pub mod commands;
pub mod config;
pub mod jobs;
pub mod scheduler;

pub use commands::{CommandEnvelope, CommandWorker};
pub use config::Settings;
pub use jobs::daily::{DailyReport, DailyTasks, TaskKind, TaskSpec, TopicWriter};
pub use jobs::publish::{PublishReport, Publisher, QueueProcessor};
pub use jobs::reply::{ReplyOptions, ReplyPipeline, ReplyReport};
pub use scheduler::{Job, JobRunner, JobSlot, RunOutcome, Scheduler, SlotGuard};

mod clock;
mod commands;
mod dedup;
mod error;
mod events;
mod models;
pub mod moderation;
pub mod protocol;
pub mod prompt;
pub mod queue;

pub use clock::Zone;
pub use commands::{AppCommand, CommandOutcome, JobKind};
pub use dedup::{DedupCache, DedupEntry, ReplyState};
pub use error::{Error, Result};
pub use events::EngineEvent;
pub use models::{Comment, HeldReply, NewPost, Post, PostSource, QueueEntry};
pub use moderation::{ModerationDecision, ModerationPolicy, ModerationRule};

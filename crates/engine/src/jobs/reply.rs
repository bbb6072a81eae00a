use adapter::{CommentSource, PolicyProvider, Switches, TextGenerator};
use chrono::{DateTime, Utc};
use domain::moderation::{evaluate, post_allowed};
use domain::prompt::{build_reply_prompt, DEFAULT_REPLY_TEMPLATE};
use domain::{
    Comment, DedupCache, EngineEvent, Error, HeldReply, ModerationDecision, ModerationPolicy,
    ModerationRule, ReplyState, Result,
};
use std::sync::Arc;
use std::time::Duration;
use storage::Store;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ReplyOptions {
    pub prompt_template: String,
    pub max_summary_length: usize,
    pub generation_timeout: Duration,
    pub dedup_ttl_secs: i64,
    pub dedup_capacity: usize,
    pub initial_since: Option<DateTime<Utc>>,
}

impl Default for ReplyOptions {
    fn default() -> Self {
        Self {
            prompt_template: DEFAULT_REPLY_TEMPLATE.to_string(),
            max_summary_length: 500,
            generation_timeout: Duration::from_secs(30),
            dedup_ttl_secs: 86_400,
            dedup_capacity: 200,
            initial_since: None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplyReport {
    pub fetched: usize,
    pub replied: usize,
    pub held: usize,
    pub already_answered: usize,
    pub input_blocked: usize,
    pub output_blocked: usize,
    /// `reply.enabled = false` 时只标记不回复
    pub marked_only: usize,
    pub failed: usize,
    pub checkpoint: Option<DateTime<Utc>>,
}

enum Outcome {
    AlreadyAnswered,
    InputBlocked(String),
    MarkedOnly,
    OutputBlocked(ModerationRule),
    Held,
    Sent,
    Failed(Error),
}

/// 拉取评论 -> 过滤去重 -> 生成 -> 输出审核 -> 提交 -> 记录，最后推进检查点
pub struct ReplyPipeline {
    store: Store,
    source: Arc<dyn CommentSource>,
    generator: Arc<dyn TextGenerator>,
    policy: Arc<dyn PolicyProvider>,
    events: broadcast::Sender<EngineEvent>,
    options: ReplyOptions,
}

/// 一轮之内的可变状态
struct RunState {
    checkpoint: Option<DateTime<Utc>>,
    cache: DedupCache,
}

impl RunState {
    fn snapshot(&self) -> ReplyState {
        ReplyState {
            last_checkpoint: self.checkpoint,
            answered: self.cache.entries().clone(),
        }
    }
}

impl ReplyPipeline {
    pub fn new(
        store: Store,
        source: Arc<dyn CommentSource>,
        generator: Arc<dyn TextGenerator>,
        policy: Arc<dyn PolicyProvider>,
        events: broadcast::Sender<EngineEvent>,
        options: ReplyOptions,
    ) -> Self {
        Self {
            store,
            source,
            generator,
            policy,
            events,
            options,
        }
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<ReplyReport> {
        let switches = self.policy.switches().await?;
        let moderation = self.policy.moderation().await?;

        let stored = self.store.load_reply_state().await?;
        let mut run = RunState {
            checkpoint: stored.last_checkpoint,
            cache: DedupCache::from_entries(
                stored.answered,
                self.options.dedup_ttl_secs,
                self.options.dedup_capacity,
            ),
        };

        let fetch_time = now;
        let since = run
            .checkpoint
            .or(self.options.initial_since)
            .unwrap_or(fetch_time);

        // 拉取失败直接中止，检查点不动
        let comments = self.source.fetch_pending(since).await?;
        let mut report = ReplyReport {
            fetched: comments.len(),
            ..ReplyReport::default()
        };
        debug!("Fetched {} comment(s) since {}", comments.len(), since);

        for comment in &comments {
            let outcome = self
                .handle(comment, &switches, &moderation, &mut run, now)
                .await?;
            match outcome {
                Outcome::AlreadyAnswered => report.already_answered += 1,
                Outcome::InputBlocked(reason) => {
                    info!("Skipping comment {}: {}", comment.id, reason);
                    report.input_blocked += 1;
                }
                Outcome::MarkedOnly => report.marked_only += 1,
                Outcome::OutputBlocked(rule) => {
                    info!("Dropped reply to comment {}: {}", comment.id, rule);
                    report.output_blocked += 1;
                }
                Outcome::Held => report.held += 1,
                Outcome::Sent => report.replied += 1,
                Outcome::Failed(e) => {
                    warn!("Reply to comment {} failed, will retry: {}", comment.id, e);
                    report.failed += 1;
                }
            }
        }

        if run.cache.over_capacity() {
            warn!(
                "Dedup cache holds {} live entries, above the configured capacity {}",
                run.cache.len(),
                self.options.dedup_capacity
            );
        }

        // 推进到拉取时刻而不是当前时刻，期间新到的评论下一轮还能拉到
        if !comments.is_empty() || run.checkpoint.is_none() {
            run.checkpoint = Some(fetch_time);
            self.store.save_reply_state(&run.snapshot()).await?;
        }
        report.checkpoint = run.checkpoint;

        if report.fetched > 0 {
            info!(
                "Reply run done: {} fetched, {} replied, {} held, {} failed",
                report.fetched, report.replied, report.held, report.failed
            );
        }
        Ok(report)
    }

    async fn handle(
        &self,
        comment: &Comment,
        switches: &Switches,
        moderation: &ModerationPolicy,
        run: &mut RunState,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        if run.cache.has_answered(&comment.id, now) {
            return Ok(Outcome::AlreadyAnswered);
        }

        if !post_allowed(comment.post_id.as_deref(), moderation) {
            return Ok(Outcome::InputBlocked(format!(
                "post {:?} is not in the allow-list",
                comment.post_id
            )));
        }

        if let ModerationDecision::Block(rule) = evaluate(&comment.body, &comment.author, moderation)
        {
            return Ok(Outcome::InputBlocked(rule.to_string()));
        }

        if !switches.reply_enabled {
            self.mark(run, &comment.id, now).await?;
            return Ok(Outcome::MarkedOnly);
        }

        let reply = match self.generate(comment).await {
            Ok(r) => r,
            Err(e) => return Ok(Outcome::Failed(e)),
        };

        match evaluate(&reply, &comment.author, moderation) {
            ModerationDecision::Block(rule) => {
                // 不可发送的回复也记为已回复，避免每轮重复生成
                self.mark(run, &comment.id, now).await?;
                Ok(Outcome::OutputBlocked(rule))
            }
            ModerationDecision::NeedsReview => {
                self.store
                    .hold_reply(HeldReply {
                        comment: comment.clone(),
                        reply: reply.clone(),
                        held_at: now,
                    })
                    .await?;
                self.mark(run, &comment.id, now).await?;
                let _ = self.events.send(EngineEvent::ReplyHeld {
                    comment_id: comment.id.clone(),
                    reply,
                });
                info!("Reply to comment {} held for review", comment.id);
                Ok(Outcome::Held)
            }
            ModerationDecision::Allow => {
                if let Err(e) = self.source.submit_reply(comment, &reply).await {
                    return Ok(Outcome::Failed(e));
                }
                self.mark(run, &comment.id, now).await?;
                let _ = self.events.send(EngineEvent::ReplySent {
                    comment_id: comment.id.clone(),
                    post_id: comment.post_id.clone(),
                });
                info!("Replied to comment {}", comment.id);
                Ok(Outcome::Sent)
            }
        }
    }

    async fn generate(&self, comment: &Comment) -> Result<String> {
        // 人格每次生成都重新读
        let persona = self.policy.persona().await?;
        let template = if self.options.prompt_template.trim().is_empty() {
            DEFAULT_REPLY_TEMPLATE
        } else {
            self.options.prompt_template.as_str()
        };
        let prompt = {
            let mut rng = rand::thread_rng();
            build_reply_prompt(
                &persona.render(&mut rng),
                template,
                comment,
                self.options.max_summary_length,
            )
        };

        let reply = tokio::time::timeout(
            self.options.generation_timeout,
            self.generator.generate(&prompt),
        )
        .await
        .map_err(|_| Error::Transport("reply generation timed out".into()))??;

        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return Err(Error::Generation("empty reply".into()));
        }
        Ok(reply)
    }

    /// 每条记录完立即落盘，崩溃后不会重复回复已成功的评论
    async fn mark(&self, run: &mut RunState, comment_id: &str, now: DateTime<Utc>) -> Result<()> {
        run.cache.mark_answered(comment_id, now);
        self.store.save_reply_state(&run.snapshot()).await
    }
}

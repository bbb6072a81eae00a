use std::sync::Arc;
use std::time::Duration;

use adapter::{
    BlogApiClient, ChatCompletionsGenerator, ConfigPolicyProvider, PolicyProvider, Switches,
    TextGenerator,
};
use anyhow::Context;
use dotenvy::dotenv;
use engine::scheduler::FAILURE_COOLDOWN;
use engine::{
    DailyTasks, JobRunner, Publisher, QueueProcessor, ReplyOptions, ReplyPipeline,
    Scheduler, Settings, TopicWriter,
};
use domain::EngineEvent;
use storage::{Store, StorePaths};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new().context("Failed to load configuration")?;
    let zone = settings.zone().context("Invalid schedule.timezone")?;

    let store = Store::new(StorePaths::in_dir(&settings.storage.data_dir))
        .context("Failed to prepare state directory")?;
    let policy: Arc<dyn PolicyProvider> = Arc::new(ConfigPolicyProvider::new(Settings::layers()));
    let generator: Arc<dyn TextGenerator> = Arc::new(
        ChatCompletionsGenerator::new(settings.llm_config()).context("Invalid llm settings")?,
    );

    let blog_api = match BlogApiClient::new(settings.blog_api_config()) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("Comment monitor disabled: {}", e);
            None
        }
    };

    let (tx_events, mut rx_events) = broadcast::channel::<EngineEvent>(100);

    let mut publisher = Publisher::new(store.clone(), zone, tx_events.clone());
    if settings.blog_api.mirror_posts {
        match &blog_api {
            Some(client) => publisher = publisher.with_remote(client.clone()),
            None => warn!("blog_api.mirror_posts is on but blog_api.base_url is empty"),
        }
    }
    let publisher = Arc::new(publisher);

    let queue = Arc::new(QueueProcessor::new(
        store.clone(),
        publisher.clone(),
        zone,
        settings.schedule.max_posts_per_run,
        settings.schedule.default_author.clone(),
    ));
    let topics = TopicWriter::new(
        generator.clone(),
        policy.clone(),
        publisher.clone(),
        zone,
        settings.generation.target_length,
        Duration::from_secs(settings.llm.timeout_secs),
        settings.schedule.default_author.clone(),
    );
    let daily = DailyTasks::new(
        store.clone(),
        settings.daily_tasks(),
        zone,
        queue,
        Some(topics),
    );
    let publish_runner = JobRunner::new(Arc::new(daily), tx_events.clone());

    let mut scheduler = Scheduler::new(policy.clone()).add(
        publish_runner,
        Duration::from_secs(settings.schedule.tick_secs.max(1)),
        Switches::publish_job_enabled,
        None,
    );

    if let Some(client) = blog_api {
        let pipeline = ReplyPipeline::new(
            store.clone(),
            client,
            generator,
            policy.clone(),
            tx_events.clone(),
            ReplyOptions {
                prompt_template: settings.reply.prompt_template.clone(),
                max_summary_length: settings.reply.max_summary_length,
                generation_timeout: Duration::from_secs(settings.reply.reply_timeout_secs),
                dedup_ttl_secs: settings.dedup.ttl_secs,
                dedup_capacity: settings.dedup.capacity,
                initial_since: settings.initial_since(),
            },
        );
        let reply_runner = JobRunner::new(Arc::new(pipeline), tx_events.clone());
        scheduler = scheduler.add(
            reply_runner,
            settings.check_interval(),
            Switches::reply_job_enabled,
            Some(FAILURE_COOLDOWN),
        );
    }

    tokio::spawn(async move {
        loop {
            match rx_events.recv().await {
                Ok(EngineEvent::ReplyHeld { comment_id, reply }) => {
                    info!("Reply to {} awaits review: {}", comment_id, reply)
                }
                Ok(event) => tracing::debug!("Engine event: {:?}", event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event listener lagged by {} events", n)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let cancel = CancellationToken::new();
    let job_handles = scheduler.spawn(cancel.clone());
    info!("blogbot started");

    shutdown_signal().await;
    cancel.cancel();

    for handle in job_handles {
        let _ = handle.await;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

use crate::jobs::daily::{TaskKind, TaskSpec};
use adapter::{BlogApiConfig, ConfigLayers, LlmConfig};
use chrono::{DateTime, TimeZone, Utc};
use config::ConfigError;
use domain::Zone;
use serde::Deserialize;
use std::time::Duration;

pub const CONFIG_BASE_NAME: &str = "blogbot";
pub const ENV_PREFIX: &str = "BLOGBOT";

const MIN_CHECK_INTERVAL_SECS: u64 = 5;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub storage: StorageSettings,
    pub blog_api: BlogApiSettings,
    pub llm: LlmSettings,
    pub monitor: MonitorSettings,
    pub reply: ReplySettings,
    pub dedup: DedupSettings,
    pub schedule: ScheduleSettings,
    pub generation: GenerationSettings,
    pub admin: AdminSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StorageSettings {
    pub data_dir: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BlogApiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub admin_password: Option<String>,
    pub timeout_secs: u64,
    pub retry_times: u32,
    pub retry_delay_secs: u64,
    // 本地发布后同步到远端博客
    pub mirror_posts: bool,
}

#[derive(Deserialize, Clone, Debug)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct MonitorSettings {
    pub check_interval_secs: u64,
    /// unix 秒，没有存档检查点时作为第一次拉取的起点
    pub initial_since: Option<i64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ReplySettings {
    pub prompt_template: String,
    pub max_summary_length: usize,
    pub reply_timeout_secs: u64,
    pub author_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DedupSettings {
    pub ttl_secs: i64,
    pub capacity: usize,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ScheduleSettings {
    pub timezone: String,
    // 旧配置：没有 tasks 时等价于这个时间点的一条 queue 任务
    pub schedule_time: String,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    pub max_posts_per_run: usize,
    pub tick_secs: u64,
    pub default_author: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct GenerationSettings {
    pub target_length: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AdminSettings {
    #[serde(default)]
    pub admins: Vec<String>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_layers(&Self::layers())
    }

    pub fn layers() -> ConfigLayers {
        ConfigLayers::new(CONFIG_BASE_NAME, ENV_PREFIX)
    }

    pub fn from_layers(layers: &ConfigLayers) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .set_default("storage.data_dir", "data")?
            .set_default("blog_api.base_url", "")?
            .set_default("blog_api.timeout_secs", 30)?
            .set_default("blog_api.retry_times", 3)?
            .set_default("blog_api.retry_delay_secs", 2)?
            .set_default("blog_api.mirror_posts", false)?
            .set_default("llm.base_url", "https://api.openai.com")?
            .set_default("llm.model", "gpt-4o-mini")?
            .set_default("llm.timeout_secs", 60)?
            .set_default("monitor.check_interval_secs", 60)?
            .set_default("reply.prompt_template", domain::prompt::DEFAULT_REPLY_TEMPLATE)?
            .set_default("reply.max_summary_length", 500)?
            .set_default("reply.reply_timeout_secs", 30)?
            .set_default("reply.author_name", "bot")?
            .set_default("dedup.ttl_secs", 86_400)?
            .set_default("dedup.capacity", 200)?
            .set_default("schedule.timezone", "+08:00")?
            .set_default("schedule.schedule_time", "23:30")?
            .set_default("schedule.max_posts_per_run", 1)?
            .set_default("schedule.tick_secs", 30)?
            .set_default("schedule.default_author", "bot")?
            .set_default("generation.target_length", 300)?
            .set_default("admin.admins", Vec::<String>::new())?;

        layers.apply(builder).build()?.try_deserialize()
    }

    pub fn zone(&self) -> Result<Zone, domain::Error> {
        self.schedule.timezone.parse().map_err(domain::Error::Config)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.check_interval_secs.max(MIN_CHECK_INTERVAL_SECS))
    }

    pub fn initial_since(&self) -> Option<DateTime<Utc>> {
        self.monitor
            .initial_since
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// 没配 `schedule.tasks` 时退回到 `schedule_time` 的单条 queue 任务
    pub fn daily_tasks(&self) -> Vec<TaskSpec> {
        if !self.schedule.tasks.is_empty() {
            return self.schedule.tasks.clone();
        }
        vec![TaskSpec {
            time: self.schedule.schedule_time.clone(),
            kind: TaskKind::Queue,
            topic: None,
        }]
    }

    pub fn blog_api_config(&self) -> BlogApiConfig {
        BlogApiConfig {
            base_url: self.blog_api.base_url.clone(),
            api_key: self.blog_api.api_key.clone(),
            admin_password: self.blog_api.admin_password.clone(),
            timeout: Duration::from_secs(self.blog_api.timeout_secs),
            retry_times: self.blog_api.retry_times,
            retry_delay: Duration::from_secs(self.blog_api.retry_delay_secs),
            reply_author: self.reply.author_name.clone(),
        }
    }

    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            base_url: self.llm.base_url.clone(),
            api_key: self.llm.api_key.clone(),
            model: self.llm.model.clone(),
            temperature: self.llm.temperature,
            timeout: Duration::from_secs(self.llm.timeout_secs),
        }
    }
}

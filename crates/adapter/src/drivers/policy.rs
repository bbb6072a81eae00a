use crate::traits::{PolicyProvider, Switches};
use async_trait::async_trait;
use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use domain::{prompt::Persona, Error, ModerationPolicy, Result};
use serde::de::DeserializeOwned;
use std::sync::{PoisonError, RwLock};

/// 配置来源的叠加顺序：`{base}` 文件 -> `{base}.{RUN_MODE}` 文件 -> `{PREFIX}_SECTION__KEY` 环境变量
#[derive(Debug, Clone)]
pub struct ConfigLayers {
    pub base_name: String,
    pub run_mode: String,
    pub env_prefix: String,
}

impl ConfigLayers {
    pub fn new(base_name: impl Into<String>, env_prefix: impl Into<String>) -> Self {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());
        Self {
            base_name: base_name.into(),
            run_mode,
            env_prefix: env_prefix.into(),
        }
    }

    pub fn apply(&self, builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
        builder
            .add_source(File::with_name(&self.base_name).required(false))
            .add_source(
                File::with_name(&format!("{}.{}", self.base_name, self.run_mode)).required(false),
            )
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
    }

    pub fn load(&self) -> Result<Config> {
        self.apply(Config::builder())
            .build()
            .map_err(|e| Error::Config(e.to_string()))
    }
}

fn get_or<T: DeserializeOwned>(cfg: &Config, key: &str, default: T) -> Result<T> {
    match cfg.get::<T>(key) {
        Ok(v) => Ok(v),
        Err(ConfigError::NotFound(_)) => Ok(default),
        Err(e) => Err(Error::Config(format!("{}: {}", key, e))),
    }
}

/// 每次调用都重新读一遍配置文件和环境变量，改配置不用重启
pub struct ConfigPolicyProvider {
    layers: ConfigLayers,
}

impl ConfigPolicyProvider {
    pub fn new(layers: ConfigLayers) -> Self {
        Self { layers }
    }

    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Config) -> Result<T> + Send + 'static,
    {
        let layers = self.layers.clone();
        tokio::task::spawn_blocking(move || {
            let cfg = layers.load()?;
            f(&cfg)
        })
        .await
        .map_err(|e| Error::Config(format!("config reader failed: {}", e)))?
    }
}

#[async_trait]
impl PolicyProvider for ConfigPolicyProvider {
    async fn switches(&self) -> Result<Switches> {
        self.read(|cfg| {
            let d = Switches::default();
            Ok(Switches {
                plugin_enabled: get_or(cfg, "plugin.enabled", d.plugin_enabled)?,
                monitor_enabled: get_or(cfg, "monitor.enabled", d.monitor_enabled)?,
                reply_enabled: get_or(cfg, "reply.enabled", d.reply_enabled)?,
                schedule_enabled: get_or(cfg, "schedule.enabled", d.schedule_enabled)?,
            })
        })
        .await
    }

    async fn moderation(&self) -> Result<ModerationPolicy> {
        self.read(|cfg| get_or(cfg, "security", ModerationPolicy::default()))
            .await
    }

    async fn persona(&self) -> Result<Persona> {
        self.read(|cfg| get_or(cfg, "persona", Persona::default()))
            .await
    }
}

/// 由宿主直接推送配置值的实现
#[derive(Default)]
pub struct StaticPolicyProvider {
    inner: RwLock<(Switches, ModerationPolicy, Persona)>,
}

impl StaticPolicyProvider {
    pub fn new(switches: Switches, moderation: ModerationPolicy, persona: Persona) -> Self {
        Self {
            inner: RwLock::new((switches, moderation, persona)),
        }
    }

    pub fn set_switches(&self, switches: Switches) {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).0 = switches;
    }

    pub fn set_moderation(&self, moderation: ModerationPolicy) {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).1 = moderation;
    }

    pub fn set_persona(&self, persona: Persona) {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).2 = persona;
    }
}

#[async_trait]
impl PolicyProvider for StaticPolicyProvider {
    async fn switches(&self) -> Result<Switches> {
        Ok(self.inner.read().unwrap_or_else(PoisonError::into_inner).0)
    }

    async fn moderation(&self) -> Result<ModerationPolicy> {
        Ok(self.inner.read().unwrap_or_else(PoisonError::into_inner).1.clone())
    }

    async fn persona(&self) -> Result<Persona> {
        Ok(self.inner.read().unwrap_or_else(PoisonError::into_inner).2.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layers_for(dir: &std::path::Path) -> ConfigLayers {
        ConfigLayers {
            base_name: dir.join("blogbot").to_string_lossy().into_owned(),
            run_mode: "test".into(),
            env_prefix: "BLOGBOT_POLICY_TEST_UNUSED".into(),
        }
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ConfigPolicyProvider::new(layers_for(dir.path()));

        assert_eq!(provider.switches().await.unwrap(), Switches::default());
        assert_eq!(provider.moderation().await.unwrap(), ModerationPolicy::default());
        assert_eq!(provider.persona().await.unwrap(), Persona::default());
    }

    #[tokio::test]
    async fn edits_are_visible_on_next_call() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("blogbot.toml");
        std::fs::write(
            &file,
            r#"
[monitor]
enabled = true
check_interval_secs = 60

[security]
blocked_visitor_names = ["troll"]
forbidden_words = ["spam"]

[persona]
personality = "a cheerful cat"
"#,
        )
        .unwrap();
        let provider = ConfigPolicyProvider::new(layers_for(dir.path()));

        let policy = provider.moderation().await.unwrap();
        assert_eq!(policy.blacklist, vec!["troll".to_string()]);
        assert_eq!(policy.forbidden_words, vec!["spam".to_string()]);
        assert_eq!(provider.persona().await.unwrap().personality, "a cheerful cat");
        assert!(provider.switches().await.unwrap().reply_job_enabled());

        std::fs::write(&file, "[monitor]\nenabled = false\n[security]\nenable_review = true\n").unwrap();

        assert!(!provider.switches().await.unwrap().reply_job_enabled());
        assert!(provider.moderation().await.unwrap().manual_review);
    }

    #[tokio::test]
    async fn static_provider_updates() {
        let provider = StaticPolicyProvider::default();
        assert!(!provider.switches().await.unwrap().publish_job_enabled());

        provider.set_switches(Switches {
            schedule_enabled: true,
            ..Switches::default()
        });
        assert!(provider.switches().await.unwrap().publish_job_enabled());
    }
}

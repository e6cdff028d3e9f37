/// Terminal host configuration
use serde::{Deserialize, Serialize};
use soul_session::SessionConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub session: SessionConfig,

    /// Where the session is saved between runs
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,

    /// JSON catalog; the built-in demo catalog is used when unset
    #[serde(default)]
    pub catalog: Option<PathBuf>,

    /// Simulated engine load latency
    #[serde(default = "default_load_latency_ms")]
    pub load_latency_ms: u64,
}

fn default_session_file() -> PathBuf {
    PathBuf::from("soul-session.json")
}

fn default_load_latency_ms() -> u64 {
    150
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            session_file: default_session_file(),
            catalog: None,
            load_latency_ms: default_load_latency_ms(),
        }
    }
}

impl CliConfig {
    /// Load configuration from file and environment
    ///
    /// `file` defaults to `soul-session.toml` in the working directory and is
    /// skipped when missing. Environment variables prefixed `SOUL_SESSION`
    /// override it, with `__` between nested keys
    /// (`SOUL_SESSION__SESSION__DUCK_VOLUME=0.3`).
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = config::Config::builder();

        let config_path = file.map_or_else(|| PathBuf::from("soul-session.toml"), Path::to_path_buf);
        if config_path.exists() {
            settings = settings.add_source(config::File::from(config_path));
        } else if file.is_some() {
            anyhow::bail!("Config file not found: {}", config_path.display());
        }

        settings = settings.add_source(
            config::Environment::with_prefix("SOUL_SESSION")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.session.duck_volume) {
            anyhow::bail!(
                "duck_volume must be between 0.0 and 1.0, got {}",
                self.session.duck_volume
            );
        }
        if self.session.progress_interval_ms == 0 {
            anyhow::bail!("progress_interval_ms must be greater than 0");
        }
        Ok(())
    }
}

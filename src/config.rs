use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_LEVEL: &str = "warn";
pub const DEFAULT_PLACEHOLDER: &str = "------";
/// Newest config.json layout this build understands.
pub const CONFIG_VERSION: u32 = 1;

/// Корневая директория данных (например, ~/.local/share/otpbar)
pub fn data_root() -> anyhow::Result<PathBuf> {
    let mut dir = dirs::data_dir().ok_or_else(|| anyhow::anyhow!("cannot get data dir"))?;
    dir.push("otpbar");
    Ok(dir)
}

/// Директория для записей хранилища учётных данных
pub fn state_dir(root: &Path) -> PathBuf {
    root.join("state")
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join("config.json")
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}

fn default_refresh_interval() -> u64 {
    1
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String, // tracing EnvFilter directive
    /// Shown instead of a code that cannot be generated
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            log_level: default_log_level(),
            placeholder: default_placeholder(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl Config {
    /// Missing file means defaults; a file that does not parse, or was
    /// written by a newer layout, is an error.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let path = config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        if cfg.version > CONFIG_VERSION {
            anyhow::bail!(
                "config file {} has version {}, this build supports up to {}",
                path.display(),
                cfg.version,
                CONFIG_VERSION
            );
        }
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("cannot create {}", root.display()))?;
        let path = config_path(root);
        let s = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, s).with_context(|| format!("cannot write {}", path.display()))?;
        Ok(path)
    }
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use super::{AppConfig, Network};

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["treasury.toml", "config/treasury.toml"];
pub const RPC_URL_ENV: &str = "SUI_RPC_URL";
pub const NETWORK_ENV: &str = "SUI_NETWORK";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("解析配置文件 {path} 失败: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    load_config_with(path, |name| env::var(name).ok())
}

pub fn load_config_with<F>(path: Option<PathBuf>, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    let mut config = None;
    for candidate in candidate_paths {
        if let Some(loaded) = try_load_file(&candidate)? {
            config = Some(loaded);
            break;
        }
    }

    let mut config = config.unwrap_or_default();
    apply_env_overrides(&mut config, lookup);
    Ok(config)
}

fn try_load_file(path: &Path) -> Result<Option<AppConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: AppConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(config))
}

fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(NETWORK_ENV).filter(|value| !value.trim().is_empty()) {
        match value.parse::<Network>() {
            Ok(network) => config.global.network = network,
            Err(err) => warn!(target: "config", env = NETWORK_ENV, error = %err, "忽略非法的网络覆盖"),
        }
    }

    if let Some(url) = lookup(RPC_URL_ENV).filter(|value| !value.trim().is_empty()) {
        config.global.rpc_url = Some(url.trim().to_string());
    }
}

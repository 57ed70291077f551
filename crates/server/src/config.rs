use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "CANTO_CONFIG";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Local music directory. Ignored when `s3_bucket` is set.
    pub music_root: String,
    pub s3_endpoint: String,
    pub s3_bucket: String,
    pub index_path: String,
    pub port: u16,
    /// Minutes between timer scans, 0 disables the timer.
    pub scan_interval_mins: u64,
    pub scan_on_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            music_root: "music".to_string(),
            s3_endpoint: String::new(),
            s3_bucket: String::new(),
            index_path: "catalog.redb".to_string(),
            port: 4747,
            scan_interval_mins: 0,
            scan_on_start: true,
        }
    }
}

/// Where the music lives, resolved from the config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MusicSource {
    Local(PathBuf),
    S3 { endpoint: String, bucket: String },
}

impl ServerConfig {
    pub fn music_source(&self, config_path: &Path) -> Option<MusicSource> {
        let bucket = self.s3_bucket.trim();
        if !bucket.is_empty() {
            let endpoint = match self.s3_endpoint.trim() {
                "" => "https://s3.amazonaws.com".to_string(),
                value => value.to_string(),
            };
            return Some(MusicSource::S3 {
                endpoint,
                bucket: bucket.to_string(),
            });
        }
        let root = self.music_root.trim();
        if root.is_empty() {
            None
        } else {
            Some(MusicSource::Local(resolve_path(config_path, root)))
        }
    }

    /// Display name of the single music folder.
    pub fn folder_name(&self) -> String {
        let bucket = self.s3_bucket.trim();
        if !bucket.is_empty() {
            return bucket.to_string();
        }
        Path::new(self.music_root.trim())
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Music".to_string())
    }

    pub fn index_path(&self, config_path: &Path) -> PathBuf {
        match self.index_path.trim() {
            "" => resolve_path(config_path, "catalog.redb"),
            value => resolve_path(config_path, value),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var(CONFIG_ENV) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

pub fn load_or_create_config(path: &Path) -> Result<(ServerConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: ServerConfig = serde_yaml::from_str(&contents)?;
        if config.port == 0 {
            config.port = ServerConfig::default().port;
        }
        return Ok((config, false));
    }

    let config = ServerConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

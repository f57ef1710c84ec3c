use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::mapping::ImageSizes;

/// Library configuration. Read from `config.toml`, then overridden from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: String,
    pub api_base_url: String,
    pub language: String,
    /// Region for watch providers and release listings.
    pub region: String,
    pub images: ImageSizes,
    /// Upper bound on in-flight upstream requests per batch.
    pub max_concurrency: usize,
    pub batch_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub registry_dir: Option<PathBuf>,
    pub database_url: Option<String>,
    pub playback_base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://api.themoviedb.org/3".into(),
            language: "en-US".into(),
            region: "US".into(),
            images: ImageSizes::default(),
            max_concurrency: 8,
            batch_timeout_secs: 20,
            request_timeout_secs: 10,
            registry_dir: None,
            database_url: None,
            playback_base_url: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the platform config dir when `path` is `None`
    /// (a missing default file is not an error), then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file: {}", path.display()))
    }

    /// Environment overrides; `lookup` is `std::env::var` outside tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("MARQUEE_TMDB_API_KEY").or_else(|| get("TMDB_API_KEY")) { self.api_key = v; }
        if let Some(v) = get("MARQUEE_API_BASE_URL") { self.api_base_url = v; }
        if let Some(v) = get("MARQUEE_IMAGE_BASE_URL") { self.images.base_url = v; }
        if let Some(v) = get("MARQUEE_LANGUAGE") { self.language = v; }
        if let Some(v) = get("MARQUEE_REGION") { self.region = v.to_ascii_uppercase(); }
        if let Some(v) = get("MARQUEE_MAX_CONCURRENCY").and_then(|s| s.parse().ok()) { self.max_concurrency = v; }
        if let Some(v) = get("MARQUEE_BATCH_TIMEOUT_SECS").and_then(|s| s.parse().ok()) { self.batch_timeout_secs = v; }
        if let Some(v) = get("MARQUEE_REQUEST_TIMEOUT_SECS").and_then(|s| s.parse().ok()) { self.request_timeout_secs = v; }
        if let Some(v) = get("MARQUEE_REGISTRY_DIR") { self.registry_dir = Some(PathBuf::from(v)); }
        if let Some(v) = get("MARQUEE_DATABASE_URL") { self.database_url = Some(v); }
        if let Some(v) = get("MARQUEE_PLAYBACK_BASE_URL") { self.playback_base_url = Some(v); }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "marquee", "marquee").map(|p| p.config_dir().join("config.toml"))
}

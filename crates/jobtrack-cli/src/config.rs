// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use jobtrack_app::{ColorOverrides, is_hex_color};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT: &str = "5s";
const DEFAULT_CACHE_MAX_AGE: &str = "7d";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub ui: Ui,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            cache: CacheSettings::default(),
            ui: Ui::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            token: None,
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub enabled: Option<bool>,
    pub db_path: Option<String>,
    pub max_age: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: Some(true),
            db_path: None,
            max_age: Some(DEFAULT_CACHE_MAX_AGE.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    #[serde(default)]
    pub status_colors: BTreeMap<String, String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("JOBTRACK_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set JOBTRACK_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(jobtrack_cache::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and keep values under [api], [cache], and [ui]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.api.base_url
            && base_url.trim().is_empty()
        {
            bail!(
                "api.base_url in {} is empty -- set it to the server URL (for example {DEFAULT_BASE_URL})",
                path.display()
            );
        }

        if let Some(timeout) = &self.api.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "api.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(db_path) = &self.cache.db_path {
            jobtrack_cache::validate_cache_path(db_path)?;
        }

        if let Some(max_age) = &self.cache.max_age {
            parse_duration(max_age).with_context(|| {
                format!("cache.max_age in {} is invalid", path.display())
            })?;
        }

        Ok(())
    }

    pub fn api_base_url(&self) -> &str {
        self.api
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim()
            .trim_end_matches('/')
    }

    /// `[api].token`, falling back to `JOBTRACK_TOKEN`.
    pub fn api_token(&self) -> Option<String> {
        self.api
            .token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| env::var("JOBTRACK_TOKEN").ok())
            .filter(|token| !token.trim().is_empty())
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.enabled.unwrap_or(true)
    }

    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.cache.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => jobtrack_cache::default_cache_path(),
        }
    }

    /// Zero means a cached snapshot never expires.
    pub fn cache_max_age(&self) -> Result<Duration> {
        parse_duration(
            self.cache
                .max_age
                .as_deref()
                .unwrap_or(DEFAULT_CACHE_MAX_AGE),
        )
    }

    pub fn status_colors(&self) -> ColorOverrides {
        let mut colors = ColorOverrides::new();
        for (name, color) in &self.ui.status_colors {
            if !is_hex_color(color.trim()) {
                warn!(status = %name, color = %color, "ignoring status color that is not #RGB or #RRGGBB");
                continue;
            }
            colors.insert(name.clone(), color.clone());
        }
        colors
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# jobtrack config\n# Place this file at: {}\n\nversion = 1\n\n[api]\nbase_url = \"{}\"\n# Bearer token from the web app; JOBTRACK_TOKEN is used when unset\n# token = \"...\"\ntimeout = \"{}\"\n\n[cache]\nenabled = true\n# Optional. Default is platform data dir (for example ~/.local/share/jobtrack/cache.db)\n# db_path = \"/absolute/path/to/cache.db\"\n# How old a cached list may be and still be shown offline (0s = forever)\nmax_age = \"{}\"\n\n[ui.status_colors]\n# Interview = \"#10B981\"\n# Ghosted = \"#9CA3AF\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_TIMEOUT,
            DEFAULT_CACHE_MAX_AGE,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }

    let units: [(char, u64); 4] = [('s', 1), ('m', 60), ('h', 60 * 60), ('d', 24 * 60 * 60)];
    for (suffix, seconds) in units {
        if let Some(value) = raw.strip_suffix(suffix) {
            let count: u64 = value
                .parse()
                .with_context(|| format!("invalid duration {raw:?}"))?;
            return Ok(Duration::from_secs(count.saturating_mul(seconds)));
        }
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m, <N>h, <N>d (for example 500ms or 5s)")
}

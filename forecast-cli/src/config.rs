use anyhow::{Context, Result};
use forecast_advice::Provider;
use forecast_core::SyncPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::{ensure_forecast_home, write_file};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub profile: ProfileSection,
    pub advice: AdviceSection,
    pub sync: SyncSection,
    pub candidates: CandidatesSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSection {
    /// IANA timezone used to decide "today" and the current month
    pub timezone: String,
    pub currency_symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdviceSection {
    pub provider: Provider,
    pub model: String,
    /// Empty means the provider's public endpoint
    pub base_url: String,
    pub temperature: f32,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub enabled: bool,
    /// Directory holding one JSON document per user (a shared or mounted folder)
    pub store_dir: Option<PathBuf>,
    pub user_id: Option<String>,
    pub debounce_ms: u64,
    pub echo_window_ms: u64,
    pub poll_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidatesSection {
    /// Extra descriptions offered alongside the built-in ones
    pub extra: Vec<String>,
}

impl Default for ProfileSection {
    fn default() -> Self {
        Self {
            timezone: "Asia/Tokyo".to_string(),
            currency_symbol: "¥".to_string(),
        }
    }
}

impl Default for AdviceSection {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            model: Provider::Gemini.default_model().to_string(),
            base_url: String::new(),
            temperature: 0.4,
            language: "Japanese".to_string(),
        }
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            enabled: false,
            store_dir: None,
            user_id: None,
            debounce_ms: 1500,
            echo_window_ms: 300,
            poll_ms: 500,
        }
    }
}

impl SyncSection {
    pub fn policy(&self) -> SyncPolicy {
        SyncPolicy::from_millis(self.debounce_ms, self.echo_window_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_forecast_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

/// Writes the default config unless one exists. False when it already did.
pub fn init_config_at(p: &Path) -> Result<bool> {
    if p.exists() {
        return Ok(false);
    }
    let s = toml::to_string_pretty(&Config::default()).context("serialize config")?;
    write_file(p, &s)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg.profile.timezone, "Asia/Tokyo");
        assert_eq!(cfg.sync.debounce_ms, 1500);
        assert!(!cfg.sync.enabled);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        fs::write(
            &p,
            "[advice]\nprovider = \"openai\"\n\n[sync]\nenabled = true\nuser_id = \"me\"\n",
        )
        .unwrap();
        let cfg = load_config_from(&p).unwrap();
        assert_eq!(cfg.advice.provider, Provider::OpenAI);
        assert_eq!(cfg.advice.language, "Japanese");
        assert!(cfg.sync.enabled);
        assert_eq!(cfg.sync.user_id.as_deref(), Some("me"));
        assert_eq!(cfg.sync.echo_window_ms, 300);
        assert_eq!(cfg.profile.currency_symbol, "¥");
    }

    #[test]
    fn test_defaults_serialize_to_toml() {
        let s = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back.advice.provider, Provider::Gemini);
        assert_eq!(back.sync.poll_ms, 500);
    }

    #[test]
    fn test_init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        assert!(init_config_at(&p).unwrap());
        assert_eq!(load_config_from(&p).unwrap().sync.poll_ms, 500);

        fs::write(&p, "[sync]\npoll_ms = 9\n").unwrap();
        assert!(!init_config_at(&p).unwrap());
        assert_eq!(load_config_from(&p).unwrap().sync.poll_ms, 9);
    }
}

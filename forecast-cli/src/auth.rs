use anyhow::{bail, Result};
use forecast_advice::Provider;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::prompt::prompt_secret;
use crate::state::{ensure_forecast_home, read_json, write_json};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthState {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl AuthState {
    fn slot(&mut self, provider: Provider) -> &mut Option<String> {
        match provider {
            Provider::OpenAI => &mut self.openai_api_key,
            Provider::Anthropic => &mut self.anthropic_api_key,
            Provider::Gemini => &mut self.gemini_api_key,
        }
    }

    pub fn key_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
            Provider::Gemini => self.gemini_api_key.as_deref(),
        }
    }
}

fn auth_path() -> Result<PathBuf> {
    Ok(ensure_forecast_home()?.join("auth.json"))
}

fn load_auth_from(path: &Path) -> Result<AuthState> {
    Ok(read_json(path)?.unwrap_or_default())
}

/// Stored key for `provider`, else `FORECAST_API_KEY`, else `API_KEY`.
pub fn resolve_api_key(provider: Provider) -> Result<Option<String>> {
    let auth = load_auth_from(&auth_path()?)?;
    Ok(pick_key(
        auth.key_for(provider),
        std::env::var("FORECAST_API_KEY").ok(),
        std::env::var("API_KEY").ok(),
    ))
}

fn pick_key(stored: Option<&str>, primary_env: Option<String>, legacy_env: Option<String>) -> Option<String> {
    stored
        .map(str::to_string)
        .into_iter()
        .chain(primary_env)
        .chain(legacy_env)
        .map(|k| k.trim().to_string())
        .find(|k| !k.is_empty())
}

pub fn set_key(provider: Provider) -> Result<()> {
    let path = auth_path()?;
    let mut auth = load_auth_from(&path)?;
    let key = prompt_secret(&format!("Paste {provider} API key"))?;
    if key.is_empty() {
        bail!("no key entered");
    }
    *auth.slot(provider) = Some(key);
    write_json(&path, &auth)?;
    println!("Saved {provider} API key to {}", path.display());
    Ok(())
}

use std::future::Future;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::request::{AdviceRequest, FALLBACK_ADVICE};

#[derive(Debug, Error)]
pub enum AdviceError {
    #[error("missing API key for {0}; run: forecast auth set-key --provider {0}")]
    MissingApiKey(Provider),

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} error: {status} {body}")]
    Status {
        provider: Provider,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
    Gemini,
}

impl Provider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4o-mini",
            Provider::Anthropic => "claude-3-5-sonnet-latest",
            Provider::Gemini => "gemini-2.0-flash",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
        })
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "anthropic" => Ok(Provider::Anthropic),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(format!("unknown provider '{other}' (expected openai|anthropic|gemini)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ProviderConfig {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            base_url: provider.default_base_url().to_string(),
            api_key: None,
            temperature: 0.4,
            max_tokens: 600,
        }
    }
}

/// Turns a month's figures into free-text advice.
pub trait AdviceGenerator {
    fn advise(&self, request: &AdviceRequest) -> impl Future<Output = Result<String, AdviceError>> + Send;
}

/// Calls a hosted model over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpAdvisor {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl HttpAdvisor {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str, AdviceError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AdviceError::MissingApiKey(self.config.provider))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, url: String, headers: HeaderMap, body: Value) -> Result<Value, AdviceError> {
        let provider = self.config.provider;
        debug!(%provider, model = %self.config.model, "requesting advice");
        let resp = self
            .client
            .post(url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|source| AdviceError::Transport { provider, source })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%provider, %status, "advice request rejected");
            return Err(AdviceError::Status { provider, status, body });
        }
        resp.json()
            .await
            .map_err(|source| AdviceError::Transport { provider, source })
    }

    async fn openai(&self, request: &AdviceRequest) -> Result<String, AdviceError> {
        let key = self.api_key()?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [
                {"role": "system", "content": request.system_prompt()},
                {"role": "user", "content": request.user_prompt()},
            ],
        });
        let out = self.post(self.endpoint("/v1/chat/completions"), headers, body).await?;
        Ok(openai_text(&out))
    }

    async fn anthropic(&self, request: &AdviceRequest) -> Result<String, AdviceError> {
        let key = self.api_key()?;
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(key)?);
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": request.system_prompt(),
            "messages": [{"role": "user", "content": request.user_prompt()}],
        });
        let out = self.post(self.endpoint("/v1/messages"), headers, body).await?;
        Ok(anthropic_text(&out))
    }

    async fn gemini(&self, request: &AdviceRequest) -> Result<String, AdviceError> {
        let key = self.api_key()?;
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", HeaderValue::from_str(key)?);
        let body = json!({
            "systemInstruction": {"parts": [{"text": request.system_prompt()}]},
            "contents": [{"role": "user", "parts": [{"text": request.user_prompt()}]}],
            "generationConfig": {"temperature": self.config.temperature},
        });
        let path = format!("/v1beta/models/{}:generateContent", self.config.model);
        let out = self.post(self.endpoint(&path), headers, body).await?;
        Ok(gemini_text(&out))
    }
}

impl AdviceGenerator for HttpAdvisor {
    async fn advise(&self, request: &AdviceRequest) -> Result<String, AdviceError> {
        let text = match self.config.provider {
            Provider::OpenAI => self.openai(request).await?,
            Provider::Anthropic => self.anthropic(request).await?,
            Provider::Gemini => self.gemini(request).await?,
        };
        Ok(or_fallback(text))
    }
}

fn or_fallback(text: String) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        FALLBACK_ADVICE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `choices[0].message.content`
pub fn openai_text(out: &Value) -> String {
    out.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Concatenated `text` blocks of `content`.
pub fn anthropic_text(out: &Value) -> String {
    out.get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Concatenated parts of the first candidate.
pub fn gemini_text(out: &Value) -> String {
    out.pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names_round_trip() {
        for p in [Provider::OpenAI, Provider::Anthropic, Provider::Gemini] {
            assert_eq!(p.to_string().parse::<Provider>(), Ok(p));
        }
        assert_eq!("Google".parse::<Provider>(), Ok(Provider::Gemini));
        assert!("bard".parse::<Provider>().is_err());
    }

    #[test]
    fn test_extract_openai() {
        let out = json!({"choices": [{"message": {"content": " Looks tight. "}}]});
        assert_eq!(openai_text(&out), " Looks tight. ");
        assert_eq!(openai_text(&json!({"choices": []})), "");
    }

    #[test]
    fn test_extract_anthropic_skips_non_text_blocks() {
        let out = json!({"content": [
            {"type": "thinking", "thinking": "..."},
            {"type": "text", "text": "Good "},
            {"type": "text", "text": "month."}
        ]});
        assert_eq!(anthropic_text(&out), "Good month.");
    }

    #[test]
    fn test_extract_gemini() {
        let out = json!({"candidates": [{"content": {"parts": [{"text": "Risky"}, {"text": "!"}]}}]});
        assert_eq!(gemini_text(&out), "Risky!");
        assert_eq!(gemini_text(&json!({})), "");
    }

    #[test]
    fn test_blank_answer_falls_back() {
        assert_eq!(or_fallback("  \n".to_string()), FALLBACK_ADVICE);
        assert_eq!(or_fallback(" ok ".to_string()), "ok");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let mut cfg = ProviderConfig::new(Provider::OpenAI);
        cfg.base_url = "http://localhost:8080/".to_string();
        let advisor = HttpAdvisor::new(cfg);
        assert_eq!(advisor.endpoint("/v1/chat/completions"), "http://localhost:8080/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let advisor = HttpAdvisor::new(ProviderConfig::new(Provider::Gemini));
        let ledger = forecast_core::Ledger::default();
        let month = forecast_core::YearMonth::new(2024, 1).unwrap();
        let req = AdviceRequest::for_month(&ledger, month, "¥", "Japanese");
        let err = advisor.advise(&req).await.unwrap_err();
        assert!(matches!(err, AdviceError::MissingApiKey(Provider::Gemini)));
    }
}

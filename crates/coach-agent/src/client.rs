use std::time::Duration;

use coach_core::capability::Generate;
use coach_core::config::GenerationConfig;
use tracing::debug;

use crate::types::{MessagesRequest, MessagesResponse, RequestMessage};
use crate::{AgentError, Result};

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const API_VERSION: &str = "2023-06-01";

// ─── MessagesClient ───────────────────────────────────────────────────────

/// Blocking client for the hosted Messages API.
#[derive(Debug)]
pub struct MessagesClient {
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
    http: reqwest::blocking::Client,
}

impl MessagesClient {
    pub fn new(cfg: &GenerationConfig, api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(AgentError::MissingCredential(API_KEY_ENV))?;
        let http = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(cfg.timeout_secs.min(15)))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| AgentError::Http(e.to_string()))?;
        Ok(Self {
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            timeout_secs: cfg.timeout_secs,
            http,
        })
    }

    pub fn complete(&self, prompt: &str) -> Result<String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![RequestMessage::user(prompt)],
        };
        debug!(model = %self.model, "calling messages api");

        let resp = self
            .http
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout(self.timeout_secs)
                } else {
                    AgentError::Http(e.to_string())
                }
            })?;

        let status = resp.status();
        let text = resp.text().map_err(|e| AgentError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(AgentError::Api {
                status: status.as_u16(),
                body: text.chars().take(500).collect(),
            });
        }
        let parsed: MessagesResponse =
            serde_json::from_str(&text).map_err(|source| AgentError::Parse {
                body: text.chars().take(500).collect(),
                source,
            })?;
        Ok(parsed.text())
    }
}

impl Generate for MessagesClient {
    fn generate(&self, prompt: &str) -> coach_core::Result<String> {
        Ok(self.complete(prompt)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::Server) -> MessagesClient {
        let cfg = GenerationConfig {
            api_base: server.url(),
            timeout_secs: 5,
            ..GenerationConfig::default()
        };
        MessagesClient::new(&cfg, Some("sk-test".into())).unwrap()
    }

    #[test]
    fn returns_trimmed_text() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-test")
            .match_header("anthropic-version", API_VERSION)
            .match_body(Matcher::PartialJson(json!({
                "max_tokens": 450,
                "messages": [{"role": "user", "content": "teach me"}]
            })))
            .with_header("content-type", "application/json")
            .with_body(r#"{"content":[{"type":"text","text":"\n*Tip*\n"}]}"#)
            .create();

        assert_eq!(client(&server).complete("teach me").unwrap(), "*Tip*");
        mock.assert();
    }

    #[test]
    fn non_success_status_is_api_error() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/v1/messages")
            .with_status(429)
            .with_body(r#"{"type":"error","error":{"type":"rate_limit_error"}}"#)
            .create();

        match client(&server).complete("x") {
            Err(AgentError::Api { status, body }) => {
                assert_eq!(status, 429);
                assert!(body.contains("rate_limit_error"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn generate_maps_to_generation_failed() {
        let mut server = mockito::Server::new();
        server.mock("POST", "/v1/messages").with_status(500).create();
        let err = client(&server).generate("x").unwrap_err();
        assert!(matches!(err, coach_core::CoachError::GenerationFailed(_)));
    }

    #[test]
    fn garbage_body_is_parse_error() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/v1/messages")
            .with_body("not json")
            .create();
        assert!(matches!(
            client(&server).complete("x"),
            Err(AgentError::Parse { .. })
        ));
    }

    #[test]
    fn missing_key_is_rejected() {
        let cfg = GenerationConfig::default();
        assert!(matches!(
            MessagesClient::new(&cfg, None),
            Err(AgentError::MissingCredential(API_KEY_ENV))
        ));
    }
}

//! Chat delivery over the platform's Web API or an incoming webhook.

use crate::capability::Deliver;
use crate::config::{SlackConfig, SlackMode};
use crate::error::{CoachError, Result};
use crate::message::OutboundMessage;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const BOT_TOKEN_ENV: &str = "SLACK_BOT_TOKEN";
pub const WEBHOOK_URL_ENV: &str = "SLACK_WEBHOOK_URL";

#[derive(Debug)]
enum Target {
    Bot { api_base: String, token: String },
    Webhook { url: String },
}

#[derive(Debug)]
pub struct SlackClient {
    target: Target,
    http: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SlackClient {
    /// Build a client for the configured mode. The matching secret must be
    /// present: a bot token for `bot`, a webhook URL for `webhook`.
    pub fn from_config(
        cfg: &SlackConfig,
        bot_token: Option<String>,
        webhook_url: Option<String>,
    ) -> Result<Self> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let target = match cfg.mode {
            SlackMode::Bot => Target::Bot {
                api_base: cfg.api_base.trim_end_matches('/').to_string(),
                token: non_empty(bot_token).ok_or_else(|| {
                    CoachError::Config(format!("{BOT_TOKEN_ENV} is required in bot mode"))
                })?,
            },
            SlackMode::Webhook => Target::Webhook {
                url: non_empty(webhook_url).ok_or_else(|| {
                    CoachError::Config(format!("{WEBHOOK_URL_ENV} is required in webhook mode"))
                })?,
            },
        };
        let http = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(cfg.timeout_secs.min(10)))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| CoachError::Config(format!("http client: {e}")))?;
        Ok(Self { target, http })
    }

    fn post_bot(&self, api_base: &str, token: &str, msg: &OutboundMessage) -> Result<Option<String>> {
        let resp = self
            .http
            .post(format!("{api_base}/chat.postMessage"))
            .bearer_auth(token)
            .json(&json!({
                "channel": msg.channel,
                "text": msg.text,
                "blocks": msg.blocks,
            }))
            .send()
            .map_err(|e| CoachError::DeliveryFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CoachError::DeliveryFailed(format!("HTTP {status}")));
        }
        let body: PostMessageResponse = resp
            .json()
            .map_err(|e| CoachError::DeliveryFailed(format!("unreadable response: {e}")))?;
        if !body.ok {
            return Err(CoachError::DeliveryFailed(
                body.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        match body.ts {
            Some(ts) => Ok(Some(ts)),
            None => Err(CoachError::DeliveryFailed(
                "response carried no message ts".to_string(),
            )),
        }
    }

    fn post_webhook(&self, url: &str, msg: &OutboundMessage) -> Result<Option<String>> {
        let resp = self
            .http
            .post(url)
            .json(&json!({ "text": msg.text, "blocks": msg.blocks }))
            .send()
            .map_err(|e| CoachError::DeliveryFailed(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(CoachError::DeliveryFailed(format!("HTTP {status}: {body}")));
        }
        Ok(None)
    }
}

impl Deliver for SlackClient {
    fn deliver(&self, message: &OutboundMessage) -> Result<Option<String>> {
        match &self.target {
            Target::Bot { api_base, token } => self.post_bot(api_base, token, message),
            Target::Webhook { url } => self.post_webhook(url, message),
        }
    }
}

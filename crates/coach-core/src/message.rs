//! Outbound chat message: title, generated body, feedback buttons and the
//! next-topic poll.

use crate::config::StreamConfig;
use crate::topic::TopicPlan;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const THUMBS_UP: &str = "thumbs_up";
pub const THUMBS_DOWN: &str = "thumbs_down";
/// Poll buttons use this prefix plus an index; action ids must be unique
/// within one actions block.
pub const VOTE_NEXT_TOPIC: &str = "vote_next_topic";

pub const FEEDBACK_BLOCK: &str = "feedback";
pub const POLL_BLOCK: &str = "next_topic_poll";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub channel: String,
    /// Plain fallback text, also the whole payload in webhook mode.
    pub text: String,
    pub blocks: Vec<Value>,
}

/// Metadata carried in each button's `value`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ButtonValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl ButtonValue {
    fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn render(stream: &StreamConfig, period: &str, plan: &TopicPlan, body: &str) -> OutboundMessage {
    let text = format!("*{}*\n\n{}", stream.title_prefix.trim(), body.trim());
    let base = ButtonValue {
        stream: Some(stream.id.clone()),
        period: Some(period.to_string()),
        topic: Some(plan.topic.clone()),
        ..Default::default()
    };

    let mut blocks = vec![
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": text },
        }),
        json!({
            "type": "context",
            "elements": [{ "type": "mrkdwn", "text": format!("Topic: {} | {}", plan.topic, period) }],
        }),
        json!({
            "type": "actions",
            "block_id": FEEDBACK_BLOCK,
            "elements": [
                button(THUMBS_UP, ":+1: Helpful", &base),
                button(THUMBS_DOWN, ":-1: Not helpful", &base),
            ],
        }),
    ];

    if !plan.candidates.is_empty() {
        let elements: Vec<Value> = plan
            .candidates
            .iter()
            .enumerate()
            .map(|(i, candidate)| {
                let value = ButtonValue {
                    candidate: Some(candidate.clone()),
                    ..base.clone()
                };
                button(&format!("{VOTE_NEXT_TOPIC}_{i}"), candidate, &value)
            })
            .collect();
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": "*Vote for the next topic:*" },
        }));
        blocks.push(json!({
            "type": "actions",
            "block_id": POLL_BLOCK,
            "elements": elements,
        }));
    }

    OutboundMessage {
        channel: stream.channel.clone(),
        text,
        blocks,
    }
}

fn button(action_id: &str, label: &str, value: &ButtonValue) -> Value {
    // Button labels are capped at 75 characters by the platform.
    let label: String = label.chars().take(75).collect();
    json!({
        "type": "button",
        "action_id": action_id,
        "text": { "type": "plain_text", "text": label, "emoji": true },
        "value": value.encode(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> TopicPlan {
        TopicPlan {
            topic: "BRIN indexes".into(),
            candidates: vec!["HOT updates".into(), "Lateral joins".into()],
            voted: false,
        }
    }

    #[test]
    fn text_has_bold_title_then_body() {
        let stream = StreamConfig::new("team-a", "C1");
        let msg = render(&stream, "2026-02-07", &plan(), "  body  ");
        assert_eq!(msg.channel, "C1");
        assert_eq!(msg.text, "*Daily Postgres Coach*\n\nbody");
    }

    #[test]
    fn buttons_carry_metadata() {
        let stream = StreamConfig::new("team-a", "C1");
        let msg = render(&stream, "2026-02-07", &plan(), "body");
        let feedback = &msg.blocks[2]["elements"][0];
        assert_eq!(feedback["action_id"], THUMBS_UP);
        let value: ButtonValue =
            serde_json::from_str(feedback["value"].as_str().unwrap()).unwrap();
        assert_eq!(value.stream.as_deref(), Some("team-a"));
        assert_eq!(value.period.as_deref(), Some("2026-02-07"));
        assert_eq!(value.candidate, None);

        let poll = &msg.blocks[4]["elements"];
        assert_eq!(poll.as_array().unwrap().len(), 2);
        assert_eq!(poll[1]["action_id"], "vote_next_topic_1");
        let value: ButtonValue = serde_json::from_str(poll[1]["value"].as_str().unwrap()).unwrap();
        assert_eq!(value.candidate.as_deref(), Some("Lateral joins"));
    }

    #[test]
    fn no_poll_block_without_candidates() {
        let stream = StreamConfig::new("team-a", "C1");
        let mut p = plan();
        p.candidates.clear();
        let msg = render(&stream, "2026-02-07", &p, "body");
        assert_eq!(msg.blocks.len(), 3);
    }
}

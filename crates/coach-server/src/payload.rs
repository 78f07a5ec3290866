//! Interactive callback payloads: decode the body and map the clicked
//! button to a vote.

use coach_core::message::{ButtonValue, THUMBS_DOWN, THUMBS_UP, VOTE_NEXT_TOPIC};
use coach_core::paths::validate_key;
use coach_core::votes::{VoteCast, FEEDBACK_BALLOT, NEXT_TOPIC_BALLOT};
use coach_core::{CoachError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Interaction {
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    actions: Vec<Action>,
    #[serde(default)]
    container: Option<Container>,
    #[serde(default)]
    message: Option<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Action {
    action_id: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Container {
    #[serde(default)]
    message_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    #[serde(default)]
    ts: Option<String>,
}

fn bad(msg: &str) -> CoachError {
    CoachError::BadPayload(msg.to_string())
}

/// Decode a form-encoded (`payload=<json>`) or raw JSON body into a vote.
pub fn parse(body: &[u8], content_type: Option<&str>) -> Result<VoteCast> {
    let text = std::str::from_utf8(body).map_err(|_| bad("body is not utf-8"))?;
    let is_json = content_type.is_some_and(|ct| ct.starts_with("application/json"))
        || text.trim_start().starts_with('{');
    let json = if is_json {
        text.to_string()
    } else {
        serde_urlencoded::from_str::<FormBody>(text)
            .map_err(|e| CoachError::BadPayload(e.to_string()))?
            .payload
            .ok_or_else(|| bad("no payload field"))?
    };
    let interaction: Interaction =
        serde_json::from_str(&json).map_err(|e| CoachError::BadPayload(e.to_string()))?;
    to_vote(interaction)
}

/// `application/x-www-form-urlencoded` body of an interactive callback.
#[derive(Debug, Deserialize)]
struct FormBody {
    #[serde(default)]
    payload: Option<String>,
}

fn to_vote(interaction: Interaction) -> Result<VoteCast> {
    let user_id = interaction
        .user
        .map(|u| u.id)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| bad("missing user.id"))?;
    let action = interaction
        .actions
        .into_iter()
        .next()
        .ok_or_else(|| bad("no actions"))?;

    let meta: ButtonValue = match action.value.as_deref().map(str::trim) {
        Some(v) if v.starts_with('{') => {
            serde_json::from_str(v).map_err(|e| CoachError::BadPayload(e.to_string()))?
        }
        _ => ButtonValue::default(),
    };

    let (ballot, option) = match action.action_id.as_str() {
        THUMBS_UP | THUMBS_DOWN => (FEEDBACK_BALLOT, action.action_id.clone()),
        id if id.starts_with(VOTE_NEXT_TOPIC) => (
            NEXT_TOPIC_BALLOT,
            meta.candidate
                .clone()
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| bad("poll vote without candidate"))?,
        ),
        _ => return Err(bad("unsupported action")),
    };

    let message_id = meta
        .message_id
        .clone()
        .or_else(|| interaction.container.and_then(|c| c.message_ts))
        .or_else(|| interaction.message.and_then(|m| m.ts))
        .ok_or_else(|| bad("no message id"))?;
    validate_key(&message_id).map_err(|_| bad("malformed message id"))?;

    Ok(VoteCast {
        message_id,
        user_id,
        ballot: ballot.to_string(),
        option,
        stream_id: meta.stream,
        period: meta.period,
        topic: meta.topic,
    })
}

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use coach_core::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use coach_core::votes;

use crate::error::AppError;
use crate::payload;
use crate::state::AppState;

pub const ACK_TEXT: &str = "Thanks, your vote was recorded.";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ---------------------------------------------------------------------------
// Vote
// ---------------------------------------------------------------------------

/// POST /actions: verify an interactive callback and record the vote
pub async fn handle_action(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let verified = signature::verify(
        &body,
        header(&headers, TIMESTAMP_HEADER),
        header(&headers, SIGNATURE_HEADER),
        app.signing_secret.as_bytes(),
        Utc::now().timestamp(),
        app.replay_window_secs,
    );
    if !verified {
        tracing::debug!("rejected callback with bad or stale signature");
        return Err(AppError::unauthorized());
    }

    let cast = payload::parse(&body, header(&headers, "content-type")).map_err(|e| {
        tracing::info!("rejected callback: {e}");
        AppError::from(e)
    })?;

    let store = app.store.clone();
    tokio::task::spawn_blocking(move || votes::record(&store, &cast, Utc::now()))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(serde_json::json!({
        "response_type": "ephemeral",
        "replace_original": false,
        "text": ACK_TEXT,
    })))
}

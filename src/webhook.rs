/// Conversion of messaging webhook bodies into sensor events
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::warn;
use serde::Deserialize;
use std::fmt;

use crate::models::SensorEvent;

#[derive(Debug)]
pub enum WebhookError {
    Json(serde_json::Error),
}

impl fmt::Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "invalid webhook body: {e}"),
        }
    }
}

impl std::error::Error for WebhookError {}

impl From<serde_json::Error> for WebhookError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookEvent {
    #[serde(default)]
    reply_token: String,
    #[serde(default)]
    source: Source,
    things: Option<Things>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Source {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Things {
    #[serde(rename = "type")]
    kind: String,
    result: Option<ThingsResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThingsResult {
    result_code: Option<String>,
    ble_notification_payload: Option<String>,
}

/// Parse a webhook body and return the device events it carries
///
/// Events without a `things` object (messages, follows, ...) are skipped, as
/// are device events whose source has no user id. A payload that is missing
/// or not valid base64 becomes an empty one, so only that event is rejected
/// later by the decoder.
pub fn parse_webhook_body(body: &str) -> Result<Vec<SensorEvent>, WebhookError> {
    let body: WebhookBody = serde_json::from_str(body)?;

    let events = body
        .events
        .into_iter()
        .filter_map(|event| {
            let things = event.things?;
            let Some(user_id) = event.source.user_id.filter(|id| !id.is_empty()) else {
                warn!("Skipping {} event without a user id", things.kind);
                return None;
            };

            let (result_code, payload) = match things.result {
                Some(result) => (
                    result.result_code,
                    decode_notification_payload(&user_id, result.ble_notification_payload),
                ),
                None => (None, Vec::new()),
            };

            Some(SensorEvent {
                event_type: things.kind,
                result_code,
                user_id,
                reply_token: event.reply_token,
                payload,
            })
        })
        .collect();

    Ok(events)
}

fn decode_notification_payload(user_id: &str, encoded: Option<String>) -> Vec<u8> {
    let Some(encoded) = encoded else {
        return Vec::new();
    };

    match STANDARD.decode(encoded.trim()) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Invalid notification payload from {}: {}", user_id, e);
            Vec::new()
        }
    }
}

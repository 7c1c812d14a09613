//! Shareable wheel tokens: participants and settings packed into a URL-safe
//! string so a wheel can be handed to another browser.
//!
//! Tokens are base64 over the JSON snapshot `{ "users": [...], "settings": {...} }`.
//! New tokens use the URL-safe alphabet without padding; tokens in the
//! standard alphabet (as produced by `btoa`) are still accepted.

use crate::config::SHARE_QUERY_PARAM;
use crate::model::{Participant, Settings};
use crate::WheelError;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The part of a wheel that travels in a share link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedState {
    #[serde(rename = "users")]
    pub participants: Vec<Participant>,
    pub settings: Settings,
}

#[derive(Serialize)]
struct SharedStateRef<'a> {
    users: &'a [Participant],
    settings: &'a Settings,
}

#[derive(Deserialize)]
struct SharedStateWire {
    users: Option<Vec<Participant>>,
    #[serde(default)]
    settings: Option<Value>,
}

pub fn encode(participants: &[Participant], settings: &Settings) -> Result<String, WheelError> {
    let json = serde_json::to_vec(&SharedStateRef {
        users: participants,
        settings,
    })
    .map_err(|e| WheelError::Encode(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a share token. Settings are read leniently (missing keys take their
/// defaults); a token without a participant list is rejected.
pub fn decode(token: &str) -> Result<SharedState, WheelError> {
    let token = token.trim();
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .or_else(|_| STANDARD.decode(token))
        .map_err(|e| WheelError::Decode(format!("token is not valid base64: {}", e)))?;

    let wire: SharedStateWire = serde_json::from_slice(&bytes)
        .map_err(|e| WheelError::Decode(format!("token is not a wheel snapshot: {}", e)))?;
    let participants = wire
        .users
        .ok_or_else(|| WheelError::Decode("token carries no participant list".to_string()))?;

    Ok(SharedState {
        participants,
        settings: Settings::from_stored(wire.settings.as_ref()),
    })
}

/// Decode, logging and swallowing failures: an unreadable link is ignored.
pub fn decode_or_ignore(token: &str) -> Option<SharedState> {
    match decode(token) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("Ignoring shared link: {}", e);
            None
        }
    }
}

/// `{base_url}?share={token}`
pub fn share_link(base_url: &str, token: &str) -> String {
    format!("{}?{}={}", base_url, SHARE_QUERY_PARAM, token)
}

/// Pull the share token out of a query string such as `?share=abc&x=1`.
pub fn token_from_query(query: &str) -> Option<&str> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == SHARE_QUERY_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use thiserror::Error;

/// Errors produced by the client core.
///
/// Playback failures (`EngineInit`, `StreamUnavailable`) are reported through the
/// media session state rather than returned from `load`; they appear here so
/// the UI can render them uniformly.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NimbusError {
    /// Catalog or EPG fetch failed
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a non-success status
    #[error("Server returned {0}: {1}")]
    Server(u16, String),

    /// Response body could not be decoded
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The playback engine could not be created or attached to its surface
    #[error("Failed to initialise player: {0}")]
    EngineInit(String),

    /// The engine rejected the stream
    #[error("Stream unavailable: {0}")]
    StreamUnavailable(String),

    /// A control command sent to a running engine failed
    #[error("Player command failed: {0}")]
    Player(String),

    /// A favorite no longer exists in the upstream catalog
    #[error("Channel {0} is no longer available")]
    ResolutionMiss(u32),

    /// Attempt to play a channel without a playback URL
    #[error("Channel {0} cannot be played")]
    Unplayable(u32),

    /// No stored session or the stored credentials were rejected
    #[error("Session is missing or expired, please log in again")]
    SessionInvalid,

    /// Backend rejected the username or password
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Backend refused because the monthly list limit was reached
    #[error("Monthly list limit reached")]
    RateLimited,
}

impl NimbusError {
    /// Whether the UI should offer a retry for this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            NimbusError::Network(_) | NimbusError::StreamUnavailable(_) => true,
            NimbusError::Server(status, _) => *status >= 500,
            _ => false,
        }
    }

    /// Short message suitable for an on-screen banner.
    pub fn banner(&self) -> String {
        match self {
            NimbusError::Network(_) | NimbusError::Server(..) | NimbusError::Parse(_) => {
                "Could not reach the server".to_string()
            }
            NimbusError::EngineInit(_) => "Player failed to start".to_string(),
            NimbusError::Player(_) => "Player error".to_string(),
            NimbusError::StreamUnavailable(_) => "Stream unavailable".to_string(),
            NimbusError::ResolutionMiss(_) | NimbusError::Unplayable(_) => {
                "Channel unavailable".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for NimbusError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            NimbusError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            NimbusError::Server(status.as_u16(), err.to_string())
        } else {
            NimbusError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for NimbusError {
    fn from(err: serde_json::Error) -> Self {
        NimbusError::Parse(err.to_string())
    }
}

pub type NimbusResult<T> = std::result::Result<T, NimbusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(NimbusError::Network("timeout".into()).is_retryable());
        assert!(NimbusError::Server(502, "bad gateway".into()).is_retryable());
        assert!(!NimbusError::Server(404, "missing".into()).is_retryable());
        assert!(!NimbusError::ResolutionMiss(7).is_retryable());
        assert!(!NimbusError::SessionInvalid.is_retryable());
    }

    #[test]
    fn test_banner_hides_transport_details() {
        let err = NimbusError::Network("dns error: no such host".into());
        assert_eq!(err.banner(), "Could not reach the server");
        assert_eq!(NimbusError::Unplayable(3).banner(), "Channel unavailable");
    }
}

// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by the client library.
///
/// Every transport outcome is normalized into [`ClientError::Network`] before it
/// reaches the authenticator: `status_code` is the HTTP status of the failed
/// response, or `0` when no response was received at all.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error (status {status_code}): {message}")]
    Network { status_code: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("credential storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    pub fn network(status_code: u16, message: impl Into<String>) -> Self {
        Self::Network {
            status_code,
            message: message.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// HTTP status of a network error, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Network { status_code, .. } if *status_code != 0 => Some(*status_code),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }

    /// Builds the error for a non-success response, using the server's
    /// `{"error": "..."}` message when there is one.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        Self::network(status.as_u16(), message)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            status_code: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::network(404, "Task with ID 3 not found.");
        assert_eq!(
            err.to_string(),
            "network error (status 404): Task with ID 3 not found."
        );

        let err = ClientError::storage("disk full");
        assert_eq!(err.to_string(), "credential storage error: disk full");
    }

    #[test]
    fn test_status_code() {
        assert!(ClientError::network(401, "nope").is_unauthorized());
        assert!(!ClientError::network(403, "nope").is_unauthorized());
        assert_eq!(ClientError::network(0, "refused").status_code(), None);
        assert_eq!(ClientError::Decode("x".into()).status_code(), None);
    }
}

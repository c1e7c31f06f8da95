use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors returned by platform calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A precondition failed locally; no request was sent.
    #[error("{0}")]
    Validation(&'static str),
    #[error("{message}")]
    Remote { status: StatusCode, message: String },
    #[error("failed to reach platform: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid platform response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid platform URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Human-readable message, as shown to users.
    pub fn message(&self) -> String {
        match self {
            ApiError::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }

    /// Build a remote error from a non-success response body.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: Option<String>,
        }

        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty())
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        ApiError::Remote { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_prefers_message_field() {
        let err = ApiError::from_response(
            StatusCode::BAD_REQUEST,
            r#"{"message":"Backup not found","code":400}"#,
        );
        assert_eq!(err.message(), "Backup not found");
        assert!(!err.is_validation());
    }

    #[test]
    fn remote_error_falls_back_to_body_then_status() {
        let err = ApiError::from_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.message(), "upstream down");
        let err = ApiError::from_response(StatusCode::NOT_FOUND, "");
        assert_eq!(err.message(), "Not Found");
    }
}

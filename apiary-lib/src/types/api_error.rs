use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Structured error payload sent by the remote API on failure.
///
/// ```json
/// { "error_id": 502, "error_name": "throttle_violation", "error_message": "too many requests from this IP" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiError {
    /// Numeric error identifier, usually mirroring the HTTP status
    pub error_id: u32,
    /// Short machine-readable name
    pub error_name: String,
    /// Human-readable description
    pub error_message: String,
}

impl ApiError {
    /// Try to decode a response body as a structured API error.
    ///
    /// Returns `None` for anything that is not such a payload: HTML error
    /// pages, empty bodies, or JSON of a different shape.
    #[must_use]
    pub fn decode(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.error_name, self.error_id, self.error_message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_structured_error() {
        let body = r#"{"error_id":400,"error_name":"bad_parameter","error_message":"ids"}"#;
        assert_eq!(
            ApiError::decode(body),
            Some(ApiError {
                error_id: 400,
                error_name: "bad_parameter".to_string(),
                error_message: "ids".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_rejects_other_payloads() {
        assert_eq!(ApiError::decode(""), None);
        assert_eq!(ApiError::decode("<html>Bad Gateway</html>"), None);
        assert_eq!(ApiError::decode(r#"{"items":[]}"#), None);
    }

    #[test]
    fn test_display() {
        let error = ApiError {
            error_id: 502,
            error_name: "throttle_violation".to_string(),
            error_message: "too many requests".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "throttle_violation (502): too many requests"
        );
    }
}

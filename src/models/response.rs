//! Response Types
//!
//! Envelope returned by every dispatched operation.

use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, ErrorKind};

/// Generic response for all engine operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl<T> CommandResponse<T> {
    /// Create a successful response with data
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    /// Create an error response with message
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_kind: None,
        }
    }

    /// Create an error response carrying the error's kind
    pub fn from_error(error: &AppError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }
}

impl<T> From<Result<T, AppError>> for CommandResponse<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_response_ok() {
        let response = CommandResponse::ok("test".to_string());
        assert!(response.success);
        assert_eq!(response.data, Some("test".to_string()));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_command_response_err() {
        let response: CommandResponse<String> = CommandResponse::err("error message");
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.error, Some("error message".to_string()));
    }

    #[test]
    fn test_command_response_from_error_keeps_kind() {
        let result: Result<String, AppError> = Err(AppError::not_found("workspace ws-9"));
        let response = CommandResponse::from(result);
        assert!(!response.success);
        assert_eq!(response.error_kind, Some(ErrorKind::NotFound));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error_kind"], "not_found");
    }
}

//! BrAPI response envelope
//!
//! Every body has the shape `{ "metadata": { "pagination", "status", "datafiles" }, "result" }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Info,
    Warning,
    Error,
}

/// One entry of `metadata.status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub message_type: MessageType,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub pagination: Map<String, Value>,
    pub status: Vec<Status>,
    pub datafiles: Vec<Value>,
}

/// Standard BrAPI response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub metadata: Metadata,
    pub result: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response with a single INFO status
    pub fn info(result: T, message: impl Into<String>) -> Self {
        Self {
            metadata: Metadata {
                status: vec![Status {
                    message_type: MessageType::Info,
                    message: message.into(),
                }],
                ..Metadata::default()
            },
            result,
        }
    }

    /// Attach links to files the result refers to
    pub fn with_datafiles(mut self, datafiles: Vec<Value>) -> Self {
        self.metadata.datafiles = datafiles;
        self
    }
}

impl ApiResponse<Map<String, Value>> {
    /// Failure response: an ERROR status and an empty result object
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            metadata: Metadata {
                status: vec![Status {
                    message_type: MessageType::Error,
                    message: message.into(),
                }],
                ..Metadata::default()
            },
            result: Map::new(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

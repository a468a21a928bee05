//! Error responses shared by the HTTP routes and the WebSocket actor.
//!
//! Every layer's error type implements [`IntoErrorResponse`], which gives it a
//! machine-readable code, a message, an HTTP status and a logging severity.
use serde::{Deserialize, Serialize};
use std::fmt;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

use crate::events::ServerEvent;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g. "match_not_found")
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn into_response(self, status: StatusCode) -> Response {
        reply::with_status(reply::json(&self), status).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Rejected input, part of normal operation
    Client,
    /// Unexpected failure worth investigating
    Server,
    /// Shared state can no longer be trusted
    Critical,
}

pub trait IntoErrorResponse {
    fn status_code(&self) -> StatusCode;

    fn error_code(&self) -> &'static str;

    fn error_message(&self) -> String;

    fn error_details(&self) -> Option<serde_json::Value> {
        None
    }

    fn severity(&self) -> ErrorSeverity {
        if self.status_code().is_server_error() {
            ErrorSeverity::Server
        } else {
            ErrorSeverity::Client
        }
    }

    fn to_error_response(&self) -> ErrorResponse {
        if let Some(details) = self.error_details() {
            ErrorResponse::with_details(self.error_code(), self.error_message(), details)
        } else {
            ErrorResponse::new(self.error_code(), self.error_message())
        }
    }

    /// The `ERROR` event a connection receives for this failure.
    fn to_server_event(&self) -> ServerEvent {
        log_error(&self.to_error_response(), self.severity());
        ServerEvent::error(self.error_code(), self.error_message())
    }

    fn into_http_response(self) -> Response
    where
        Self: Sized,
    {
        let status = self.status_code();
        let error_response = self.to_error_response();
        log_error(&error_response, self.severity());
        error_response.into_response(status)
    }
}

fn log_error(error: &ErrorResponse, severity: ErrorSeverity) {
    match severity {
        ErrorSeverity::Client => {
            tracing::debug!(code = %error.error, message = %error.message, "request rejected")
        }
        ErrorSeverity::Server => {
            tracing::warn!(code = %error.error, message = %error.message, "server error")
        }
        ErrorSeverity::Critical => {
            tracing::error!(code = %error.error, message = %error.message, "critical error")
        }
    }
}

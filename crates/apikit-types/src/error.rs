//! Error type shared by every apikit crate.
//!
//! Errors render as `{"error": {"code": "E-…", "message": …}}` with the
//! matching HTTP status when returned from an axum handler.

use std::collections::BTreeMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type ApiResult<T> = std::result::Result<T, Error>;

/// Per-field validation messages produced by a serializer
pub type FieldErrors = BTreeMap<Box<str>, Vec<Box<str>>>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	PermissionDenied,
	Unauthorized,
	/// Token was presented but could not be validated
	AuthenticationFailed(String),
	ValidationError(String),
	/// Payload rejected by a serializer
	Invalid(FieldErrors),
	Parse,
	/// Developer-facing misconfiguration (viewset or action configuration)
	ConfigError(String),
	/// Failure reported by (or while calling) a remote JSON-RPC service
	Rpc {
		message: String,
		status: StatusCode,
		code: &'static str,
	},
	/// Failure reported by (or while calling) an AWS API gateway
	Aws {
		message: String,
		status: StatusCode,
		code: &'static str,
	},
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl Error {
	pub fn config(msg: impl Into<String>) -> Self {
		Self::ConfigError(msg.into())
	}

	pub fn rpc(message: impl Into<String>) -> Self {
		Self::Rpc {
			message: message.into(),
			status: StatusCode::INTERNAL_SERVER_ERROR,
			code: "server_error",
		}
	}

	pub fn aws(message: impl Into<String>) -> Self {
		Self::Aws {
			message: message.into(),
			status: StatusCode::INTERNAL_SERVER_ERROR,
			code: "server_error",
		}
	}

	/// Single-field validation failure
	pub fn invalid_field(field: &str, message: &str) -> Self {
		let mut errors = FieldErrors::new();
		errors.insert(field.into(), vec![message.into()]);
		Self::Invalid(errors)
	}

	pub fn status(&self) -> StatusCode {
		match self {
			Error::NotFound => StatusCode::NOT_FOUND,
			Error::PermissionDenied => StatusCode::FORBIDDEN,
			Error::Unauthorized | Error::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
			Error::ValidationError(_) | Error::Invalid(_) | Error::Parse => StatusCode::BAD_REQUEST,
			Error::Rpc { status, .. } | Error::Aws { status, .. } => *status,
			Error::ConfigError(_) | Error::Internal(_) | Error::Io(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}

	fn code(&self) -> &'static str {
		match self {
			Error::NotFound => "E-NOT-FOUND",
			Error::PermissionDenied => "E-PERMISSION-DENIED",
			Error::Unauthorized | Error::AuthenticationFailed(_) => "E-UNAUTHORIZED",
			Error::ValidationError(_) | Error::Invalid(_) => "E-VALIDATION",
			Error::Parse => "E-PARSE",
			Error::ConfigError(_) => "E-CONFIG",
			Error::Rpc { .. } => "E-RPC",
			Error::Aws { .. } => "E-AWS",
			Error::Internal(_) | Error::Io(_) => "E-INTERNAL",
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		tracing::debug!("JSON error: {}", err);
		Self::Parse
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::NotFound => write!(f, "Not found"),
			Error::PermissionDenied => write!(f, "Permission denied"),
			Error::Unauthorized => write!(f, "Authentication credentials were not provided"),
			Error::AuthenticationFailed(msg)
			| Error::ValidationError(msg)
			| Error::ConfigError(msg)
			| Error::Internal(msg) => write!(f, "{}", msg),
			Error::Invalid(errors) => {
				let fields: Vec<&str> = errors.keys().map(AsRef::as_ref).collect();
				write!(f, "Invalid input: {}", fields.join(", "))
			}
			Error::Parse => write!(f, "Malformed request"),
			Error::Rpc { message, .. } | Error::Aws { message, .. } => write!(f, "{}", message),
			Error::Io(err) => write!(f, "IO error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = self.status();
		let body = match &self {
			Error::Invalid(errors) => serde_json::json!({
				"error": {
					"code": self.code(),
					"message": "Invalid input.",
					"details": errors,
				}
			}),
			Error::Rpc { code, .. } | Error::Aws { code, .. } => serde_json::json!({
				"error": {
					"code": self.code(),
					"message": self.to_string(),
					"details": { "upstreamCode": code },
				}
			}),
			// Internal details stay in the log
			Error::ConfigError(_) | Error::Internal(_) | Error::Io(_) => {
				tracing::error!(error = %self, "request failed");
				serde_json::json!({
					"error": {
						"code": self.code(),
						"message": "Internal server error",
					}
				})
			}
			_ => serde_json::json!({
				"error": {
					"code": self.code(),
					"message": self.to_string(),
				}
			}),
		};

		(status, Json(body)).into_response()
	}
}


// vim: ts=4

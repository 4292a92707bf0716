//! Error types for the admin site

use crate::export::ExportError;
use crate::path::PathError;
use http::StatusCode;
use plinth_db::{DbError, QueryError, SchemaError};
use thiserror::Error;

/// Admin site error type
#[derive(Debug, Error)]
pub enum AdminError {
	/// Entity type not registered with the admin site
	#[error("Model '{0}' is not registered with admin")]
	ModelNotRegistered(String),

	/// Unknown route or primary key
	#[error("Not found: {0}")]
	NotFound(String),

	/// The logged-in user may not use the admin
	#[error("Permission denied: {0}")]
	PermissionDenied(String),

	/// Malformed request data
	#[error("Bad request: {0}")]
	BadRequest(String),

	/// A field path named by the request does not resolve
	#[error(transparent)]
	Path(#[from] PathError),

	/// Export preparation or streaming failed
	#[error(transparent)]
	Export(#[from] ExportError),

	/// Database error
	#[error("Database error: {0}")]
	Database(#[from] DbError),

	/// Query could not be compiled
	#[error("Query error: {0}")]
	Query(#[from] QueryError),

	/// Schema lookup failed
	#[error("Schema error: {0}")]
	Schema(#[from] SchemaError),

	/// Settings could not be loaded or are invalid
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Result type for admin operations
pub type AdminResult<T> = Result<T, AdminError>;

impl AdminError {
	/// HTTP status this error is reported with
	pub fn status(&self) -> StatusCode {
		match self {
			AdminError::ModelNotRegistered(_) | AdminError::NotFound(_) => StatusCode::NOT_FOUND,
			AdminError::PermissionDenied(_) => StatusCode::FORBIDDEN,
			AdminError::BadRequest(_) | AdminError::Path(_) => StatusCode::BAD_REQUEST,
			AdminError::Export(err) => err.status(),
			AdminError::Database(_)
			| AdminError::Query(_)
			| AdminError::Schema(_)
			| AdminError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Message safe to show to clients
	///
	/// Server-side failures are reported generically; details only go to the log.
	pub fn public_message(&self) -> String {
		if self.status().is_server_error() {
			match self {
				AdminError::Database(_) | AdminError::Export(ExportError::Database(_)) => {
					"Database operation failed".to_string()
				}
				_ => "Internal server error".to_string(),
			}
		} else {
			self.to_string()
		}
	}
}

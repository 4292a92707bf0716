//! Request parsing and response construction

use crate::error::{AdminError, AdminResult};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use http::header::{CONTENT_TYPE, LOCATION};
use http::{Extensions, HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use serde::Serialize;
use serde_json::json;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body of every admin route, buffered or streamed
pub type AdminBody = UnsyncBoxBody<Bytes, BoxError>;

/// A request with its query string and urlencoded form decoded
#[derive(Debug)]
pub struct AdminRequest {
	pub method: Method,
	pub path: String,
	pub headers: HeaderMap,
	pub extensions: Extensions,
	raw_query: Option<String>,
	query: Vec<(String, String)>,
	form: Vec<(String, String)>,
}

impl AdminRequest {
	pub fn from_http(request: Request<Bytes>) -> AdminResult<Self> {
		let (parts, body) = request.into_parts();
		let raw_query = parts.uri.query().map(str::to_string);
		let query = match &raw_query {
			Some(raw) => serde_urlencoded::from_str(raw)
				.map_err(|e| AdminError::BadRequest(format!("malformed query string: {}", e)))?,
			None => Vec::new(),
		};
		let form = if parts.method == Method::POST && is_urlencoded(&parts.headers) {
			serde_urlencoded::from_bytes(&body)
				.map_err(|e| AdminError::BadRequest(format!("malformed form body: {}", e)))?
		} else {
			Vec::new()
		};
		Ok(Self {
			method: parts.method,
			path: parts.uri.path().to_string(),
			headers: parts.headers,
			extensions: parts.extensions,
			raw_query,
			query,
			form,
		})
	}

	/// Path plus query string, as the client sent it
	pub fn full_path(&self) -> String {
		match &self.raw_query {
			Some(raw) if !raw.is_empty() => format!("{}?{}", self.path, raw),
			_ => self.path.clone(),
		}
	}

	pub fn raw_query(&self) -> &str {
		self.raw_query.as_deref().unwrap_or("")
	}

	pub fn is_post(&self) -> bool {
		self.method == Method::POST
	}

	pub fn query(&self) -> &[(String, String)] {
		&self.query
	}

	pub fn query_value(&self, key: &str) -> Option<&str> {
		lookup(&self.query, key).next()
	}

	pub fn query_values(&self, key: &str) -> Vec<&str> {
		lookup(&self.query, key).collect()
	}

	pub fn form(&self) -> &[(String, String)] {
		&self.form
	}

	pub fn form_value(&self, key: &str) -> Option<&str> {
		lookup(&self.form, key).next()
	}

	pub fn form_values(&self, key: &str) -> Vec<&str> {
		lookup(&self.form, key).collect()
	}
}

fn lookup<'a, 'k>(pairs: &'a [(String, String)], key: &'k str) -> impl Iterator<Item = &'a str> {
	pairs
		.iter()
		.filter(move |(k, _)| k == key)
		.map(|(_, v)| v.as_str())
}

fn is_urlencoded(headers: &HeaderMap) -> bool {
	match headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
		Some(value) => value.starts_with("application/x-www-form-urlencoded"),
		None => true,
	}
}

pub fn full_body(bytes: impl Into<Bytes>) -> AdminBody {
	Full::new(bytes.into())
		.map_err(|never| match never {})
		.boxed_unsync()
}

/// Body forwarding each chunk of `stream` as it is produced
pub fn stream_body<S, E>(stream: S) -> AdminBody
where
	S: Stream<Item = Result<Bytes, E>> + Send + 'static,
	E: Into<BoxError> + 'static,
{
	StreamBody::new(stream.map(|chunk| {
		chunk
			.map(Frame::data)
			.map_err(|e| -> BoxError { e.into() })
	}))
	.boxed_unsync()
}

pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response<AdminBody> {
	match serde_json::to_vec(value) {
		Ok(bytes) => {
			let mut response = Response::new(full_body(bytes));
			*response.status_mut() = status;
			response
				.headers_mut()
				.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
			response
		}
		Err(e) => {
			tracing::error!(error = %e, "cannot serialize response context");
			let mut response = Response::new(full_body("Internal server error"));
			*response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
			response
		}
	}
}

/// 302 to `location`
pub fn redirect(location: &str) -> Response<AdminBody> {
	match HeaderValue::from_str(location) {
		Ok(value) => {
			let mut response = Response::new(full_body(Bytes::new()));
			*response.status_mut() = StatusCode::FOUND;
			response.headers_mut().insert(LOCATION, value);
			response
		}
		Err(_) => error_response(&AdminError::BadRequest("invalid redirect target".to_string())),
	}
}

pub fn error_response(err: &AdminError) -> Response<AdminBody> {
	let status = err.status();
	if status.is_server_error() {
		tracing::error!(error = %err, "admin request failed");
	} else {
		tracing::debug!(error = %err, status = status.as_u16(), "admin request rejected");
	}
	json_response(
		status,
		&json!({
			"error": err.public_message(),
			"status": status.as_u16(),
		}),
	)
}

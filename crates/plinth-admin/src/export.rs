//! Streaming JSON export
//!
//! [`ExportEngine::prepare_query`] rewrites a (filtered, ordered) query so that
//! it selects exactly the requested field paths, joining every relation those
//! paths walk through. [`stream_serialize`] then turns the row cursor into a
//! JSON array, one row per chunk.

use crate::http::{AdminBody, stream_body};
use crate::path::PathError;
use crate::related::RelatedFieldMap;
use crate::serializer::serialize_row;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::{HeaderValue, Response, StatusCode};
use plinth_db::{DbError, EntityType, Join, LOOKUP_SEP, QueryError, ROOT_PATH, RowStream, Schema, SelectQuery, SelectedColumn};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
	#[error(transparent)]
	Path(#[from] PathError),

	#[error("no fields selected for export")]
	NoFields,

	#[error("export query error: {0}")]
	Query(#[from] QueryError),

	#[error("export database error: {0}")]
	Database(#[from] DbError),

	#[error("export serialization error: {0}")]
	Serialize(#[from] serde_json::Error),
}

impl ExportError {
	pub fn status(&self) -> StatusCode {
		match self {
			ExportError::Path(_) | ExportError::NoFields => StatusCode::BAD_REQUEST,
			ExportError::Query(_) | ExportError::Database(_) | ExportError::Serialize(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}
}

/// Chunked export body
pub type ExportStream = BoxStream<'static, Result<Bytes, ExportError>>;

/// Query rewriting for a set of export paths
pub struct ExportEngine<'a> {
	schema: &'a Schema,
	related: &'a RelatedFieldMap,
}

impl<'a> ExportEngine<'a> {
	pub fn new(schema: &'a Schema, related: &'a RelatedFieldMap) -> Self {
		Self { schema, related }
	}

	/// Select exactly `selected` (request order, duplicates ignored) on top of `base`
	///
	/// Paths without `__` name root fields; the others must name a field listed
	/// in the related-field map under their ancestor path.
	pub fn prepare_query(&self, base: SelectQuery, selected: &[String]) -> Result<SelectQuery, ExportError> {
		if selected.is_empty() {
			return Err(ExportError::NoFields);
		}
		let mut query = base.only(&[]);
		for path in selected {
			match path.rsplit_once(LOOKUP_SEP) {
				Some((ancestor, column)) => {
					self.check_related_column(query.root(), ancestor, column)?;
					self.ensure_join(&mut query, ancestor)?;
					query.select(ancestor, column);
				}
				None => {
					let root = query.root();
					if root.field(path).is_none() {
						tracing::warn!(entity = root.name(), path = %path, "unknown export field");
						return Err(PathError::UnknownField {
							entity: root.name().to_string(),
							segment: path.clone(),
						}
						.into());
					}
					query.select(ROOT_PATH, path.as_str());
				}
			}
		}
		Ok(query)
	}

	fn check_related_column(&self, root: &EntityType, ancestor: &str, column: &str) -> Result<(), PathError> {
		let entity = self.related.entity_for_path(ancestor).ok_or_else(|| {
			tracing::warn!(entity = root.name(), path = ancestor, "export path is not reachable");
			PathError::Unreachable {
				entity: root.name().to_string(),
				path: ancestor.to_string(),
			}
		})?;
		let known = self
			.related
			.fields_for_path(ancestor)
			.is_some_and(|fields| fields.iter().any(|f| f.name == column));
		if !known {
			tracing::warn!(entity = entity.name(), field = column, "unknown export field");
			return Err(PathError::UnknownField {
				entity: entity.name().to_string(),
				segment: column.to_string(),
			});
		}
		Ok(())
	}

	/// Join `path` and every ancestor of it, ancestors first
	fn ensure_join(&self, query: &mut SelectQuery, path: &str) -> Result<(), ExportError> {
		if query.joins().contains(path) {
			return Ok(());
		}
		let (parent, name) = path.rsplit_once(LOOKUP_SEP).unwrap_or((ROOT_PATH, path));
		if !parent.is_empty() {
			self.ensure_join(query, parent)?;
		}
		let owner = query
			.entity_at(parent)
			.ok_or_else(|| QueryError::UnknownJoin(parent.to_string()))?;
		let field = owner.field(name).ok_or_else(|| PathError::UnknownField {
			entity: owner.name().to_string(),
			segment: name.to_string(),
		})?;
		let target = self.schema.related(field).ok_or_else(|| PathError::NotARelation {
			entity: owner.name().to_string(),
			segment: name.to_string(),
		})?;
		let join = Join::new(parent, field.clone(), Arc::clone(target));
		query.join(join)?;
		Ok(())
	}
}

/// Serialize rows as a JSON array while the cursor advances
///
/// The array opens with `[\n`, rows are separated by `,\n` and it closes with
/// `\n]`, so an empty result is `[\n\n]`. A database error ends the stream
/// after yielding the error.
pub fn stream_serialize(columns: Vec<SelectedColumn>, mut rows: RowStream) -> ExportStream {
	Box::pin(async_stream::stream! {
		yield Ok(Bytes::from_static(b"[\n"));
		let mut count = 0u64;
		while let Some(row) = rows.next().await {
			let row = match row {
				Ok(row) => row,
				Err(e) => {
					tracing::error!(error = %e, rows = count, "export cursor failed");
					yield Err(ExportError::Database(e));
					return;
				}
			};
			let mut chunk = if count == 0 { Vec::new() } else { b",\n".to_vec() };
			if let Err(e) = serde_json::to_writer(&mut chunk, &serialize_row(&columns, row)) {
				yield Err(ExportError::Serialize(e));
				return;
			}
			count += 1;
			yield Ok(Bytes::from(chunk));
		}
		tracing::debug!(rows = count, "export finished");
		yield Ok(Bytes::from_static(b"\n]"));
	})
}

pub fn export_filename(admin_name: &str) -> String {
	format!("export-{}.json", admin_name)
}

/// Attachment response streaming `stream`
pub fn export_response(filename: &str, stream: ExportStream) -> Response<AdminBody> {
	let mut response = Response::new(stream_body(stream));
	*response.status_mut() = StatusCode::OK;
	let headers = response.headers_mut();
	headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename={}", filename)) {
		headers.insert(CONTENT_DISPOSITION, value);
	}
	response
}

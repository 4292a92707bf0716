//! The executor contract the admin talks to.

use crate::error::{DbError, DbResult, QueryError};
use crate::query::{SelectQuery, SelectedColumn};
use crate::schema::{EntityType, FieldKind};
use crate::statement::{self, DbBackend, Values};
use crate::value::FieldValue;
use async_trait::async_trait;
use futures::stream::BoxStream;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// One decoded row, column values in select order
pub type Row = Vec<JsonValue>;

/// Lazily advanced row stream owning its connection
pub type RowStream = BoxStream<'static, DbResult<Row>>;

/// One row keyed by column key (`title`, `author__email`)
pub type Record = IndexMap<String, JsonValue>;

/// Executes SQL text rendered for [`Database::backend`]
///
/// Each column of a result row is decoded according to the matching entry
/// of `kinds`.
#[async_trait]
pub trait Database: Send + Sync {
	fn backend(&self) -> DbBackend;

	async fn fetch_all(&self, sql: &str, kinds: &[FieldKind]) -> DbResult<Vec<Row>>;

	/// Rows are produced as the cursor advances; dropping the stream releases the connection
	async fn fetch_stream(&self, sql: String, kinds: Vec<FieldKind>) -> DbResult<RowStream>;

	/// Runs a single-column integer query such as `SELECT COUNT(*)`
	async fn fetch_count(&self, sql: &str) -> DbResult<u64>;

	/// Returns the number of affected rows
	async fn execute(&self, sql: &str) -> DbResult<u64>;

	/// Runs every statement inside one transaction
	async fn execute_atomic(&self, statements: &[String]) -> DbResult<u64>;
}

/// Query-level helpers on top of the raw [`Database`] contract
#[async_trait]
pub trait DatabaseExt: Database {
	async fn fetch_records(&self, query: &SelectQuery) -> DbResult<Vec<Record>> {
		let compiled = query.compile(self.backend())?;
		let rows = self.fetch_all(&compiled.sql, &compiled.kinds()).await?;
		Ok(rows
			.into_iter()
			.map(|row| into_record(&compiled.columns, row))
			.collect())
	}

	async fn fetch_first(&self, query: &SelectQuery) -> DbResult<Option<Record>> {
		let query = query.clone().with_limit(1);
		Ok(self.fetch_records(&query).await?.into_iter().next())
	}

	async fn stream_rows(&self, query: &SelectQuery) -> DbResult<(Vec<SelectedColumn>, RowStream)> {
		let compiled = query.compile(self.backend())?;
		let kinds = compiled.kinds();
		let rows = self.fetch_stream(compiled.sql, kinds).await?;
		Ok((compiled.columns, rows))
	}

	async fn count_rows(&self, query: &SelectQuery) -> DbResult<u64> {
		let sql = query.compile_count(self.backend())?;
		self.fetch_count(&sql).await
	}

	/// Inserts one row and returns its primary key
	async fn insert_record(&self, entity: &EntityType, values: &Values) -> DbResult<JsonValue> {
		let stmt = statement::insert(entity, values)?;
		let sql = self.backend().render_insert(&stmt);
		let kinds = [entity.pk().kind.clone()];
		let rows = self.fetch_all(&sql, &kinds).await?;
		rows.into_iter()
			.next()
			.and_then(|row| row.into_iter().next())
			.ok_or_else(|| DbError::MissingPrimaryKey(entity.name().to_string()))
	}

	async fn update_record(&self, entity: &EntityType, pk: &FieldValue, values: &Values) -> DbResult<u64> {
		let stmt = statement::update(entity, pk, values)?;
		self.execute(&self.backend().render_update(&stmt)).await
	}
}

impl<T: Database + ?Sized> DatabaseExt for T {}

/// Pair each value with its column key
pub fn into_record(columns: &[SelectedColumn], row: Row) -> Record {
	columns.iter().map(SelectedColumn::key).zip(row).collect()
}

/// Typed primary key of a decoded record
pub fn record_pk(entity: &EntityType, record: &Record) -> Result<FieldValue, QueryError> {
	let pk = entity.pk();
	record
		.get(&pk.name)
		.and_then(|value| FieldValue::from_json(&pk.kind, value))
		.ok_or_else(|| QueryError::UnknownColumn {
			entity: entity.name().to_string(),
			field: pk.name.clone(),
		})
}

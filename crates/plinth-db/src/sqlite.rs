//! SQLite executor on top of `sqlx`.

use crate::connection::{Database, Row, RowStream};
use crate::error::{DbError, DbResult};
use crate::schema::FieldKind;
use crate::statement::DbBackend;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row as _;

/// [`Database`] backed by an `sqlx` SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
	pool: SqlitePool,
}

impl SqliteDatabase {
	pub async fn connect(url: &str) -> DbResult<Self> {
		let pool = SqlitePoolOptions::new().connect(url).await?;
		tracing::debug!(url, "connected to sqlite");
		Ok(Self { pool })
	}

	/// Single-connection in-memory database that lives as long as the pool
	pub async fn in_memory() -> DbResult<Self> {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
			.connect("sqlite::memory:")
			.await?;
		Ok(Self { pool })
	}

	pub fn from_pool(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}
}

/// Logs when a streamed cursor goes away, however the stream ended
struct CursorGuard;

impl Drop for CursorGuard {
	fn drop(&mut self) {
		tracing::debug!("export cursor released");
	}
}

fn decode_column(row: &SqliteRow, index: usize, kind: &FieldKind) -> DbResult<JsonValue> {
	let decode_err = |e: sqlx::Error| DbError::Decode {
		index,
		kind: kind.to_string(),
		message: e.to_string(),
	};
	let value = match kind {
		FieldKind::Integer => row
			.try_get::<Option<i64>, _>(index)
			.map_err(decode_err)?
			.map(JsonValue::from),
		FieldKind::Float => row
			.try_get::<Option<f64>, _>(index)
			.map_err(decode_err)?
			.and_then(serde_json::Number::from_f64)
			.map(JsonValue::Number),
		FieldKind::Boolean => row
			.try_get::<Option<bool>, _>(index)
			.map_err(decode_err)?
			.map(JsonValue::Bool),
		FieldKind::Text | FieldKind::Date | FieldKind::DateTime => row
			.try_get::<Option<String>, _>(index)
			.map_err(decode_err)?
			.map(JsonValue::String),
		// Keys are integers in the common case and text otherwise
		FieldKind::ForeignKey { .. } => match row.try_get::<Option<i64>, _>(index) {
			Ok(key) => key.map(JsonValue::from),
			Err(_) => row
				.try_get::<Option<String>, _>(index)
				.map_err(decode_err)?
				.map(JsonValue::String),
		},
	};
	Ok(value.unwrap_or(JsonValue::Null))
}

fn decode_row(row: &SqliteRow, kinds: &[FieldKind]) -> DbResult<Row> {
	kinds
		.iter()
		.enumerate()
		.map(|(index, kind)| decode_column(row, index, kind))
		.collect()
}

#[async_trait]
impl Database for SqliteDatabase {
	fn backend(&self) -> DbBackend {
		DbBackend::Sqlite
	}

	async fn fetch_all(&self, sql: &str, kinds: &[FieldKind]) -> DbResult<Vec<Row>> {
		tracing::trace!(sql, "fetch_all");
		let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
		rows.iter().map(|row| decode_row(row, kinds)).collect()
	}

	async fn fetch_stream(&self, sql: String, kinds: Vec<FieldKind>) -> DbResult<RowStream> {
		tracing::trace!(sql = %sql, "fetch_stream");
		let mut conn = self.pool.acquire().await?;
		let rows = async_stream::stream! {
			let _cursor = CursorGuard;
			let mut cursor = sqlx::query(&sql).fetch(&mut *conn);
			while let Some(next) = cursor.next().await {
				match next {
					Ok(row) => yield decode_row(&row, &kinds),
					Err(e) => {
						yield Err(DbError::from(e));
						break;
					}
				}
			}
		};
		Ok(Box::pin(rows))
	}

	async fn fetch_count(&self, sql: &str) -> DbResult<u64> {
		let row = sqlx::query(sql).fetch_one(&self.pool).await?;
		let count: i64 = row.try_get(0)?;
		Ok(u64::try_from(count).unwrap_or_default())
	}

	async fn execute(&self, sql: &str) -> DbResult<u64> {
		tracing::trace!(sql, "execute");
		let result = sqlx::query(sql).execute(&self.pool).await?;
		Ok(result.rows_affected())
	}

	async fn execute_atomic(&self, statements: &[String]) -> DbResult<u64> {
		let mut tx = self.pool.begin().await?;
		let mut affected = 0;
		for sql in statements {
			tracing::trace!(sql = %sql, "execute in transaction");
			affected += sqlx::query(sql).execute(&mut *tx).await?.rows_affected();
		}
		tx.commit().await?;
		Ok(affected)
	}
}

//! # Plinth Database
//!
//! Entity metadata and query composition for the Plinth admin.
//!
//! ## Overview
//!
//! - **Schema** ([`Schema`], [`EntityType`], [`Field`]): modeled record types and the
//!   relation graph between them, with forward and reverse adjacency computed once.
//! - **Queries** ([`SelectQuery`]): predicates, ordering, a join plan keyed by relation
//!   path, per-join column selection and pagination, compiled to SQL through sea-query.
//! - **Statements** ([`statement`]): insert, update, delete and nullify statements.
//! - **Execution** ([`Database`], [`DatabaseExt`]): the executor contract, with a
//!   streaming cursor for large reads, and [`SqliteDatabase`] implementing it on sqlx.
//!
//! ## Example
//!
//! ```rust,no_run
//! use plinth_db::{DatabaseExt, EntityType, Field, Schema, SelectQuery, SqliteDatabase};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Schema::builder()
//! 	.entity(
//! 		EntityType::builder("User")
//! 			.table("users")
//! 			.field(Field::id())
//! 			.field(Field::text("username")),
//! 	)
//! 	.build()?;
//!
//! let db = SqliteDatabase::connect("sqlite://app.db").await?;
//! let users = db
//! 	.fetch_records(&SelectQuery::new(schema.entity("User")?.clone()))
//! 	.await?;
//! println!("{} users", users.len());
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod query;
pub mod schema;
pub mod sqlite;
pub mod statement;
pub mod value;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use connection::{Database, DatabaseExt, Record, Row, RowStream, into_record, record_pk};
pub use error::{DbError, DbResult, QueryError, SchemaError};
pub use query::{
	CompiledSelect, Join, JoinPlan, KeyFilter, Lookup, OrderBy, Predicate, ROOT_PATH, SelectQuery,
	SelectedColumn, Selection, SortOrder, escape_like, table_alias,
};
pub use schema::{
	EntityType, EntityTypeBuilder, Field, FieldKind, LOOKUP_SEP, Relation, Schema, SchemaBuilder,
	humanize_field_name,
};
pub use sqlite::SqliteDatabase;
pub use statement::{DbBackend, Values};
pub use value::FieldValue;

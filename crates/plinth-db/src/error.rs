//! Error types for schema construction, query compilation and execution.

use thiserror::Error;

/// Errors raised while building a [`Schema`](crate::Schema).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
	/// Two entity types share a name
	#[error("entity type '{0}' is registered twice")]
	DuplicateEntity(String),

	/// Two fields of one entity share a name
	#[error("entity type '{entity}' declares field '{field}' twice")]
	DuplicateField { entity: String, field: String },

	/// No primary key field was declared
	#[error("entity type '{0}' has no primary key field")]
	MissingPrimaryKey(String),

	/// More than one primary key field was declared
	#[error("entity type '{0}' declares more than one primary key field")]
	MultiplePrimaryKeys(String),

	/// A relation points at an entity type that was never registered
	#[error("relation '{entity}.{field}' targets unknown entity type '{target}'")]
	UnknownRelationTarget {
		entity: String,
		field: String,
		target: String,
	},

	/// The configured display field does not exist
	#[error("display field '{field}' is not a field of '{entity}'")]
	UnknownDisplayField { entity: String, field: String },

	/// Lookup of an entity type that is not part of the schema
	#[error("entity type '{0}' is not registered")]
	UnknownEntity(String),
}

/// Errors raised while compiling a [`SelectQuery`](crate::SelectQuery) or a statement.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
	/// The query refers to a join path that is not part of its join plan
	#[error("join path '{0}' is not part of the query")]
	UnknownJoin(String),

	/// A selected, filtered or ordered column does not exist on its entity
	#[error("'{entity}' has no column for field '{field}'")]
	UnknownColumn { entity: String, field: String },

	/// The lookup cannot be applied to the value it was given
	#[error("lookup '{lookup}' cannot be applied to field '{field}' with the given value")]
	UnsupportedLookup { field: String, lookup: String },

	/// An insert or update was issued without any value
	#[error("no values given for '{0}'")]
	EmptyValues(String),

	/// sea-query rejected the statement
	#[error("statement building failed: {0}")]
	Build(String),
}

/// Errors raised by a [`Database`](crate::Database) executor.
#[derive(Debug, Error)]
pub enum DbError {
	/// Driver level failure
	#[error("database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	/// The query could not be compiled
	#[error(transparent)]
	Query(#[from] QueryError),

	/// A column value could not be decoded into its field kind
	#[error("cannot decode column {index} as {kind}: {message}")]
	Decode {
		index: usize,
		kind: String,
		message: String,
	},

	/// An insert did not report the generated primary key
	#[error("insert into '{0}' returned no primary key")]
	MissingPrimaryKey(String),
}

/// Result alias for executor operations
pub type DbResult<T> = Result<T, DbError>;

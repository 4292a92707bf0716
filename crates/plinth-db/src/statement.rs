//! Backend selection and the insert/update/delete statements the admin issues.

use crate::error::QueryError;
use crate::schema::{EntityType, Field};
use crate::value::FieldValue;
use indexmap::IndexMap;
use sea_query::{
	Alias, DeleteStatement, Expr, ExprTrait, InsertStatement, MysqlQueryBuilder,
	PostgresQueryBuilder, Query, SelectStatement, SqliteQueryBuilder, UpdateStatement,
};

/// Database backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbBackend {
	Postgres,
	Mysql,
	Sqlite,
}

impl DbBackend {
	pub fn render_select(&self, stmt: &SelectStatement) -> String {
		match self {
			DbBackend::Postgres => stmt.to_string(PostgresQueryBuilder),
			DbBackend::Mysql => stmt.to_string(MysqlQueryBuilder),
			DbBackend::Sqlite => stmt.to_string(SqliteQueryBuilder),
		}
	}

	pub fn render_insert(&self, stmt: &InsertStatement) -> String {
		match self {
			DbBackend::Postgres => stmt.to_string(PostgresQueryBuilder),
			DbBackend::Mysql => stmt.to_string(MysqlQueryBuilder),
			DbBackend::Sqlite => stmt.to_string(SqliteQueryBuilder),
		}
	}

	pub fn render_update(&self, stmt: &UpdateStatement) -> String {
		match self {
			DbBackend::Postgres => stmt.to_string(PostgresQueryBuilder),
			DbBackend::Mysql => stmt.to_string(MysqlQueryBuilder),
			DbBackend::Sqlite => stmt.to_string(SqliteQueryBuilder),
		}
	}

	pub fn render_delete(&self, stmt: &DeleteStatement) -> String {
		match self {
			DbBackend::Postgres => stmt.to_string(PostgresQueryBuilder),
			DbBackend::Mysql => stmt.to_string(MysqlQueryBuilder),
			DbBackend::Sqlite => stmt.to_string(SqliteQueryBuilder),
		}
	}
}

/// Field values of one row keyed by field name
pub type Values = IndexMap<String, FieldValue>;

fn column_of<'a>(entity: &'a EntityType, name: &str) -> Result<&'a Field, QueryError> {
	entity.field(name).ok_or_else(|| QueryError::UnknownColumn {
		entity: entity.name().to_string(),
		field: name.to_string(),
	})
}

/// `INSERT` of one row returning its primary key
pub fn insert(entity: &EntityType, values: &Values) -> Result<InsertStatement, QueryError> {
	if values.is_empty() {
		return Err(QueryError::EmptyValues(entity.name().to_string()));
	}
	let mut columns = Vec::with_capacity(values.len());
	let mut row = Vec::with_capacity(values.len());
	for (name, value) in values {
		columns.push(Alias::new(column_of(entity, name)?.column.clone()));
		row.push(Expr::val(value.to_sea_value()));
	}

	let mut stmt = Query::insert();
	stmt.into_table(Alias::new(entity.table().to_string()))
		.columns(columns)
		.values(row)
		.map_err(|e| QueryError::Build(e.to_string()))?
		.returning_col(Alias::new(entity.pk().column.clone()));
	Ok(stmt)
}

/// `UPDATE` of the row with primary key `pk`
pub fn update(entity: &EntityType, pk: &FieldValue, values: &Values) -> Result<UpdateStatement, QueryError> {
	if values.is_empty() {
		return Err(QueryError::EmptyValues(entity.name().to_string()));
	}
	let mut stmt = Query::update();
	stmt.table(Alias::new(entity.table().to_string()));
	for (name, value) in values {
		stmt.value(
			Alias::new(column_of(entity, name)?.column.clone()),
			value.to_sea_value(),
		);
	}
	stmt.and_where(Expr::col(Alias::new(entity.pk().column.clone())).eq(pk.to_sea_value()));
	Ok(stmt)
}

/// `DELETE` of the rows whose primary key is in `pks`
pub fn delete_by_pks(entity: &EntityType, pks: &[FieldValue]) -> DeleteStatement {
	let mut stmt = Query::delete();
	stmt.from_table(Alias::new(entity.table().to_string()))
		.and_where(
			Expr::col(Alias::new(entity.pk().column.clone()))
				.is_in(pks.iter().map(FieldValue::to_sea_value)),
		);
	stmt
}

/// `DELETE` of the rows whose `field` points into the given key subquery
pub fn delete_where_in(entity: &EntityType, field: &Field, keys: SelectStatement) -> DeleteStatement {
	let mut stmt = Query::delete();
	stmt.from_table(Alias::new(entity.table().to_string()))
		.and_where(Expr::col(Alias::new(field.column.clone())).in_subquery(keys));
	stmt
}

/// `UPDATE .. SET field = NULL` for the rows whose `field` points into the key subquery
pub fn nullify_where_in(entity: &EntityType, field: &Field, keys: SelectStatement) -> UpdateStatement {
	let mut stmt = Query::update();
	stmt.table(Alias::new(entity.table().to_string()))
		.value(Alias::new(field.column.clone()), FieldValue::Null.to_sea_value())
		.and_where(Expr::col(Alias::new(field.column.clone())).in_subquery(keys));
	stmt
}

//! Query description and SQL compilation.
//!
//! A [`SelectQuery`] is a backend-agnostic description of a read: the root
//! entity type, a join plan keyed by relation path, a column selection per
//! join, predicates, ordering and pagination. [`SelectQuery::compile`] turns
//! it into SQL text through sea-query for the requested [`DbBackend`].
//!
//! Join paths double as table aliases, so the same entity type reached via
//! two different relations (or a self-reference) gets two distinct joins.

use crate::error::QueryError;
use crate::schema::{EntityType, Field, FieldKind, LOOKUP_SEP};
use crate::statement::DbBackend;
use crate::value::FieldValue;
use indexmap::IndexMap;
use sea_query::{
	Alias, Condition, Expr, ExprTrait, Func, JoinType, LikeExpr, Order, Query, SelectStatement,
};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Join path of the root entity
pub const ROOT_PATH: &str = "";

const ROOT_ALIAS: &str = "r";

/// Table alias for a join path
///
/// The root is `r`; a relation path `author__profile` becomes `r__author__profile`.
pub fn table_alias(path: &str) -> String {
	if path.is_empty() {
		ROOT_ALIAS.to_string()
	} else {
		format!("{}{}{}", ROOT_ALIAS, LOOKUP_SEP, path)
	}
}

/// Comparison operator applied by a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lookup {
	Eq,
	Ne,
	Lt,
	Lte,
	Gt,
	Gte,
	In,
	Range,
	IContains,
	IStartsWith,
	IsNull,
}

impl Lookup {
	pub const ALL: [Lookup; 11] = [
		Lookup::Eq,
		Lookup::Ne,
		Lookup::Lt,
		Lookup::Lte,
		Lookup::Gt,
		Lookup::Gte,
		Lookup::In,
		Lookup::Range,
		Lookup::IContains,
		Lookup::IStartsWith,
		Lookup::IsNull,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Lookup::Eq => "eq",
			Lookup::Ne => "ne",
			Lookup::Lt => "lt",
			Lookup::Lte => "lte",
			Lookup::Gt => "gt",
			Lookup::Gte => "gte",
			Lookup::In => "in",
			Lookup::Range => "range",
			Lookup::IContains => "icontains",
			Lookup::IStartsWith => "istartswith",
			Lookup::IsNull => "isnull",
		}
	}
}

impl fmt::Display for Lookup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Lookup {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Lookup::ALL
			.iter()
			.copied()
			.find(|lookup| lookup.as_str() == s)
			.ok_or(())
	}
}

/// One condition on a column of the root or of a joined entity
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
	/// Join path of the entity owning the field (`""` for the root)
	pub path: String,
	/// Field name on that entity
	pub field: String,
	pub lookup: Lookup,
	pub value: FieldValue,
}

impl Predicate {
	pub fn new(
		path: impl Into<String>,
		field: impl Into<String>,
		lookup: Lookup,
		value: FieldValue,
	) -> Self {
		Self {
			path: path.into(),
			field: field.into(),
			lookup,
			value,
		}
	}
}

/// Restricts a root field to the primary keys selected by another query
#[derive(Debug, Clone, PartialEq)]
pub struct KeyFilter {
	pub field: String,
	pub keys: Box<SelectQuery>,
}

/// A left join from a parent path along one relation field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
	/// Relation path reaching the joined entity, also its alias
	pub path: String,
	/// Path of the entity holding the relation field
	pub parent: String,
	/// Relation field on the parent entity
	pub field: Field,
	/// Joined entity type
	pub entity: Arc<EntityType>,
}

impl Join {
	/// Join along `field` of the entity at `parent`
	///
	/// The join path is `parent__field` (or just `field` below the root).
	pub fn new(parent: impl Into<String>, field: Field, entity: Arc<EntityType>) -> Self {
		let parent = parent.into();
		let path = if parent.is_empty() {
			field.name.clone()
		} else {
			format!("{}{}{}", parent, LOOKUP_SEP, field.name)
		};
		Self {
			path,
			parent,
			field,
			entity,
		}
	}
}

/// The deduplicated joins of a query, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinPlan {
	joins: IndexMap<String, Join>,
}

impl JoinPlan {
	pub fn contains(&self, path: &str) -> bool {
		self.joins.contains_key(path)
	}

	pub fn get(&self, path: &str) -> Option<&Join> {
		self.joins.get(path)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Join> {
		self.joins.values()
	}

	pub fn len(&self) -> usize {
		self.joins.len()
	}

	pub fn is_empty(&self) -> bool {
		self.joins.is_empty()
	}

	/// Number of joins to the named entity type, across all paths
	pub fn count_entity(&self, entity: &str) -> usize {
		self.iter().filter(|j| j.entity.name() == entity).count()
	}

	/// Adds the join unless its path is already planned; returns whether it was added
	fn insert(&mut self, join: Join) -> bool {
		if self.joins.contains_key(&join.path) {
			return false;
		}
		self.joins.insert(join.path.clone(), join);
		true
	}
}

/// Columns a query returns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
	/// Every field of the root entity
	#[default]
	Wildcard,
	/// Explicit `(join path, field name)` pairs in output order
	Columns(Vec<(String, String)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
	Asc,
	Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
	pub path: String,
	pub field: String,
	pub order: SortOrder,
}

/// A column of a compiled query with its origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedColumn {
	/// Join path of the owning entity
	pub path: String,
	pub field: Field,
}

impl SelectedColumn {
	/// Path string addressing this column from the root (`title`, `author__email`)
	pub fn key(&self) -> String {
		if self.path.is_empty() {
			self.field.name.clone()
		} else {
			format!("{}{}{}", self.path, LOOKUP_SEP, self.field.name)
		}
	}
}

/// SQL text plus the description of each returned column
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSelect {
	pub sql: String,
	pub columns: Vec<SelectedColumn>,
}

impl CompiledSelect {
	/// Field kinds in column order, used to decode rows
	pub fn kinds(&self) -> Vec<FieldKind> {
		self.columns.iter().map(|c| c.field.kind.clone()).collect()
	}
}

/// Backend-agnostic description of a read over one root entity type
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use plinth_db::{DbBackend, EntityType, Field, FieldValue, Lookup, Predicate, SelectQuery, SortOrder};
///
/// let post = Arc::new(
/// 	EntityType::builder("Post")
/// 		.field(Field::id())
/// 		.field(Field::text("title"))
/// 		.build()
/// 		.unwrap(),
/// );
/// let query = SelectQuery::new(post)
/// 	.filter(Predicate::new("", "title", Lookup::Eq, FieldValue::Text("Hi".into())))
/// 	.order_by("", "id", SortOrder::Desc);
/// let sql = query.compile(DbBackend::Sqlite).unwrap().sql;
/// assert!(sql.contains(r#"WHERE "r"."title" = 'Hi'"#));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
	root: Arc<EntityType>,
	joins: JoinPlan,
	selection: Selection,
	predicates: Vec<Predicate>,
	key_filters: Vec<KeyFilter>,
	ordering: Vec<OrderBy>,
	limit: Option<u64>,
	offset: Option<u64>,
}

impl SelectQuery {
	pub fn new(root: Arc<EntityType>) -> Self {
		Self {
			root,
			joins: JoinPlan::default(),
			selection: Selection::Wildcard,
			predicates: Vec::new(),
			key_filters: Vec::new(),
			ordering: Vec::new(),
			limit: None,
			offset: None,
		}
	}

	pub fn root(&self) -> &Arc<EntityType> {
		&self.root
	}

	pub fn joins(&self) -> &JoinPlan {
		&self.joins
	}

	pub fn selection(&self) -> &Selection {
		&self.selection
	}

	pub fn predicates(&self) -> &[Predicate] {
		&self.predicates
	}

	pub fn ordering(&self) -> &[OrderBy] {
		&self.ordering
	}

	pub fn limit(&self) -> Option<u64> {
		self.limit
	}

	pub fn offset(&self) -> Option<u64> {
		self.offset
	}

	/// Entity type at a join path, the root for `""`
	pub fn entity_at(&self, path: &str) -> Option<&Arc<EntityType>> {
		if path.is_empty() {
			Some(&self.root)
		} else {
			self.joins.get(path).map(|j| &j.entity)
		}
	}

	/// Adds a join; the parent path must already be planned
	///
	/// Returns `Ok(false)` when the path is already joined.
	pub fn join(&mut self, join: Join) -> Result<bool, QueryError> {
		if !join.parent.is_empty() && !self.joins.contains(&join.parent) {
			return Err(QueryError::UnknownJoin(join.parent));
		}
		Ok(self.joins.insert(join))
	}

	/// Appends a predicate; all predicates are ANDed
	pub fn filter(mut self, predicate: Predicate) -> Self {
		self.predicates.push(predicate);
		self
	}

	pub fn add_predicate(&mut self, predicate: Predicate) {
		self.predicates.push(predicate);
	}

	/// Keep root rows whose `field` is one of the primary keys matched by `keys`
	///
	/// Renders as `field IN (SELECT pk ...)`, so chains of key filters nest.
	pub fn filter_in(mut self, field: impl Into<String>, keys: SelectQuery) -> Self {
		self.key_filters.push(KeyFilter {
			field: field.into(),
			keys: Box::new(keys),
		});
		self
	}

	pub fn key_filters(&self) -> &[KeyFilter] {
		&self.key_filters
	}

	pub fn order_by(mut self, path: impl Into<String>, field: impl Into<String>, order: SortOrder) -> Self {
		self.ordering.push(OrderBy {
			path: path.into(),
			field: field.into(),
			order,
		});
		self
	}

	pub fn clear_ordering(mut self) -> Self {
		self.ordering.clear();
		self
	}

	/// Adds a column to the selection, replacing the default wildcard
	///
	/// Returns whether the column was new.
	pub fn select(&mut self, path: impl Into<String>, field: impl Into<String>) -> bool {
		let column = (path.into(), field.into());
		if let Selection::Columns(columns) = &mut self.selection {
			if columns.contains(&column) {
				return false;
			}
			columns.push(column);
		} else {
			self.selection = Selection::Columns(vec![column]);
		}
		true
	}

	/// Restrict the selection to the given root fields
	pub fn only(mut self, fields: &[&str]) -> Self {
		self.selection = Selection::Columns(
			fields
				.iter()
				.map(|f| (ROOT_PATH.to_string(), f.to_string()))
				.collect(),
		);
		self
	}

	pub fn paginate(mut self, page: u64, per_page: u64) -> Self {
		let page = Ord::max(page, 1);
		self.limit = Some(per_page);
		self.offset = Some((page - 1) * per_page);
		self
	}

	pub fn with_limit(mut self, limit: u64) -> Self {
		self.limit = Some(limit);
		self
	}

	/// Columns this query returns, resolved against the entity types
	pub fn selected_columns(&self) -> Result<Vec<SelectedColumn>, QueryError> {
		match &self.selection {
			Selection::Wildcard => Ok(self
				.root
				.fields()
				.iter()
				.map(|field| SelectedColumn {
					path: ROOT_PATH.to_string(),
					field: field.clone(),
				})
				.collect()),
			Selection::Columns(columns) => columns
				.iter()
				.map(|(path, name)| {
					Ok(SelectedColumn {
						path: path.clone(),
						field: self.resolve_field(path, name)?.clone(),
					})
				})
				.collect(),
		}
	}

	fn resolve_field(&self, path: &str, name: &str) -> Result<&Field, QueryError> {
		let entity = self
			.entity_at(path)
			.ok_or_else(|| QueryError::UnknownJoin(path.to_string()))?;
		entity.field(name).ok_or_else(|| QueryError::UnknownColumn {
			entity: entity.name().to_string(),
			field: name.to_string(),
		})
	}

	fn column_expr(&self, path: &str, name: &str) -> Result<Expr, QueryError> {
		let field = self.resolve_field(path, name)?;
		Ok(Expr::col((
			Alias::new(table_alias(path)),
			Alias::new(field.column.clone()),
		)))
	}

	fn predicate_expr(&self, predicate: &Predicate) -> Result<Expr, QueryError> {
		let col = self.column_expr(&predicate.path, &predicate.field)?;
		let expr = match (predicate.lookup, &predicate.value) {
			(Lookup::IsNull, FieldValue::Bool(true)) => col.is_null(),
			(Lookup::IsNull, FieldValue::Bool(false)) => col.is_not_null(),
			(Lookup::Eq, FieldValue::Null) => col.is_null(),
			(Lookup::Ne, FieldValue::Null) => col.is_not_null(),
			(Lookup::Eq, value) if is_scalar(value) => col.eq(value.to_sea_value()),
			(Lookup::Ne, value) if is_scalar(value) => col.ne(value.to_sea_value()),
			(Lookup::Lt, value) if is_scalar(value) => col.lt(value.to_sea_value()),
			(Lookup::Lte, value) if is_scalar(value) => col.lte(value.to_sea_value()),
			(Lookup::Gt, value) if is_scalar(value) => col.gt(value.to_sea_value()),
			(Lookup::Gte, value) if is_scalar(value) => col.gte(value.to_sea_value()),
			(Lookup::In, FieldValue::List(items)) => {
				col.is_in(items.iter().map(FieldValue::to_sea_value))
			}
			(Lookup::Range, FieldValue::Range(low, high)) => {
				col.between(low.to_sea_value(), high.to_sea_value())
			}
			(Lookup::IContains, FieldValue::Text(needle)) => Func::lower(col).like(
				LikeExpr::new(format!("%{}%", escape_like(&needle.to_lowercase()))).escape('\\'),
			),
			(Lookup::IStartsWith, FieldValue::Text(prefix)) => Func::lower(col).like(
				LikeExpr::new(format!("{}%", escape_like(&prefix.to_lowercase()))).escape('\\'),
			),
			(lookup, _) => {
				return Err(QueryError::UnsupportedLookup {
					field: predicate.field.clone(),
					lookup: lookup.to_string(),
				});
			}
		};
		Ok(expr)
	}

	/// The ANDed predicates, `None` when unfiltered
	pub fn condition(&self) -> Result<Option<Condition>, QueryError> {
		if self.predicates.is_empty() && self.key_filters.is_empty() {
			return Ok(None);
		}
		let mut condition = Condition::all();
		for predicate in &self.predicates {
			condition = condition.add(self.predicate_expr(predicate)?);
		}
		for filter in &self.key_filters {
			let col = self.column_expr(ROOT_PATH, &filter.field)?;
			condition = condition.add(col.in_subquery(filter.keys.pk_subquery()?));
		}
		Ok(Some(condition))
	}

	fn base_statement(&self) -> Result<SelectStatement, QueryError> {
		let mut stmt = Query::select();
		stmt.from_as(
			Alias::new(self.root.table().to_string()),
			Alias::new(table_alias(ROOT_PATH)),
		);
		for join in self.joins.iter() {
			let parent = self
				.entity_at(&join.parent)
				.ok_or_else(|| QueryError::UnknownJoin(join.parent.clone()))?;
			if parent.field(&join.field.name).is_none() {
				return Err(QueryError::UnknownColumn {
					entity: parent.name().to_string(),
					field: join.field.name.clone(),
				});
			}
			stmt.join_as(
				JoinType::LeftJoin,
				Alias::new(join.entity.table().to_string()),
				Alias::new(table_alias(&join.path)),
				Expr::col((
					Alias::new(table_alias(&join.parent)),
					Alias::new(join.field.column.clone()),
				))
				.equals((
					Alias::new(table_alias(&join.path)),
					Alias::new(join.entity.pk().column.clone()),
				)),
			);
		}
		if let Some(condition) = self.condition()? {
			stmt.cond_where(condition);
		}
		Ok(stmt)
	}

	/// The complete statement, including selection, ordering and pagination
	pub fn to_statement(&self) -> Result<(SelectStatement, Vec<SelectedColumn>), QueryError> {
		let columns = self.selected_columns()?;
		let mut stmt = self.base_statement()?;
		for column in &columns {
			stmt.column((
				Alias::new(table_alias(&column.path)),
				Alias::new(column.field.column.clone()),
			));
		}
		for order in &self.ordering {
			let field = self.resolve_field(&order.path, &order.field)?;
			stmt.order_by(
				(
					Alias::new(table_alias(&order.path)),
					Alias::new(field.column.clone()),
				),
				match order.order {
					SortOrder::Asc => Order::Asc,
					SortOrder::Desc => Order::Desc,
				},
			);
		}
		if let Some(limit) = self.limit {
			stmt.limit(limit);
		}
		if let Some(offset) = self.offset {
			stmt.offset(offset);
		}
		Ok((stmt, columns))
	}

	/// Render SQL for `backend`
	pub fn compile(&self, backend: DbBackend) -> Result<CompiledSelect, QueryError> {
		let (stmt, columns) = self.to_statement()?;
		Ok(CompiledSelect {
			sql: backend.render_select(&stmt),
			columns,
		})
	}

	/// `SELECT COUNT(*)` over the same joins and predicates, ignoring pagination
	pub fn compile_count(&self, backend: DbBackend) -> Result<String, QueryError> {
		let mut stmt = self.base_statement()?;
		stmt.expr(Expr::cust("COUNT(*)"));
		Ok(backend.render_select(&stmt))
	}

	/// Subquery selecting the primary keys of matching root rows
	pub fn pk_subquery(&self) -> Result<SelectStatement, QueryError> {
		let mut stmt = self.base_statement()?;
		stmt.column((
			Alias::new(table_alias(ROOT_PATH)),
			Alias::new(self.root.pk().column.clone()),
		));
		Ok(stmt)
	}
}

fn is_scalar(value: &FieldValue) -> bool {
	!matches!(value, FieldValue::List(_) | FieldValue::Range(..))
}

/// Escape LIKE metacharacters with a backslash
pub fn escape_like(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());
	for ch in raw.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			out.push('\\');
		}
		out.push(ch);
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::*;

	fn entity(name: &str, table: &str, fields: Vec<Field>) -> Arc<EntityType> {
		let mut builder = EntityType::builder(name).table(table);
		for field in fields {
			builder = builder.field(field);
		}
		Arc::new(builder.build().unwrap())
	}

	#[fixture]
	fn user() -> Arc<EntityType> {
		entity("User", "users", vec![Field::id(), Field::text("email")])
	}

	#[fixture]
	fn post(user: Arc<EntityType>) -> (Arc<EntityType>, Arc<EntityType>) {
		let post = entity(
			"Post",
			"posts",
			vec![
				Field::id(),
				Field::text("title"),
				Field::integer("views"),
				Field::foreign_key("author", "User"),
			],
		);
		(post, user)
	}

	#[rstest]
	fn test_wildcard_selects_root_fields(post: (Arc<EntityType>, Arc<EntityType>)) {
		// Arrange
		let (post, _) = post;

		// Act
		let compiled = SelectQuery::new(post).compile(DbBackend::Sqlite).unwrap();

		// Assert
		assert_eq!(
			compiled.sql,
			r#"SELECT "r"."id", "r"."title", "r"."views", "r"."author_id" FROM "posts" AS "r""#
		);
		assert_eq!(compiled.columns.len(), 4);
	}

	#[rstest]
	fn test_join_is_deduplicated_per_path(post: (Arc<EntityType>, Arc<EntityType>)) {
		// Arrange
		let (post, user) = post;
		let author = post.field("author").unwrap().clone();
		let mut query = SelectQuery::new(post);

		// Act
		let first = query.join(Join::new("", author.clone(), Arc::clone(&user))).unwrap();
		let second = query.join(Join::new("", author, user)).unwrap();

		// Assert
		assert!(first);
		assert!(!second);
		assert_eq!(query.joins().len(), 1);
		assert_eq!(query.joins().count_entity("User"), 1);
	}

	#[rstest]
	fn test_join_requires_parent_path(post: (Arc<EntityType>, Arc<EntityType>)) {
		let (post, user) = post;
		let author = post.field("author").unwrap().clone();
		let mut query = SelectQuery::new(post);

		let result = query.join(Join::new("comment", author, user));

		assert_eq!(result, Err(QueryError::UnknownJoin("comment".into())));
	}

	#[rstest]
	fn test_compile_selected_columns_across_join(post: (Arc<EntityType>, Arc<EntityType>)) {
		// Arrange
		let (post, user) = post;
		let author = post.field("author").unwrap().clone();
		let mut query = SelectQuery::new(post);
		query.join(Join::new("", author, user)).unwrap();
		query.select("", "title");
		query.select("author", "email");
		query.select("", "title");

		// Act
		let compiled = query.compile(DbBackend::Sqlite).unwrap();

		// Assert
		assert_eq!(
			compiled.sql,
			concat!(
				r#"SELECT "r"."title", "r__author"."email" FROM "posts" AS "r" "#,
				r#"LEFT JOIN "users" AS "r__author" ON "r"."author_id" = "r__author"."id""#
			)
		);
		let keys: Vec<String> = compiled.columns.iter().map(SelectedColumn::key).collect();
		assert_eq!(keys, vec!["title", "author__email"]);
	}

	#[rstest]
	#[case(Lookup::Gte, FieldValue::Int(5), r#""r"."views" >= 5"#)]
	#[case(Lookup::Ne, FieldValue::Int(5), r#""r"."views" <> 5"#)]
	#[case(Lookup::IsNull, FieldValue::Bool(true), r#""r"."views" IS NULL"#)]
	#[case(Lookup::Eq, FieldValue::Null, r#""r"."views" IS NULL"#)]
	#[case(
		Lookup::In,
		FieldValue::List(vec![FieldValue::Int(1), FieldValue::Int(2)]),
		r#""r"."views" IN (1, 2)"#
	)]
	#[case(
		Lookup::Range,
		FieldValue::Range(Box::new(FieldValue::Int(1)), Box::new(FieldValue::Int(9))),
		r#""r"."views" BETWEEN 1 AND 9"#
	)]
	fn test_predicate_rendering(
		post: (Arc<EntityType>, Arc<EntityType>),
		#[case] lookup: Lookup,
		#[case] value: FieldValue,
		#[case] expected: &str,
	) {
		// Arrange
		let (post, _) = post;
		let query = SelectQuery::new(post).filter(Predicate::new("", "views", lookup, value));

		// Act
		let sql = query.compile(DbBackend::Sqlite).unwrap().sql;

		// Assert
		assert!(sql.ends_with(&format!("WHERE {}", expected)), "{}", sql);
	}

	#[rstest]
	fn test_icontains_is_lowercased_and_escaped(post: (Arc<EntityType>, Arc<EntityType>)) {
		// Arrange
		let (post, _) = post;
		let query = SelectQuery::new(post).filter(Predicate::new(
			"",
			"title",
			Lookup::IContains,
			FieldValue::Text("AB_c".into()),
		));

		// Act
		let sql = query.compile(DbBackend::Sqlite).unwrap().sql;

		// Assert
		assert!(sql.contains(r#"LOWER("r"."title") LIKE '%ab\_c%'"#), "{}", sql);
		assert!(sql.contains("ESCAPE"), "{}", sql);
	}

	#[rstest]
	fn test_unsupported_lookup_value_is_an_error(post: (Arc<EntityType>, Arc<EntityType>)) {
		let (post, _) = post;
		let query = SelectQuery::new(post).filter(Predicate::new(
			"",
			"views",
			Lookup::In,
			FieldValue::Int(3),
		));

		let result = query.compile(DbBackend::Sqlite);

		assert_eq!(
			result.unwrap_err(),
			QueryError::UnsupportedLookup {
				field: "views".into(),
				lookup: "in".into()
			}
		);
	}

	#[rstest]
	fn test_unknown_column_is_an_error(post: (Arc<EntityType>, Arc<EntityType>)) {
		let (post, _) = post;
		let mut query = SelectQuery::new(post);
		query.select("", "nope");

		assert_eq!(
			query.compile(DbBackend::Sqlite).unwrap_err(),
			QueryError::UnknownColumn {
				entity: "Post".into(),
				field: "nope".into()
			}
		);
	}

	#[rstest]
	fn test_ordering_and_pagination(post: (Arc<EntityType>, Arc<EntityType>)) {
		// Arrange
		let (post, _) = post;
		let query = SelectQuery::new(post)
			.only(&["id"])
			.order_by("", "views", SortOrder::Desc)
			.paginate(3, 20);

		// Act
		let sql = query.compile(DbBackend::Sqlite).unwrap().sql;

		// Assert
		assert_eq!(
			sql,
			r#"SELECT "r"."id" FROM "posts" AS "r" ORDER BY "r"."views" DESC LIMIT 20 OFFSET 40"#
		);
	}

	#[rstest]
	fn test_page_zero_is_first_page(post: (Arc<EntityType>, Arc<EntityType>)) {
		let (post, _) = post;
		let query = SelectQuery::new(post).only(&["id"]).paginate(0, 20);

		let sql = query.compile(DbBackend::Sqlite).unwrap().sql;

		assert_eq!(sql, r#"SELECT "r"."id" FROM "posts" AS "r" LIMIT 20 OFFSET 0"#);
	}

	#[rstest]
	fn test_count_ignores_pagination(post: (Arc<EntityType>, Arc<EntityType>)) {
		let (post, _) = post;
		let query = SelectQuery::new(post).paginate(2, 10);

		let sql = query.compile_count(DbBackend::Sqlite).unwrap();

		assert_eq!(sql, r#"SELECT COUNT(*) FROM "posts" AS "r""#);
	}

	#[rstest]
	fn test_key_filter_nests_pk_subquery(post: (Arc<EntityType>, Arc<EntityType>)) {
		// Arrange
		let (post, user) = post;
		let users = SelectQuery::new(user).filter(Predicate::new(
			"",
			"id",
			Lookup::Eq,
			FieldValue::Int(1),
		));
		let posts = SelectQuery::new(post).filter_in("author", users);

		// Act
		let sql = posts.pk_subquery().map(|stmt| DbBackend::Sqlite.render_select(&stmt)).unwrap();

		// Assert
		assert_eq!(
			sql,
			r#"SELECT "r"."id" FROM "posts" AS "r" WHERE "r"."author_id" IN (SELECT "r"."id" FROM "users" AS "r" WHERE "r"."id" = 1)"#
		);
	}

	#[rstest]
	#[case("50%_off\\", "50\\%\\_off\\\\")]
	#[case("plain", "plain")]
	fn test_escape_like(#[case] raw: &str, #[case] expected: &str) {
		assert_eq!(escape_like(raw), expected);
	}

	#[rstest]
	fn test_lookup_round_trips_through_str() {
		for lookup in Lookup::ALL {
			assert_eq!(lookup.as_str().parse::<Lookup>(), Ok(lookup));
		}
		assert!("contains".parse::<Lookup>().is_err());
	}
}

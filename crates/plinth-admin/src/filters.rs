//! Filter tree construction from request parameters
//!
//! Query-string keys have the form `<field path>[__<lookup>]`, for example
//! `title__icontains=rust` or `author__username=alice`. A key without a
//! lookup suffix compares for equality. Keys that do not name an eligible
//! field and lookup are not filters and are left alone, since pagination and
//! ordering share the same query string. Values that are empty or do not
//! parse for the field's kind are skipped.

use crate::path::{RelationHop, join_hops, resolve_field};
use indexmap::IndexMap;
use plinth_db::{
	EntityType, Field, FieldKind, FieldValue, LOOKUP_SEP, Lookup, Predicate, Schema, SelectQuery,
};
use serde::Serialize;
use std::sync::Arc;

const TEXT_LOOKUPS: &[Lookup] = &[
	Lookup::Eq,
	Lookup::Ne,
	Lookup::IContains,
	Lookup::IStartsWith,
	Lookup::In,
	Lookup::IsNull,
];
const NUMERIC_LOOKUPS: &[Lookup] = &[
	Lookup::Eq,
	Lookup::Ne,
	Lookup::Lt,
	Lookup::Lte,
	Lookup::Gt,
	Lookup::Gte,
	Lookup::In,
	Lookup::Range,
	Lookup::IsNull,
];
const TEMPORAL_LOOKUPS: &[Lookup] = &[
	Lookup::Eq,
	Lookup::Lt,
	Lookup::Lte,
	Lookup::Gt,
	Lookup::Gte,
	Lookup::Range,
	Lookup::IsNull,
];
const BOOLEAN_LOOKUPS: &[Lookup] = &[Lookup::Eq, Lookup::IsNull];
const RELATION_LOOKUPS: &[Lookup] = &[Lookup::Eq, Lookup::In, Lookup::IsNull];

/// Lookups offered for a field kind
pub fn lookups_for(kind: &FieldKind) -> &'static [Lookup] {
	match kind {
		FieldKind::Text => TEXT_LOOKUPS,
		FieldKind::Integer | FieldKind::Float => NUMERIC_LOOKUPS,
		FieldKind::Date | FieldKind::DateTime => TEMPORAL_LOOKUPS,
		FieldKind::Boolean => BOOLEAN_LOOKUPS,
		FieldKind::ForeignKey { .. } => RELATION_LOOKUPS,
	}
}

/// A condition on one field of a filter tree node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCondition {
	pub field: String,
	pub lookup: Lookup,
	/// Request text the value was parsed from
	pub raw: String,
	#[serde(skip)]
	pub value: FieldValue,
}

/// Filter conditions grouped along relation paths
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterTree {
	pub entity: String,
	pub conditions: Vec<FieldCondition>,
	/// Sub-filters keyed by relation field name
	pub children: IndexMap<String, FilterTree>,
}

impl FilterTree {
	pub fn new(entity: impl Into<String>) -> Self {
		Self {
			entity: entity.into(),
			conditions: Vec::new(),
			children: IndexMap::new(),
		}
	}

	/// Number of conditions in this node and below
	pub fn len(&self) -> usize {
		self.conditions.len() + self.children.values().map(FilterTree::len).sum::<usize>()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Node reached by a relation path, `""` being this node
	pub fn node(&self, path: &str) -> Option<&FilterTree> {
		if path.is_empty() {
			return Some(self);
		}
		path.split(LOOKUP_SEP)
			.try_fold(self, |node, segment| node.children.get(segment))
	}

	fn insert(&mut self, hops: &[RelationHop], condition: FieldCondition) {
		let mut node = self;
		for hop in hops {
			node = node
				.children
				.entry(hop.field.name.clone())
				.or_insert_with(|| FilterTree::new(hop.entity.name()));
		}
		node.conditions.push(condition);
	}
}

/// A filterable field for rendering the filter UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterField {
	pub name: String,
	pub path: String,
	pub verbose_name: String,
	pub kind: &'static str,
	/// Empty when only nested fields of a relation are filterable
	pub lookups: Vec<Lookup>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub related: Option<FieldTree>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldTree {
	pub entity: String,
	pub fields: Vec<FilterField>,
}

/// Outcome of [`FilterEngine::build_filter_tree`]
#[derive(Debug, Clone)]
pub struct FilterResult {
	pub tree: FilterTree,
	pub query: SelectQuery,
	/// Accepted `(key, raw value)` pairs in request order
	pub applied: Vec<(String, String)>,
}

/// Builds filter trees and refines queries for one admin's filter configuration
#[derive(Debug, Clone)]
pub struct FilterEngine<'a> {
	schema: &'a Schema,
	allowed: Option<&'a [String]>,
	excluded: &'a [String],
	max_depth: usize,
}

impl<'a> FilterEngine<'a> {
	pub fn new(schema: &'a Schema, max_depth: usize) -> Self {
		Self {
			schema,
			allowed: None,
			excluded: &[],
			max_depth,
		}
	}

	/// Restrict filtering to these paths
	pub fn with_allowed(mut self, allowed: Option<&'a [String]>) -> Self {
		self.allowed = allowed;
		self
	}

	/// Paths (and everything below them) that may not be filtered
	pub fn with_excluded(mut self, excluded: &'a [String]) -> Self {
		self.excluded = excluded;
		self
	}

	fn is_excluded(&self, path: &str) -> bool {
		self.excluded.iter().any(|ex| {
			path == ex
				|| path
					.strip_prefix(ex.as_str())
					.is_some_and(|rest| rest.starts_with(LOOKUP_SEP))
		})
	}

	fn is_allowed(&self, path: &str) -> bool {
		self.allowed
			.is_none_or(|allowed| allowed.iter().any(|p| p == path))
	}

	fn may_descend(&self, path: &str) -> bool {
		let prefix = format!("{}{}", path, LOOKUP_SEP);
		self.allowed
			.is_none_or(|allowed| allowed.iter().any(|p| p.starts_with(&prefix)))
	}

	/// Filterable fields of `root`, nested along relations up to the depth limit
	pub fn field_tree(&self, root: &Arc<EntityType>) -> FieldTree {
		self.walk(root, "", 0)
	}

	fn walk(&self, entity: &EntityType, prefix: &str, depth: usize) -> FieldTree {
		let mut fields = Vec::new();
		for field in entity.fields() {
			let path = if prefix.is_empty() {
				field.name.clone()
			} else {
				format!("{}{}{}", prefix, LOOKUP_SEP, field.name)
			};
			if self.is_excluded(&path) {
				continue;
			}
			let related = match self.schema.related(field) {
				Some(target) if depth < self.max_depth && self.may_descend(&path) => {
					let subtree = self.walk(target, &path, depth + 1);
					(!subtree.fields.is_empty()).then_some(subtree)
				}
				_ => None,
			};
			let eligible = self.is_allowed(&path);
			if !eligible && related.is_none() {
				continue;
			}
			fields.push(FilterField {
				name: field.name.clone(),
				verbose_name: field.verbose_name.clone(),
				kind: field.kind.label(),
				lookups: if eligible {
					lookups_for(&field.kind).to_vec()
				} else {
					Vec::new()
				},
				path,
				related,
			});
		}
		FieldTree {
			entity: entity.name().to_string(),
			fields,
		}
	}

	/// Resolve `path` if it is an eligible filter path
	fn eligible(&self, root: &EntityType, path: &str) -> Option<(Vec<RelationHop>, Field)> {
		if self.is_excluded(path) || !self.is_allowed(path) {
			return None;
		}
		let resolved = resolve_field(self.schema, root, path).ok()?;
		if resolved.hops.len() > self.max_depth {
			return None;
		}
		Some((resolved.hops, resolved.field))
	}

	/// Split a parameter key into an eligible field and its lookup
	fn parse_key(&self, root: &EntityType, key: &str) -> Option<(Vec<RelationHop>, Field, Lookup)> {
		if let Some((hops, field)) = self.eligible(root, key) {
			return Some((hops, field, Lookup::Eq));
		}
		let (path, suffix) = key.rsplit_once(LOOKUP_SEP)?;
		let lookup = suffix.parse::<Lookup>().ok()?;
		let (hops, field) = self.eligible(root, path)?;
		Some((hops, field, lookup))
	}

	fn parse_value(&self, field: &Field, lookup: Lookup, raw: &str) -> Option<FieldValue> {
		let kind = self.schema.value_kind(field);
		match lookup {
			Lookup::IsNull => FieldValue::parse(&FieldKind::Boolean, raw),
			Lookup::In => FieldValue::parse_list(kind, raw),
			Lookup::Range => FieldValue::parse_range(kind, raw),
			Lookup::IContains | Lookup::IStartsWith => FieldValue::parse(&FieldKind::Text, raw),
			_ => FieldValue::parse(kind, raw),
		}
	}

	/// Build the filter tree for `params` and refine `query` with its predicates
	///
	/// All predicates are ANDed. Related predicates add the joins they need.
	pub fn build_filter_tree(
		&self,
		root: &EntityType,
		params: &[(String, String)],
		query: SelectQuery,
	) -> FilterResult {
		let mut query = query;
		let mut tree = FilterTree::new(root.name());
		let mut applied = Vec::new();

		for (key, raw) in params {
			let Some((hops, field, lookup)) = self.parse_key(root, key) else {
				continue;
			};
			if !lookups_for(&field.kind).contains(&lookup) {
				tracing::debug!(key = %key, "lookup not supported for field kind, skipped");
				continue;
			}
			let Some(value) = self.parse_value(&field, lookup, raw) else {
				tracing::debug!(key = %key, raw = %raw, "empty or malformed filter value, skipped");
				continue;
			};
			let path = match join_hops(&mut query, &hops) {
				Ok(path) => path,
				Err(e) => {
					tracing::warn!(key = %key, error = %e, "cannot join filter path");
					continue;
				}
			};
			query.add_predicate(Predicate::new(path, field.name.clone(), lookup, value.clone()));
			tree.insert(
				&hops,
				FieldCondition {
					field: field.name.clone(),
					lookup,
					raw: raw.clone(),
					value,
				},
			);
			applied.push((key.clone(), raw.clone()));
		}

		FilterResult {
			tree,
			query,
			applied,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use plinth_db::testing::blog_schema;
	use plinth_db::{DbBackend, SelectQuery};
	use rstest::*;

	#[fixture]
	fn schema() -> Schema {
		blog_schema()
	}

	fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[rstest]
	fn test_icontains_builds_case_insensitive_predicate(schema: Schema) {
		// Arrange
		let post = schema.entity("Post").unwrap();
		let engine = FilterEngine::new(&schema, 3);

		// Act
		let result = engine.build_filter_tree(
			post,
			&params(&[("title__icontains", "abc")]),
			SelectQuery::new(Arc::clone(post)),
		);

		// Assert
		assert_eq!(
			result.query.predicates(),
			&[Predicate::new("", "title", Lookup::IContains, FieldValue::Text("abc".into()))]
		);
		let sql = result.query.compile(DbBackend::Sqlite).unwrap().sql;
		assert!(sql.contains(r#"LOWER("r"."title") LIKE '%abc%'"#), "{}", sql);
		assert_eq!(result.applied, params(&[("title__icontains", "abc")]));
	}

	#[rstest]
	fn test_empty_value_leaves_query_untouched(schema: Schema) {
		// Arrange
		let post = schema.entity("Post").unwrap();
		let base = SelectQuery::new(Arc::clone(post));
		let engine = FilterEngine::new(&schema, 3);

		// Act
		let result = engine.build_filter_tree(
			post,
			&params(&[("author__username", ""), ("views__gt", "")]),
			base.clone(),
		);

		// Assert
		assert_eq!(result.query, base);
		assert!(result.tree.is_empty());
		assert!(result.applied.is_empty());
	}

	#[rstest]
	fn test_related_filter_joins_and_nests(schema: Schema) {
		// Arrange
		let comment = schema.entity("Comment").unwrap();
		let engine = FilterEngine::new(&schema, 3);

		// Act
		let result = engine.build_filter_tree(
			comment,
			&params(&[
				("post__author__username", "alice"),
				("post__published", "1"),
				("page", "2"),
				("ordering", "-id"),
			]),
			SelectQuery::new(Arc::clone(comment)),
		);

		// Assert
		let joins: Vec<&str> = result.query.joins().iter().map(|j| j.path.as_str()).collect();
		assert_eq!(joins, vec!["post", "post__author"]);
		assert_eq!(result.tree.len(), 2);
		let post_node = result.tree.node("post").unwrap();
		assert_eq!(post_node.entity, "Post");
		assert_eq!(post_node.conditions[0].field, "published");
		let author_node = result.tree.node("post__author").unwrap();
		assert_eq!(author_node.entity, "User");
		assert_eq!(author_node.conditions[0].raw, "alice");
		assert_eq!(result.applied.len(), 2);
	}

	#[rstest]
	#[case("views__range", "1,20", Some(FieldValue::Range(Box::new(FieldValue::Int(1)), Box::new(FieldValue::Int(20)))))]
	#[case("views__range", "1", None)]
	#[case("views__in", "1,2", Some(FieldValue::List(vec![FieldValue::Int(1), FieldValue::Int(2)])))]
	#[case("views", "many", None)]
	#[case("created__gte", "2024-02-01", Some(FieldValue::Date(chrono_date(2024, 2, 1))))]
	#[case("rating__isnull", "yes", Some(FieldValue::Bool(true)))]
	#[case("published__gt", "1", None)]
	#[case("title__range", "a,b", None)]
	#[case("author", "2", Some(FieldValue::Int(2)))]
	#[case("author__in", "1,2", Some(FieldValue::List(vec![FieldValue::Int(1), FieldValue::Int(2)])))]
	#[case("author__icontains", "x", None)]
	#[case("nonexistent", "x", None)]
	fn test_value_parsing_per_kind(
		schema: Schema,
		#[case] key: &str,
		#[case] raw: &str,
		#[case] expected: Option<FieldValue>,
	) {
		// Arrange
		let post = schema.entity("Post").unwrap();
		let engine = FilterEngine::new(&schema, 3);

		// Act
		let result = engine.build_filter_tree(post, &params(&[(key, raw)]), SelectQuery::new(Arc::clone(post)));

		// Assert
		let values: Vec<FieldValue> = result.query.predicates().iter().map(|p| p.value.clone()).collect();
		assert_eq!(values, expected.into_iter().collect::<Vec<_>>());
	}

	fn chrono_date(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
		chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
	}

	#[rstest]
	fn test_excluded_paths_are_not_filters(schema: Schema) {
		// Arrange
		let post = schema.entity("Post").unwrap();
		let excluded = vec!["author__email".to_string(), "body".to_string()];
		let engine = FilterEngine::new(&schema, 3).with_excluded(&excluded);

		// Act
		let result = engine.build_filter_tree(
			post,
			&params(&[("author__email", "a@b.c"), ("body__icontains", "x"), ("author__username", "bob")]),
			SelectQuery::new(Arc::clone(post)),
		);

		// Assert
		assert_eq!(result.applied, params(&[("author__username", "bob")]));
	}

	#[rstest]
	fn test_allowed_set_restricts_filters(schema: Schema) {
		// Arrange
		let post = schema.entity("Post").unwrap();
		let allowed = vec!["title".to_string(), "author__username".to_string()];
		let engine = FilterEngine::new(&schema, 3).with_allowed(Some(&allowed));

		// Act
		let result = engine.build_filter_tree(
			post,
			&params(&[("views", "3"), ("author__username", "bob"), ("title", "x")]),
			SelectQuery::new(Arc::clone(post)),
		);
		let tree = engine.field_tree(post);

		// Assert
		assert_eq!(result.applied, params(&[("author__username", "bob"), ("title", "x")]));
		let names: Vec<&str> = tree.fields.iter().map(|f| f.name.as_str()).collect();
		assert_eq!(names, vec!["author", "title"]);
		let author = &tree.fields[0];
		assert!(author.lookups.is_empty());
		assert_eq!(author.related.as_ref().unwrap().fields[0].path, "author__username");
	}

	#[rstest]
	fn test_depth_limit_bounds_self_reference(schema: Schema) {
		// Arrange
		let category = schema.entity("Category").unwrap();
		let engine = FilterEngine::new(&schema, 2);

		// Act
		let tree = engine.field_tree(category);
		let result = engine.build_filter_tree(
			category,
			&params(&[("parent__parent__name", "Root"), ("parent__parent__parent__name", "x")]),
			SelectQuery::new(Arc::clone(category)),
		);

		// Assert
		let mut node = &tree;
		let mut levels = 0;
		while let Some(parent) = node.fields.iter().find(|f| f.name == "parent") {
			levels += 1;
			match &parent.related {
				Some(related) => node = related,
				None => break,
			}
		}
		assert_eq!(levels, 3);
		assert_eq!(result.applied.len(), 1);
	}

	#[rstest]
	#[case(FieldKind::Boolean, vec![Lookup::Eq, Lookup::IsNull])]
	#[case(FieldKind::ForeignKey { to: "User".into() }, vec![Lookup::Eq, Lookup::In, Lookup::IsNull])]
	fn test_lookup_table(#[case] kind: FieldKind, #[case] expected: Vec<Lookup>) {
		assert_eq!(lookups_for(&kind), expected.as_slice());
	}
}

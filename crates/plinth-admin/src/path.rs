//! Field path resolution
//!
//! A field path is a `__`-separated chain of relation field names, optionally
//! ending in a plain field: `author__profile__bio`.

use plinth_db::{EntityType, Field, Join, LOOKUP_SEP, QueryError, ROOT_PATH, Schema, SelectQuery};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
	#[error("field path is empty")]
	Empty,

	#[error("'{entity}' has no field named '{segment}'")]
	UnknownField { entity: String, segment: String },

	#[error("'{entity}.{segment}' is not a relation field")]
	NotARelation { entity: String, segment: String },

	#[error("'{path}' is not a relation path reachable from '{entity}'")]
	Unreachable { entity: String, path: String },

	#[error("entity type '{0}' is not registered")]
	UnregisteredType(String),
}

/// One step along a relation field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationHop {
	pub field: Field,
	pub entity: Arc<EntityType>,
}

/// A path ending in a field, with the relation hops leading to its entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
	pub hops: Vec<RelationHop>,
	pub field: Field,
}

impl ResolvedField {
	/// Join path of the entity owning the field (`""` for root fields)
	pub fn join_path(&self) -> String {
		hops_path(&self.hops)
	}
}

/// Join path for a hop chain
pub fn hops_path(hops: &[RelationHop]) -> String {
	hops.iter()
		.map(|hop| hop.field.name.as_str())
		.collect::<Vec<_>>()
		.join(LOOKUP_SEP)
}

fn segments(path: &str) -> Result<Vec<&str>, PathError> {
	if path.is_empty() {
		return Err(PathError::Empty);
	}
	let segments: Vec<&str> = path.split(LOOKUP_SEP).collect();
	if segments.iter().any(|s| s.is_empty()) {
		return Err(PathError::Empty);
	}
	Ok(segments)
}

fn hop(schema: &Schema, entity: &EntityType, segment: &str) -> Result<RelationHop, PathError> {
	let field = entity.field(segment).ok_or_else(|| PathError::UnknownField {
		entity: entity.name().to_string(),
		segment: segment.to_string(),
	})?;
	let target = field.related_entity().ok_or_else(|| PathError::NotARelation {
		entity: entity.name().to_string(),
		segment: segment.to_string(),
	})?;
	let entity = schema
		.get(target)
		.ok_or_else(|| PathError::UnregisteredType(target.to_string()))?;
	Ok(RelationHop {
		field: field.clone(),
		entity: Arc::clone(entity),
	})
}

/// Resolve a path made only of relation fields, one hop per segment
///
/// # Examples
///
/// ```
/// use plinth_admin::path::resolve;
/// use plinth_db::{EntityType, Field, Schema};
///
/// let schema = Schema::builder()
/// 	.entity(EntityType::builder("User").field(Field::id()))
/// 	.entity(
/// 		EntityType::builder("Post")
/// 			.field(Field::id())
/// 			.field(Field::foreign_key("author", "User")),
/// 	)
/// 	.build()
/// 	.unwrap();
///
/// let hops = resolve(&schema, schema.entity("Post").unwrap(), "author").unwrap();
/// assert_eq!(hops.last().unwrap().entity.name(), "User");
/// ```
pub fn resolve(schema: &Schema, root: &EntityType, path: &str) -> Result<Vec<RelationHop>, PathError> {
	let mut hops: Vec<RelationHop> = Vec::new();
	for segment in segments(path)? {
		let current = hops.last().map(|h| h.entity.as_ref()).unwrap_or(root);
		let next = hop(schema, current, segment)?;
		hops.push(next);
	}
	Ok(hops)
}

/// Resolve a path whose last segment may be any field of the last entity
pub fn resolve_field(schema: &Schema, root: &EntityType, path: &str) -> Result<ResolvedField, PathError> {
	let segments = segments(path)?;
	let (last, relations) = match segments.split_last() {
		Some(split) => split,
		None => return Err(PathError::Empty),
	};
	let mut hops: Vec<RelationHop> = Vec::with_capacity(relations.len());
	for segment in relations {
		let current = hops.last().map(|h| h.entity.as_ref()).unwrap_or(root);
		let next = hop(schema, current, segment)?;
		hops.push(next);
	}
	let owner = hops.last().map(|h| h.entity.as_ref()).unwrap_or(root);
	let field = owner.field(last).cloned().ok_or_else(|| PathError::UnknownField {
		entity: owner.name().to_string(),
		segment: last.to_string(),
	})?;
	Ok(ResolvedField { hops, field })
}

/// Ensure the query joins every hop, ancestors first; returns the final join path
pub fn join_hops(query: &mut SelectQuery, hops: &[RelationHop]) -> Result<String, QueryError> {
	let mut parent = ROOT_PATH.to_string();
	for hop in hops {
		let join = Join::new(parent, hop.field.clone(), Arc::clone(&hop.entity));
		parent = join.path.clone();
		query.join(join)?;
	}
	Ok(parent)
}

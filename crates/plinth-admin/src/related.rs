//! Exportable related fields of an entity type

use indexmap::IndexMap;
use plinth_db::{EntityType, Field, LOOKUP_SEP, Schema};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Key of one group of related fields
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RelatedKey {
	pub entity: String,
	pub path: String,
}

/// Non-relation fields reachable from a root, grouped by (entity, relation path)
///
/// The root entity's own fields are not part of the map.
#[derive(Debug, Clone, Default)]
pub struct RelatedFieldMap {
	groups: IndexMap<RelatedKey, Vec<Field>>,
	entities: HashMap<String, Arc<EntityType>>,
}

impl RelatedFieldMap {
	fn push(&mut self, entity: &Arc<EntityType>, path: &str, field: &Field) {
		self.groups
			.entry(RelatedKey {
				entity: entity.name().to_string(),
				path: path.to_string(),
			})
			.or_default()
			.push(field.clone());
		self.entities
			.entry(path.to_string())
			.or_insert_with(|| Arc::clone(entity));
	}

	pub fn get(&self, entity: &str, path: &str) -> Option<&[Field]> {
		self.groups
			.get(&RelatedKey {
				entity: entity.to_string(),
				path: path.to_string(),
			})
			.map(Vec::as_slice)
	}

	/// Entity type reached by a relation path
	pub fn entity_for_path(&self, path: &str) -> Option<&Arc<EntityType>> {
		self.entities.get(path)
	}

	pub fn fields_for_path(&self, path: &str) -> Option<&[Field]> {
		let entity = self.entities.get(path)?;
		self.get(entity.name(), path)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&RelatedKey, &[Field])> {
		self.groups.iter().map(|(key, fields)| (key, fields.as_slice()))
	}

	pub fn len(&self) -> usize {
		self.groups.len()
	}

	pub fn is_empty(&self) -> bool {
		self.groups.is_empty()
	}

	/// Field picker groups for the export page
	pub fn to_groups(&self) -> Vec<RelatedFieldGroup> {
		self.iter()
			.map(|(key, fields)| RelatedFieldGroup {
				entity: key.entity.clone(),
				path: key.path.clone(),
				fields: fields
					.iter()
					.map(|field| ExportField {
						key: format!("{}{}{}", key.path, LOOKUP_SEP, field.name),
						name: field.name.clone(),
						verbose_name: field.verbose_name.clone(),
					})
					.collect(),
			})
			.collect()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportField {
	/// Path to submit for this field
	pub key: String,
	pub name: String,
	pub verbose_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedFieldGroup {
	pub entity: String,
	pub path: String,
	pub fields: Vec<ExportField>,
}

/// Depth-first walk over relation fields collecting exportable fields
#[derive(Debug, Clone, Copy)]
pub struct RelatedFieldCollector<'a> {
	schema: &'a Schema,
	max_depth: usize,
}

impl<'a> RelatedFieldCollector<'a> {
	pub fn new(schema: &'a Schema, max_depth: usize) -> Self {
		Self { schema, max_depth }
	}

	/// Every non-relation field reachable from `root` through at most `max_depth` relations
	pub fn collect(&self, root: &Arc<EntityType>) -> RelatedFieldMap {
		let mut accum = RelatedFieldMap::default();
		let mut path = Vec::new();
		self.walk(root, &mut path, &mut accum);
		accum
	}

	fn walk(&self, entity: &Arc<EntityType>, path: &mut Vec<String>, accum: &mut RelatedFieldMap) {
		let joined = path.join(LOOKUP_SEP);
		for field in entity.fields() {
			if field.is_relation() {
				if path.len() >= self.max_depth {
					continue;
				}
				match self.schema.related(field) {
					Some(target) => {
						path.push(field.name.clone());
						self.walk(target, path, accum);
						path.pop();
					}
					None => {
						tracing::warn!(
							entity = entity.name(),
							field = %field.name,
							"relation target is not registered"
						);
					}
				}
			} else if !path.is_empty() {
				accum.push(entity, &joined, field);
			}
		}
	}
}

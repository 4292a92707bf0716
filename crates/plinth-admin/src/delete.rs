//! Dependent-row collection and cascading delete
//!
//! Collection walks the reverse relations of an entity type depth-first. Each
//! level is described by a query whose key filter nests the previous level's
//! primary-key subquery, so no key lists are materialized between levels.

use crate::error::{AdminError, AdminResult};
use crate::text::display_value;
use futures::FutureExt;
use futures::future::BoxFuture;
use plinth_db::{
	Database, DatabaseExt, EntityType, FieldValue, Lookup, Predicate, ROOT_PATH, Record, Relation,
	Schema, SelectQuery, SortOrder, statement,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// One dependent row, restricted to its key and display value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectedInstance {
	pub pk: JsonValue,
	pub repr: String,
}

impl CollectedInstance {
	/// Key and display text of a row selected through [`repr_query`]
	pub fn from_record(entity: &EntityType, record: &Record) -> Self {
		Self {
			pk: record.get(&entity.pk().name).cloned().unwrap_or(JsonValue::Null),
			repr: record
				.get(&entity.display_field().name)
				.map(display_value)
				.unwrap_or_default(),
		}
	}
}

/// Restrict `query` to the primary key and display field of its root
pub fn repr_query(query: SelectQuery) -> SelectQuery {
	let entity = Arc::clone(query.root());
	let pk = entity.pk();
	let display = entity.display_field();
	if display.name == pk.name {
		query.only(&[pk.name.as_str()])
	} else {
		query.only(&[pk.name.as_str(), display.name.as_str()])
	}
}

/// Dependent rows of one entity type reached along one reverse relation
#[derive(Debug, Clone, Serialize)]
pub struct CollectedObjects {
	/// 0 for rows pointing directly at the deleted instance
	pub depth: usize,
	pub entity: String,
	/// Foreign key field through which the rows depend on their parent
	pub field: String,
	/// Rows are kept with the foreign key set to NULL instead of being deleted
	pub detach: bool,
	pub instances: Vec<CollectedInstance>,
	/// Some of these rows have dependents of their own below the depth limit
	pub truncated: bool,
	#[serde(skip)]
	relation: Relation,
	#[serde(skip)]
	parent_keys: SelectQuery,
}

/// Stable sort by depth, then entity name
pub fn sort_collected(groups: &mut [CollectedObjects]) {
	groups.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.entity.cmp(&b.entity)));
}

fn instance_query(entity: &Arc<EntityType>, pk: &FieldValue) -> SelectQuery {
	SelectQuery::new(Arc::clone(entity)).filter(Predicate::new(
		ROOT_PATH,
		entity.pk().name.clone(),
		Lookup::Eq,
		pk.clone(),
	))
}

pub struct DeleteCollector<'a> {
	db: &'a dyn Database,
	schema: &'a Schema,
	max_depth: usize,
}

impl<'a> DeleteCollector<'a> {
	pub fn new(db: &'a dyn Database, schema: &'a Schema, max_depth: usize) -> Self {
		Self {
			db,
			schema,
			max_depth: max_depth.max(1),
		}
	}

	/// Rows that deleting the instance `pk` of `entity` would remove or detach
	pub async fn collect(&self, entity: &Arc<EntityType>, pk: &FieldValue) -> AdminResult<Vec<CollectedObjects>> {
		let mut groups = Vec::new();
		self.walk(Arc::clone(entity), instance_query(entity, pk), 0, &mut groups)
			.await?;
		sort_collected(&mut groups);
		Ok(groups)
	}

	/// Whether any row of `entity` selected by `keys` is referenced by another row
	async fn has_dependents(&self, entity: &EntityType, keys: &SelectQuery) -> AdminResult<bool> {
		for relation in self.schema.relations_to(entity.name()) {
			let rows = SelectQuery::new(Arc::clone(&relation.source))
				.filter_in(relation.field.name.clone(), keys.clone());
			if self.db.fetch_first(&repr_query(rows)).await?.is_some() {
				return Ok(true);
			}
		}
		Ok(false)
	}

	fn walk<'b>(
		&'b self,
		entity: Arc<EntityType>,
		parent_keys: SelectQuery,
		depth: usize,
		out: &'b mut Vec<CollectedObjects>,
	) -> BoxFuture<'b, AdminResult<()>> {
		async move {
			if depth >= self.max_depth {
				tracing::debug!(entity = entity.name(), depth, "delete collection depth reached");
				return Ok(());
			}
			for relation in self.schema.relations_to(entity.name()) {
				let source = &relation.source;
				let rows = SelectQuery::new(Arc::clone(source))
					.filter_in(relation.field.name.clone(), parent_keys.clone());
				let restricted = repr_query(rows.clone()).order_by(
					ROOT_PATH,
					source.pk().name.clone(),
					SortOrder::Asc,
				);
				let records = self.db.fetch_records(&restricted).await?;
				if records.is_empty() {
					continue;
				}
				let instances = records
					.iter()
					.map(|record| CollectedInstance::from_record(source, record))
					.collect();
				let detach = relation.field.nullable;
				let truncated = !detach && depth + 1 >= self.max_depth && self.has_dependents(source, &rows).await?;
				if truncated {
					tracing::warn!(
						entity = source.name(),
						depth,
						max_depth = self.max_depth,
						"dependents below the delete depth limit"
					);
				}
				out.push(CollectedObjects {
					depth,
					entity: source.name().to_string(),
					field: relation.field.name.clone(),
					detach,
					instances,
					truncated,
					relation: relation.clone(),
					parent_keys: parent_keys.clone(),
				});
				if !detach && !truncated {
					self.walk(Arc::clone(source), rows, depth + 1, &mut *out).await?;
				}
			}
			Ok(())
		}
		.boxed()
	}

	/// Delete one instance in a single transaction
	///
	/// With `recursive`, nullable dependents are detached and cascaded dependents
	/// are deleted deepest first before the instance itself. Nothing is deleted
	/// when the collected graph was cut short by the depth limit.
	pub async fn delete_instance(&self, entity: &Arc<EntityType>, pk: &FieldValue, recursive: bool) -> AdminResult<u64> {
		let instance = instance_query(entity, pk);
		if self.db.fetch_first(&instance).await?.is_none() {
			return Err(AdminError::NotFound(format!("{} {}", entity.name(), pk)));
		}
		let backend = self.db.backend();
		let mut statements = Vec::new();
		if recursive {
			let groups = self.collect(entity, pk).await?;
			if let Some(group) = groups.iter().find(|g| g.truncated) {
				return Err(AdminError::BadRequest(format!(
					"{} {} has {} dependents nested deeper than {} levels",
					entity.name(),
					pk,
					group.entity,
					self.max_depth
				)));
			}
			for group in groups.iter().filter(|g| g.detach) {
				let stmt = statement::nullify_where_in(
					&group.relation.source,
					&group.relation.field,
					group.parent_keys.pk_subquery()?,
				);
				statements.push(backend.render_update(&stmt));
			}
			for group in groups.iter().rev().filter(|g| !g.detach) {
				let stmt = statement::delete_where_in(
					&group.relation.source,
					&group.relation.field,
					group.parent_keys.pk_subquery()?,
				);
				statements.push(backend.render_delete(&stmt));
			}
		}
		let stmt = statement::delete_by_pks(entity, std::slice::from_ref(pk));
		statements.push(backend.render_delete(&stmt));
		let affected = self.db.execute_atomic(&statements).await?;
		tracing::info!(
			entity = entity.name(),
			pk = %pk,
			recursive,
			affected,
			"deleted instance"
		);
		Ok(affected)
	}
}

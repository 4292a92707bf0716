//! Model admin configuration and trait
//!
//! This module defines how entity types are listed, filtered, edited and
//! deleted in the admin interface.

use crate::error::AdminResult;
use crate::forms::{FormOptions, Widget};
use crate::text::slugify;
use async_trait::async_trait;
use plinth_db::{Database, DatabaseExt, EntityType, FieldValue, ROOT_PATH, SelectQuery, SortOrder, Values};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for configuring model administration
///
/// Every hook has a default derived from the entity type; implement only what
/// needs to differ.
#[async_trait]
pub trait ModelAdmin: Send + Sync {
	/// The administered entity type
	fn entity(&self) -> &Arc<EntityType>;

	fn display_name(&self) -> String {
		self.entity().name().to_string()
	}

	/// URL segment of this admin
	fn admin_name(&self) -> String {
		slugify(self.entity().name())
	}

	/// Columns of the list view
	fn columns(&self) -> Vec<String> {
		self.entity()
			.field_names()
			.into_iter()
			.map(str::to_string)
			.collect()
	}

	fn column_is_sortable(&self, column: &str) -> bool {
		self.entity().field(column).is_some()
	}

	/// Filterable field paths (`None` = every reachable field)
	fn filter_fields(&self) -> Option<Vec<String>> {
		None
	}

	/// Field paths never offered as filters, e.g. `author__password`
	fn filter_exclude(&self) -> Vec<String> {
		Vec::new()
	}

	/// Form fields (`None` = all fields)
	fn fields(&self) -> Option<Vec<String>> {
		None
	}

	fn exclude(&self) -> Vec<String> {
		Vec::new()
	}

	fn widgets(&self) -> HashMap<String, Widget> {
		HashMap::new()
	}

	/// Relation field name to the related field searched by the ajax lookup
	fn foreign_key_lookups(&self) -> HashMap<String, String> {
		HashMap::new()
	}

	/// Rows per list page (`None` = site default)
	fn paginate_by(&self) -> Option<u64> {
		None
	}

	/// Rows per lookup page (`None` = site default)
	fn filter_paginate_by(&self) -> Option<u64> {
		None
	}

	/// Preview dependent rows on the delete page
	fn delete_collect_objects(&self) -> bool {
		true
	}

	/// Delete dependent rows along with the selected ones
	fn delete_recursive(&self) -> bool {
		true
	}

	/// Query every view starts from
	fn base_query(&self) -> SelectQuery {
		SelectQuery::new(Arc::clone(self.entity()))
	}

	/// Replace the ordering with `ordering` (`col` or `-col`); unsortable
	/// columns are ignored and leave the query as it was
	fn apply_ordering(&self, query: SelectQuery, ordering: &str) -> SelectQuery {
		let (order, column) = match ordering.strip_prefix('-') {
			Some(column) => (SortOrder::Desc, column),
			None => (SortOrder::Asc, ordering),
		};
		if column.is_empty() || !self.column_is_sortable(column) {
			if !column.is_empty() {
				tracing::debug!(admin = %self.admin_name(), column, "ignoring unsortable column");
			}
			return query;
		}
		query.clear_ordering().order_by(ROOT_PATH, column, order)
	}

	/// Form derivation; the primary key is editable only when adding to a
	/// non-auto-increment entity type
	fn form_options(&self, adding: bool) -> FormOptions {
		FormOptions {
			fields: self.fields(),
			exclude: self.exclude(),
			widgets: self.widgets(),
			lookups: self.foreign_key_lookups(),
			allow_pk: adding && !self.entity().is_auto_increment(),
		}
	}

	/// Persist validated values; returns the primary key of the saved row
	async fn save_model(&self, db: &dyn Database, values: Values, existing: Option<&FieldValue>) -> AdminResult<JsonValue> {
		let entity = self.entity();
		match existing {
			Some(pk) => {
				if !values.is_empty() {
					db.update_record(entity, pk, &values).await?;
				}
				tracing::info!(entity = entity.name(), pk = %pk, "updated row");
				Ok(pk.to_json())
			}
			None => {
				let pk = db.insert_record(entity, &values).await?;
				tracing::info!(entity = entity.name(), pk = %pk, "inserted row");
				Ok(pk)
			}
		}
	}
}

/// Configuration-based model admin implementation
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use plinth_admin::{ModelAdmin, ModelAdminConfig};
/// use plinth_db::{EntityType, Field};
///
/// let user = Arc::new(
/// 	EntityType::builder("User")
/// 		.field(Field::id())
/// 		.field(Field::text("username"))
/// 		.field(Field::text("password"))
/// 		.build()
/// 		.unwrap(),
/// );
/// let admin = ModelAdminConfig::new(user)
/// 	.with_columns(vec!["id", "username"])
/// 	.with_exclude(vec!["password"])
/// 	.with_paginate_by(50);
///
/// assert_eq!(admin.admin_name(), "user");
/// assert_eq!(admin.columns(), vec!["id", "username"]);
/// ```
#[derive(Debug, Clone)]
pub struct ModelAdminConfig {
	entity: Arc<EntityType>,
	display_name: Option<String>,
	columns: Option<Vec<String>>,
	filter_fields: Option<Vec<String>>,
	filter_exclude: Vec<String>,
	fields: Option<Vec<String>>,
	exclude: Vec<String>,
	widgets: HashMap<String, Widget>,
	foreign_key_lookups: HashMap<String, String>,
	ordering: Option<String>,
	paginate_by: Option<u64>,
	filter_paginate_by: Option<u64>,
	delete_collect_objects: bool,
	delete_recursive: bool,
}

impl ModelAdminConfig {
	pub fn new(entity: Arc<EntityType>) -> Self {
		Self {
			entity,
			display_name: None,
			columns: None,
			filter_fields: None,
			filter_exclude: Vec::new(),
			fields: None,
			exclude: Vec::new(),
			widgets: HashMap::new(),
			foreign_key_lookups: HashMap::new(),
			ordering: None,
			paginate_by: None,
			filter_paginate_by: None,
			delete_collect_objects: true,
			delete_recursive: true,
		}
	}

	pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
		self.display_name = Some(name.into());
		self
	}

	pub fn with_columns(mut self, columns: Vec<impl Into<String>>) -> Self {
		self.columns = Some(columns.into_iter().map(Into::into).collect());
		self
	}

	pub fn with_filter_fields(mut self, fields: Vec<impl Into<String>>) -> Self {
		self.filter_fields = Some(fields.into_iter().map(Into::into).collect());
		self
	}

	pub fn with_filter_exclude(mut self, fields: Vec<impl Into<String>>) -> Self {
		self.filter_exclude = fields.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_fields(mut self, fields: Vec<impl Into<String>>) -> Self {
		self.fields = Some(fields.into_iter().map(Into::into).collect());
		self
	}

	pub fn with_exclude(mut self, fields: Vec<impl Into<String>>) -> Self {
		self.exclude = fields.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_widget(mut self, field: impl Into<String>, widget: Widget) -> Self {
		self.widgets.insert(field.into(), widget);
		self
	}

	/// Search `related_field` of the related type when looking up `field`
	pub fn with_foreign_key_lookup(mut self, field: impl Into<String>, related_field: impl Into<String>) -> Self {
		self.foreign_key_lookups.insert(field.into(), related_field.into());
		self
	}

	/// Default ordering of the list view (`col` or `-col`)
	pub fn with_ordering(mut self, ordering: impl Into<String>) -> Self {
		self.ordering = Some(ordering.into());
		self
	}

	pub fn with_paginate_by(mut self, count: u64) -> Self {
		self.paginate_by = Some(count);
		self
	}

	pub fn with_filter_paginate_by(mut self, count: u64) -> Self {
		self.filter_paginate_by = Some(count);
		self
	}

	pub fn with_delete_collect_objects(mut self, collect: bool) -> Self {
		self.delete_collect_objects = collect;
		self
	}

	pub fn with_delete_recursive(mut self, recursive: bool) -> Self {
		self.delete_recursive = recursive;
		self
	}
}

#[async_trait]
impl ModelAdmin for ModelAdminConfig {
	fn entity(&self) -> &Arc<EntityType> {
		&self.entity
	}

	fn display_name(&self) -> String {
		self.display_name
			.clone()
			.unwrap_or_else(|| self.entity.name().to_string())
	}

	fn columns(&self) -> Vec<String> {
		match &self.columns {
			Some(columns) => columns.clone(),
			None => self.entity.field_names().into_iter().map(str::to_string).collect(),
		}
	}

	fn filter_fields(&self) -> Option<Vec<String>> {
		self.filter_fields.clone()
	}

	fn filter_exclude(&self) -> Vec<String> {
		self.filter_exclude.clone()
	}

	fn fields(&self) -> Option<Vec<String>> {
		self.fields.clone()
	}

	fn exclude(&self) -> Vec<String> {
		self.exclude.clone()
	}

	fn widgets(&self) -> HashMap<String, Widget> {
		self.widgets.clone()
	}

	fn foreign_key_lookups(&self) -> HashMap<String, String> {
		self.foreign_key_lookups.clone()
	}

	fn paginate_by(&self) -> Option<u64> {
		self.paginate_by
	}

	fn filter_paginate_by(&self) -> Option<u64> {
		self.filter_paginate_by
	}

	fn delete_collect_objects(&self) -> bool {
		self.delete_collect_objects
	}

	fn delete_recursive(&self) -> bool {
		self.delete_recursive
	}

	fn base_query(&self) -> SelectQuery {
		let query = SelectQuery::new(Arc::clone(&self.entity));
		match &self.ordering {
			Some(ordering) => self.apply_ordering(query, ordering),
			None => query,
		}
	}
}

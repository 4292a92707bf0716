//! Entity metadata and the relation graph between entity types.
//!
//! A [`Schema`] is assembled once through [`SchemaBuilder`] and is read-only
//! afterwards. Building it validates every entity type and precomputes the
//! forward and reverse adjacency lists used by path resolution, export joins
//! and the delete collector.

use crate::error::SchemaError;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Separator between the segments of a field path (`author__email`)
pub const LOOKUP_SEP: &str = "__";

/// Semantic kind of a field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
	Text,
	Integer,
	Float,
	Boolean,
	Date,
	DateTime,
	/// Foreign key to the primary key of the named entity type
	ForeignKey { to: String },
}

impl FieldKind {
	/// Whether the field references another entity type
	pub fn is_relation(&self) -> bool {
		matches!(self, FieldKind::ForeignKey { .. })
	}

	/// Name of the referenced entity type for relation fields
	pub fn related_entity(&self) -> Option<&str> {
		match self {
			FieldKind::ForeignKey { to } => Some(to),
			_ => None,
		}
	}

	/// Short lowercase label used in messages and UI metadata
	pub fn label(&self) -> &'static str {
		match self {
			FieldKind::Text => "text",
			FieldKind::Integer => "integer",
			FieldKind::Float => "float",
			FieldKind::Boolean => "boolean",
			FieldKind::Date => "date",
			FieldKind::DateTime => "datetime",
			FieldKind::ForeignKey { .. } => "foreign_key",
		}
	}
}

impl fmt::Display for FieldKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

/// A single field of an entity type
///
/// # Examples
///
/// ```
/// use plinth_db::{Field, FieldKind};
///
/// let author = Field::foreign_key("author", "User").as_nullable();
/// assert_eq!(author.column, "author_id");
/// assert_eq!(author.verbose_name, "Author");
/// assert!(author.nullable);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
	pub name: String,
	pub column: String,
	pub kind: FieldKind,
	pub nullable: bool,
	pub primary_key: bool,
	pub verbose_name: String,
}

impl Field {
	pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
		let name = name.into();
		let column = if kind.is_relation() {
			format!("{}_id", name)
		} else {
			name.clone()
		};
		let verbose_name = humanize_field_name(&name);
		Self {
			name,
			column,
			kind,
			nullable: false,
			primary_key: false,
			verbose_name,
		}
	}

	pub fn text(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Text)
	}

	pub fn integer(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Integer)
	}

	pub fn float(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Float)
	}

	pub fn boolean(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Boolean)
	}

	pub fn date(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Date)
	}

	pub fn datetime(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::DateTime)
	}

	pub fn foreign_key(name: impl Into<String>, to: impl Into<String>) -> Self {
		Self::new(name, FieldKind::ForeignKey { to: to.into() })
	}

	/// Integer primary key, the usual auto-increment `id`
	pub fn id() -> Self {
		Self::integer("id").as_primary_key()
	}

	pub fn as_primary_key(mut self) -> Self {
		self.primary_key = true;
		self
	}

	pub fn as_nullable(mut self) -> Self {
		self.nullable = true;
		self
	}

	pub fn with_column(mut self, column: impl Into<String>) -> Self {
		self.column = column.into();
		self
	}

	pub fn with_verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
		self.verbose_name = verbose_name.into();
		self
	}

	pub fn is_relation(&self) -> bool {
		self.kind.is_relation()
	}

	pub fn related_entity(&self) -> Option<&str> {
		self.kind.related_entity()
	}
}

/// Turn `created_at` into `Created At`
pub fn humanize_field_name(name: &str) -> String {
	name.split('_')
		.filter(|word| !word.is_empty())
		.map(|word| {
			let mut chars = word.chars();
			match chars.next() {
				Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
				None => String::new(),
			}
		})
		.collect::<Vec<_>>()
		.join(" ")
}

fn to_snake_case(name: &str) -> String {
	let mut out = String::with_capacity(name.len() + 4);
	for (i, ch) in name.chars().enumerate() {
		if ch.is_uppercase() {
			if i > 0 {
				out.push('_');
			}
			out.extend(ch.to_lowercase());
		} else {
			out.push(ch);
		}
	}
	out
}

/// Metadata of a modeled record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityType {
	name: String,
	table: String,
	fields: Vec<Field>,
	#[serde(skip)]
	pk_index: usize,
	auto_increment: bool,
	display_field: Option<String>,
}

impl EntityType {
	pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
		EntityTypeBuilder::new(name)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn table(&self) -> &str {
		&self.table
	}

	pub fn fields(&self) -> &[Field] {
		&self.fields
	}

	pub fn field(&self, name: &str) -> Option<&Field> {
		self.fields.iter().find(|f| f.name == name)
	}

	/// The primary key field
	pub fn pk(&self) -> &Field {
		&self.fields[self.pk_index]
	}

	/// Whether the database assigns primary keys on insert
	pub fn is_auto_increment(&self) -> bool {
		self.auto_increment
	}

	/// Field used as the human representation of a row, falling back to the primary key
	pub fn display_field(&self) -> &Field {
		self.display_field
			.as_deref()
			.and_then(|name| self.field(name))
			.unwrap_or_else(|| self.pk())
	}

	pub fn relation_fields(&self) -> impl Iterator<Item = &Field> {
		self.fields.iter().filter(|f| f.is_relation())
	}

	pub fn plain_fields(&self) -> impl Iterator<Item = &Field> {
		self.fields.iter().filter(|f| !f.is_relation())
	}

	pub fn field_names(&self) -> Vec<&str> {
		self.fields.iter().map(|f| f.name.as_str()).collect()
	}
}

/// Builder for [`EntityType`]
#[derive(Debug, Clone)]
pub struct EntityTypeBuilder {
	name: String,
	table: Option<String>,
	fields: Vec<Field>,
	auto_increment: bool,
	display_field: Option<String>,
}

impl EntityTypeBuilder {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			table: None,
			fields: Vec::new(),
			auto_increment: true,
			display_field: None,
		}
	}

	/// Table name; defaults to the snake-cased entity name
	pub fn table(mut self, table: impl Into<String>) -> Self {
		self.table = Some(table.into());
		self
	}

	pub fn field(mut self, field: Field) -> Self {
		self.fields.push(field);
		self
	}

	pub fn auto_increment(mut self, auto_increment: bool) -> Self {
		self.auto_increment = auto_increment;
		self
	}

	pub fn display_field(mut self, name: impl Into<String>) -> Self {
		self.display_field = Some(name.into());
		self
	}

	pub fn build(self) -> Result<EntityType, SchemaError> {
		let mut seen = std::collections::HashSet::new();
		for field in &self.fields {
			if !seen.insert(field.name.as_str()) {
				return Err(SchemaError::DuplicateField {
					entity: self.name.clone(),
					field: field.name.clone(),
				});
			}
		}

		let mut pks = self
			.fields
			.iter()
			.enumerate()
			.filter(|(_, f)| f.primary_key)
			.map(|(i, _)| i);
		let pk_index = pks
			.next()
			.ok_or_else(|| SchemaError::MissingPrimaryKey(self.name.clone()))?;
		if pks.next().is_some() {
			return Err(SchemaError::MultiplePrimaryKeys(self.name.clone()));
		}

		if let Some(display) = &self.display_field {
			if !self.fields.iter().any(|f| &f.name == display) {
				return Err(SchemaError::UnknownDisplayField {
					entity: self.name.clone(),
					field: display.clone(),
				});
			}
		}

		let table = self.table.unwrap_or_else(|| to_snake_case(&self.name));
		Ok(EntityType {
			name: self.name,
			table,
			fields: self.fields,
			pk_index,
			auto_increment: self.auto_increment,
			display_field: self.display_field,
		})
	}
}

/// One foreign-key edge of the relation graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
	/// Entity type holding the foreign key
	pub source: Arc<EntityType>,
	/// The foreign key field on `source`
	pub field: Field,
	/// Entity type the foreign key points at
	pub target: Arc<EntityType>,
}

/// Registry of entity types with precomputed relation adjacency
#[derive(Debug, Clone, Default)]
pub struct Schema {
	entities: IndexMap<String, Arc<EntityType>>,
	forward: HashMap<String, Vec<Relation>>,
	reverse: HashMap<String, Vec<Relation>>,
}

impl Schema {
	pub fn builder() -> SchemaBuilder {
		SchemaBuilder::default()
	}

	pub fn get(&self, name: &str) -> Option<&Arc<EntityType>> {
		self.entities.get(name)
	}

	/// Like [`Schema::get`] but reports unknown names as an error
	pub fn entity(&self, name: &str) -> Result<&Arc<EntityType>, SchemaError> {
		self.entities
			.get(name)
			.ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))
	}

	/// Entity types in registration order
	pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityType>> {
		self.entities.values()
	}

	pub fn len(&self) -> usize {
		self.entities.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entities.is_empty()
	}

	/// Relation fields declared on `entity`, in field order
	pub fn relations_from(&self, entity: &str) -> &[Relation] {
		self.forward.get(entity).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Relation fields of other entity types that point at `entity`
	pub fn relations_to(&self, entity: &str) -> &[Relation] {
		self.reverse.get(entity).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Target entity type of a relation field
	pub fn related(&self, field: &Field) -> Option<&Arc<EntityType>> {
		field.related_entity().and_then(|name| self.entities.get(name))
	}

	/// Kind used to parse values for `field`
	///
	/// Relation fields store the related primary key, so their values are typed by it.
	pub fn value_kind<'a>(&'a self, field: &'a Field) -> &'a FieldKind {
		match self.related(field) {
			Some(target) => &target.pk().kind,
			None => &field.kind,
		}
	}
}

/// Builder for [`Schema`]
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
	entities: Vec<EntityTypeBuilder>,
}

impl SchemaBuilder {
	pub fn entity(mut self, entity: EntityTypeBuilder) -> Self {
		self.entities.push(entity);
		self
	}

	pub fn build(self) -> Result<Schema, SchemaError> {
		let mut entities: IndexMap<String, Arc<EntityType>> = IndexMap::new();
		for builder in self.entities {
			let entity = builder.build()?;
			if entities.contains_key(entity.name()) {
				return Err(SchemaError::DuplicateEntity(entity.name().to_string()));
			}
			entities.insert(entity.name().to_string(), Arc::new(entity));
		}

		let mut forward: HashMap<String, Vec<Relation>> = HashMap::new();
		let mut reverse: HashMap<String, Vec<Relation>> = HashMap::new();
		for source in entities.values() {
			for field in source.relation_fields() {
				let target_name = field.related_entity().unwrap_or_default();
				let target = entities.get(target_name).ok_or_else(|| {
					SchemaError::UnknownRelationTarget {
						entity: source.name().to_string(),
						field: field.name.clone(),
						target: target_name.to_string(),
					}
				})?;
				let relation = Relation {
					source: Arc::clone(source),
					field: field.clone(),
					target: Arc::clone(target),
				};
				forward
					.entry(source.name().to_string())
					.or_default()
					.push(relation.clone());
				reverse
					.entry(target_name.to_string())
					.or_default()
					.push(relation);
			}
		}

		Ok(Schema {
			entities,
			forward,
			reverse,
		})
	}
}

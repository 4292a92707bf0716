//! Model forms
//!
//! A [`ModelForm`] is derived from an entity type: one form field per entity
//! field honoring include/exclude lists and widget overrides. Binding
//! urlencoded data produces a [`BoundForm`] whose validation yields the
//! [`Values`] to insert or update, or [`FormErrors`] keyed by field.

use crate::text::display_value;
use indexmap::IndexMap;
use plinth_db::{
	Database, DatabaseExt, EntityType, Field, FieldKind, FieldValue, Lookup, Predicate, ROOT_PATH,
	Record, Schema, SelectQuery, Values,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Key for errors that do not belong to a single field
pub const ALL_FIELDS_KEY: &str = "_all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Widget {
	TextInput,
	Textarea,
	NumberInput,
	Checkbox,
	DateInput,
	DateTimeInput,
	/// Plain select over the related rows
	Select,
	/// Search box backed by the ajax lookup route
	Lookup,
}

impl Widget {
	pub fn for_kind(kind: &FieldKind) -> Self {
		match kind {
			FieldKind::Text => Widget::TextInput,
			FieldKind::Integer | FieldKind::Float => Widget::NumberInput,
			FieldKind::Boolean => Widget::Checkbox,
			FieldKind::Date => Widget::DateInput,
			FieldKind::DateTime => Widget::DateTimeInput,
			FieldKind::ForeignKey { .. } => Widget::Select,
		}
	}
}

/// Field-level validation failures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[error("{} field(s) failed validation", .errors.len())]
#[serde(transparent)]
pub struct FormErrors {
	errors: IndexMap<String, Vec<String>>,
}

impl FormErrors {
	pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
		self.errors.entry(field.into()).or_default().push(message.into());
	}

	pub fn get(&self, field: &str) -> Option<&[String]> {
		self.errors.get(field).map(Vec::as_slice)
	}

	pub fn is_empty(&self) -> bool {
		self.errors.is_empty()
	}

	pub fn len(&self) -> usize {
		self.errors.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
		self.errors.iter()
	}
}

/// How a form is derived from its entity type
#[derive(Debug, Clone, Default)]
pub struct FormOptions {
	/// Only these fields, in this order
	pub fields: Option<Vec<String>>,
	pub exclude: Vec<String>,
	pub widgets: HashMap<String, Widget>,
	/// Relation field name to the related field searched by the lookup widget
	pub lookups: HashMap<String, String>,
	/// Expose the primary key as an editable field
	pub allow_pk: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
	pub name: String,
	pub label: String,
	pub kind: &'static str,
	pub widget: Widget,
	pub required: bool,
	/// Related field searched by the lookup widget
	#[serde(skip_serializing_if = "Option::is_none")]
	pub lookup_field: Option<String>,
	/// Current raw value (initial or submitted)
	pub value: Option<String>,
	#[serde(skip)]
	field: Field,
}

#[derive(Debug, Clone)]
pub struct ModelForm {
	entity: Arc<EntityType>,
	fields: Vec<FormField>,
}

impl ModelForm {
	pub fn for_entity(entity: &Arc<EntityType>, options: &FormOptions) -> Self {
		let selected: Vec<&Field> = match &options.fields {
			Some(names) => names.iter().filter_map(|name| entity.field(name)).collect(),
			None => entity.fields().iter().collect(),
		};
		let fields = selected
			.into_iter()
			.filter(|field| !options.exclude.contains(&field.name))
			.filter(|field| options.allow_pk || !field.primary_key)
			.map(|field| {
				let lookup_field = options.lookups.get(&field.name).cloned();
				let default_widget = if field.is_relation() && lookup_field.is_some() {
					Widget::Lookup
				} else {
					Widget::for_kind(&field.kind)
				};
				FormField {
					name: field.name.clone(),
					label: field.verbose_name.clone(),
					kind: field.kind.label(),
					widget: options.widgets.get(&field.name).copied().unwrap_or(default_widget),
					required: !field.nullable && field.kind != FieldKind::Boolean,
					lookup_field,
					value: None,
					field: field.clone(),
				}
			})
			.collect();
		Self {
			entity: Arc::clone(entity),
			fields,
		}
	}

	pub fn entity(&self) -> &Arc<EntityType> {
		&self.entity
	}

	pub fn fields(&self) -> &[FormField] {
		&self.fields
	}

	pub fn field_names(&self) -> Vec<&str> {
		self.fields.iter().map(|f| f.name.as_str()).collect()
	}

	/// Fill values from an existing row (keys are field names)
	pub fn with_initial(mut self, record: &Record) -> Self {
		for field in &mut self.fields {
			field.value = record
				.get(&field.name)
				.filter(|v| !v.is_null())
				.map(display_value);
		}
		self
	}

	/// Bind submitted urlencoded pairs; the last value of a repeated key wins
	pub fn bind(mut self, data: &[(String, String)]) -> BoundForm {
		let data: HashMap<&str, &str> = data.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
		for field in &mut self.fields {
			field.value = data.get(field.name.as_str()).map(|v| v.to_string());
		}
		BoundForm { form: self }
	}

	/// Template context for rendering the form
	pub fn context(&self, errors: Option<&FormErrors>) -> serde_json::Value {
		serde_json::json!({
			"entity": self.entity.name(),
			"fields": self.fields,
			"errors": errors.cloned().unwrap_or_default(),
		})
	}
}

/// A form holding submitted values
#[derive(Debug, Clone)]
pub struct BoundForm {
	form: ModelForm,
}

impl BoundForm {
	pub fn form(&self) -> &ModelForm {
		&self.form
	}

	/// Parse every field value according to its kind
	pub fn clean(&self, schema: &Schema) -> Result<Values, FormErrors> {
		let mut values = Values::new();
		let mut errors = FormErrors::default();
		for field in &self.form.fields {
			match clean_field(schema, field) {
				Ok(value) => {
					values.insert(field.name.clone(), value);
				}
				Err(message) => errors.add(field.name.clone(), message),
			}
		}
		if errors.is_empty() {
			Ok(values)
		} else {
			Err(errors)
		}
	}

	/// [`clean`](Self::clean), then check that related rows exist
	pub async fn validate(&self, db: &dyn Database, schema: &Schema) -> Result<Values, ValidationFailure> {
		let values = self.clean(schema).map_err(ValidationFailure::Invalid)?;
		let mut errors = FormErrors::default();
		for field in &self.form.fields {
			let Some(target) = schema.related(&field.field) else {
				continue;
			};
			let Some(value) = values.get(&field.name).filter(|v| !v.is_null()) else {
				continue;
			};
			let query = SelectQuery::new(Arc::clone(target))
				.filter(Predicate::new(
					ROOT_PATH,
					target.pk().name.clone(),
					Lookup::Eq,
					value.clone(),
				))
				.only(&[target.pk().name.as_str()]);
			if db.fetch_first(&query).await?.is_none() {
				errors.add(field.name.clone(), "Select a valid choice.");
			}
		}
		if errors.is_empty() {
			Ok(values)
		} else {
			Err(ValidationFailure::Invalid(errors))
		}
	}
}

/// Why a bound form did not produce values
#[derive(Debug, Error)]
pub enum ValidationFailure {
	#[error(transparent)]
	Invalid(FormErrors),

	#[error(transparent)]
	Database(#[from] plinth_db::DbError),
}

fn clean_field(schema: &Schema, form_field: &FormField) -> Result<FieldValue, String> {
	let field = &form_field.field;
	let raw = form_field.value.as_deref().map(str::trim).unwrap_or("");
	if field.kind == FieldKind::Boolean {
		if raw.is_empty() {
			return Ok(FieldValue::Bool(false));
		}
		return FieldValue::parse(&field.kind, raw).ok_or_else(|| "Enter a valid boolean.".to_string());
	}
	if raw.is_empty() {
		return if field.nullable {
			Ok(FieldValue::Null)
		} else if field.kind == FieldKind::Text && form_field.value.is_some() {
			Ok(FieldValue::Text(String::new()))
		} else {
			Err("This field is required.".to_string())
		};
	}
	FieldValue::parse(schema.value_kind(field), raw)
		.ok_or_else(|| format!("Enter a valid {}.", field.kind.label()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use plinth_db::testing::{blog_database, blog_schema};
	use rstest::rstest;
	use serde_json::json;

	fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
		items
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[rstest]
	fn test_form_derivation_hides_auto_pk() {
		// Arrange
		let schema = blog_schema();
		let post = schema.entity("Post").unwrap();

		// Act
		let form = ModelForm::for_entity(post, &FormOptions::default());

		// Assert
		assert_eq!(
			form.field_names(),
			vec!["author", "title", "body", "published", "views", "rating", "created"]
		);
		assert_eq!(form.fields()[0].widget, Widget::Select);
		assert_eq!(form.fields()[3].widget, Widget::Checkbox);
		assert!(!form.fields()[5].required);
	}

	#[rstest]
	fn test_form_options_are_honored() {
		// Arrange
		let schema = blog_schema();
		let post = schema.entity("Post").unwrap();
		let options = FormOptions {
			fields: Some(vec!["title".into(), "body".into(), "author".into(), "id".into()]),
			exclude: vec!["id".into()],
			widgets: HashMap::from([("body".to_string(), Widget::Textarea)]),
			lookups: HashMap::from([("author".to_string(), "username".to_string())]),
			allow_pk: true,
		};

		// Act
		let form = ModelForm::for_entity(post, &options);

		// Assert
		assert_eq!(form.field_names(), vec!["title", "body", "author"]);
		assert_eq!(form.fields()[1].widget, Widget::Textarea);
		assert_eq!(form.fields()[2].widget, Widget::Lookup);
		assert_eq!(form.fields()[2].lookup_field.as_deref(), Some("username"));
	}

	#[rstest]
	fn test_clean_parses_values() {
		// Arrange
		let schema = blog_schema();
		let post = schema.entity("Post").unwrap();
		let form = ModelForm::for_entity(post, &FormOptions::default()).bind(&pairs(&[
			("author", "2"),
			("title", " New "),
			("body", ""),
			("views", "7"),
			("rating", ""),
			("created", "2024-05-01"),
		]));

		// Act
		let values = form.clean(&schema).unwrap();

		// Assert
		assert_eq!(values["author"], FieldValue::Int(2));
		assert_eq!(values["title"], FieldValue::Text("New".into()));
		assert_eq!(values["body"], FieldValue::Text(String::new()));
		assert_eq!(values["published"], FieldValue::Bool(false));
		assert_eq!(values["rating"], FieldValue::Null);
		assert_eq!(
			values["created"],
			FieldValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
		);
	}

	#[rstest]
	fn test_clean_reports_each_bad_field() {
		// Arrange
		let schema = blog_schema();
		let post = schema.entity("Post").unwrap();
		let form = ModelForm::for_entity(post, &FormOptions::default()).bind(&pairs(&[
			("author", "1"),
			("body", ""),
			("views", "many"),
			("created", "yesterday"),
		]));

		// Act
		let errors = form.clean(&schema).unwrap_err();

		// Assert
		assert_eq!(errors.len(), 3);
		assert_eq!(errors.get("title"), Some(&["This field is required.".to_string()][..]));
		assert_eq!(errors.get("views"), Some(&["Enter a valid integer.".to_string()][..]));
		assert!(errors.get("created").is_some());
	}

	#[rstest]
	#[tokio::test]
	async fn test_validate_checks_related_rows() {
		// Arrange
		let db = blog_database().await;
		let schema = blog_schema();
		let comment = schema.entity("Comment").unwrap();
		let form = ModelForm::for_entity(comment, &FormOptions::default()).bind(&pairs(&[
			("post", "42"),
			("author", ""),
			("content", "hi"),
		]));

		// Act
		let result = form.validate(&db, &schema).await;

		// Assert
		match result {
			Err(ValidationFailure::Invalid(errors)) => {
				assert_eq!(errors.get("post"), Some(&["Select a valid choice.".to_string()][..]));
				assert!(errors.get("author").is_none());
			}
			other => panic!("expected invalid form, got {:?}", other),
		}
	}

	#[rstest]
	fn test_initial_values_and_context() {
		// Arrange
		let schema = blog_schema();
		let user = schema.entity("User").unwrap();
		let record: Record = [
			("id".to_string(), json!(1)),
			("username".to_string(), json!("alice")),
			("email".to_string(), json!("alice@example.com")),
			("is_admin".to_string(), json!(true)),
		]
		.into_iter()
		.collect();

		// Act
		let context = ModelForm::for_entity(user, &FormOptions::default())
			.with_initial(&record)
			.context(None);

		// Assert
		assert_eq!(context["fields"][0]["name"], "username");
		assert_eq!(context["fields"][0]["value"], "alice");
		assert_eq!(context["fields"][2]["value"], "true");
		assert_eq!(context["errors"], json!({}));
	}
}

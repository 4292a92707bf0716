//! Row to nested JSON conversion
//!
//! Columns reached through relations are nested under their relation path, so
//! the columns `title` and `author__email` produce
//! `{"title": "...", "author": {"email": "..."}}`. A relation field selected as
//! a value is keyed by its column (`author_id`) to keep it apart from the
//! nested object of the same relation.

use plinth_db::{LOOKUP_SEP, Row, SelectedColumn};
use serde_json::{Map, Value as JsonValue};

fn value_key(column: &SelectedColumn) -> &str {
	if column.field.is_relation() {
		&column.field.column
	} else {
		&column.field.name
	}
}

fn object_at<'m>(
	mut node: &'m mut Map<String, JsonValue>,
	path: &str,
) -> Option<&'m mut Map<String, JsonValue>> {
	if path.is_empty() {
		return Some(node);
	}
	for segment in path.split(LOOKUP_SEP) {
		let slot = node
			.entry(segment.to_string())
			.or_insert_with(|| JsonValue::Object(Map::new()));
		if !slot.is_object() {
			*slot = JsonValue::Object(Map::new());
		}
		node = slot.as_object_mut()?;
	}
	Some(node)
}

/// Nest one row along the relation paths of its columns
pub fn serialize_row(columns: &[SelectedColumn], row: Row) -> JsonValue {
	let mut root = Map::new();
	for (column, value) in columns.iter().zip(row) {
		if let Some(target) = object_at(&mut root, &column.path) {
			target.insert(value_key(column).to_string(), value);
		}
	}
	JsonValue::Object(root)
}

#[cfg(test)]
mod tests {
	use super::*;
	use plinth_db::Field;
	use rstest::rstest;
	use serde_json::json;

	fn column(path: &str, field: Field) -> SelectedColumn {
		SelectedColumn {
			path: path.to_string(),
			field,
		}
	}

	#[rstest]
	fn test_nests_by_relation_path() {
		// Arrange
		let columns = vec![
			column("", Field::text("title")),
			column("author", Field::text("email")),
			column("author__profile", Field::text("bio")),
			column("author", Field::text("username")),
		];
		let row = vec![json!("Hello"), json!("a@example.com"), json!("hi"), json!("alice")];

		// Act
		let value = serialize_row(&columns, row);

		// Assert
		assert_eq!(
			value,
			json!({
				"title": "Hello",
				"author": {
					"email": "a@example.com",
					"profile": {"bio": "hi"},
					"username": "alice"
				}
			})
		);
	}

	#[rstest]
	fn test_relation_value_uses_column_key() {
		let columns = vec![
			column("", Field::foreign_key("author", "User")),
			column("author", Field::text("email")),
		];
		let row = vec![json!(1), json!("a@example.com")];

		let value = serialize_row(&columns, row);

		assert_eq!(value, json!({"author_id": 1, "author": {"email": "a@example.com"}}));
	}

	#[rstest]
	fn test_missing_join_keeps_nulls() {
		let columns = vec![column("", Field::id()), column("author", Field::text("email"))];

		let value = serialize_row(&columns, vec![json!(2), JsonValue::Null]);

		assert_eq!(value, json!({"id": 2, "author": {"email": null}}));
	}
}

//! String helpers shared by the page contexts

use plinth_db::EntityType;
use serde_json::Value as JsonValue;

/// Convert text to a URL-friendly slug
///
/// # Examples
///
/// ```
/// use plinth_admin::text::slugify;
///
/// assert_eq!(slugify("BlogPost"), "blogpost");
/// assert_eq!(slugify("Site  Stats!"), "site-stats");
/// ```
pub fn slugify(text: &str) -> String {
	text.to_lowercase()
		.chars()
		.map(|ch| match ch {
			'a'..='z' | '0'..='9' => ch,
			_ => '-',
		})
		.collect::<String>()
		.split('-')
		.filter(|s| !s.is_empty())
		.collect::<Vec<_>>()
		.join("-")
}

/// `is_admin` becomes `Is Admin`; each word is capitalized and the rest lowercased
pub fn fix_underscores(text: &str) -> String {
	text.split('_')
		.map(|word| {
			let mut chars = word.chars();
			match chars.next() {
				Some(first) => first
					.to_uppercase()
					.chain(chars.flat_map(char::to_lowercase))
					.collect::<String>(),
				None => String::new(),
			}
		})
		.collect::<Vec<_>>()
		.join(" ")
}

/// Replace every `key` pair of a query string with `key=value`, appended last
pub fn update_querystring(querystring: &str, key: &str, value: &str) -> String {
	let pair = format!("{}={}", key, value);
	let mut parts: Vec<&str> = querystring
		.split('&')
		.filter(|part| !part.is_empty() && part.split('=').next() != Some(key))
		.collect();
	parts.push(&pair);
	parts.join("&")
}

/// Column header for `column` of `entity`
pub fn verbose_name(entity: &EntityType, column: &str) -> String {
	match entity.field(column) {
		Some(field) => field.verbose_name.clone(),
		None => fix_underscores(column),
	}
}

/// Human representation of a decoded value
pub fn display_value(value: &JsonValue) -> String {
	match value {
		JsonValue::Null => String::new(),
		JsonValue::String(s) => s.clone(),
		other => other.to_string(),
	}
}

//! Typed field values parsed from request text and bound into statements.

use crate::schema::FieldKind;
use chrono::{NaiveDate, NaiveDateTime};
use sea_query::Value;
use serde_json::Value as JsonValue;
use std::fmt;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_INPUT_FORMATS: &[&str] = &[
	"%Y-%m-%d %H:%M:%S",
	"%Y-%m-%d %H:%M",
	"%Y-%m-%dT%H:%M:%S",
	"%Y-%m-%dT%H:%M",
	"%Y-%m-%d %H:%M:%S%.f",
	"%Y-%m-%dT%H:%M:%S%.f",
];

/// A value of one field, or the composite operand of an `in`/`range` lookup
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Text(String),
	Date(NaiveDate),
	DateTime(NaiveDateTime),
	/// Operand of `in`
	List(Vec<FieldValue>),
	/// Inclusive bounds of `range`
	Range(Box<FieldValue>, Box<FieldValue>),
}

impl FieldValue {
	/// Parse request text as a scalar of `kind`
	///
	/// Returns `None` for empty or malformed input. Relation kinds accept an
	/// integer key and fall back to text keys.
	///
	/// # Examples
	///
	/// ```
	/// use plinth_db::{FieldKind, FieldValue};
	///
	/// assert_eq!(FieldValue::parse(&FieldKind::Integer, " 42 "), Some(FieldValue::Int(42)));
	/// assert_eq!(FieldValue::parse(&FieldKind::Boolean, "yes"), Some(FieldValue::Bool(true)));
	/// assert_eq!(FieldValue::parse(&FieldKind::Integer, "4x"), None);
	/// ```
	pub fn parse(kind: &FieldKind, raw: &str) -> Option<Self> {
		let raw = raw.trim();
		if raw.is_empty() {
			return None;
		}
		match kind {
			FieldKind::Text => Some(FieldValue::Text(raw.to_string())),
			FieldKind::Integer => raw.parse().ok().map(FieldValue::Int),
			FieldKind::Float => raw
				.parse::<f64>()
				.ok()
				.filter(|f| f.is_finite())
				.map(FieldValue::Float),
			FieldKind::Boolean => parse_bool(raw).map(FieldValue::Bool),
			FieldKind::Date => NaiveDate::parse_from_str(raw, DATE_FORMAT)
				.ok()
				.map(FieldValue::Date),
			FieldKind::DateTime => parse_datetime(raw).map(FieldValue::DateTime),
			FieldKind::ForeignKey { .. } => Some(
				raw.parse()
					.map(FieldValue::Int)
					.unwrap_or_else(|_| FieldValue::Text(raw.to_string())),
			),
		}
	}

	/// Parse a comma separated list; any malformed item rejects the whole list
	pub fn parse_list(kind: &FieldKind, raw: &str) -> Option<Self> {
		let items = raw
			.split(',')
			.map(str::trim)
			.filter(|item| !item.is_empty())
			.map(|item| Self::parse(kind, item))
			.collect::<Option<Vec<_>>>()?;
		if items.is_empty() {
			None
		} else {
			Some(FieldValue::List(items))
		}
	}

	/// Parse exactly two comma separated bounds
	pub fn parse_range(kind: &FieldKind, raw: &str) -> Option<Self> {
		let (low, high) = raw.split_once(',')?;
		let low = Self::parse(kind, low)?;
		let high = Self::parse(kind, high)?;
		Some(FieldValue::Range(Box::new(low), Box::new(high)))
	}

	/// Convert a decoded JSON column value back into a typed value
	pub fn from_json(kind: &FieldKind, value: &JsonValue) -> Option<Self> {
		match value {
			JsonValue::Null => Some(FieldValue::Null),
			JsonValue::Bool(b) => Some(FieldValue::Bool(*b)),
			JsonValue::Number(n) => match kind {
				FieldKind::Float => n.as_f64().map(FieldValue::Float),
				_ => n
					.as_i64()
					.map(FieldValue::Int)
					.or_else(|| n.as_f64().map(FieldValue::Float)),
			},
			JsonValue::String(s) => Self::parse(kind, s).or_else(|| Some(FieldValue::Text(s.clone()))),
			JsonValue::Array(_) | JsonValue::Object(_) => None,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, FieldValue::Null)
	}

	/// Value to bind into a sea-query statement
	///
	/// Dates travel as ISO strings so every backend compares them lexically
	/// the same way they are stored.
	pub fn to_sea_value(&self) -> Value {
		match self {
			FieldValue::Null => Option::<String>::None.into(),
			FieldValue::Bool(b) => (*b).into(),
			FieldValue::Int(i) => (*i).into(),
			FieldValue::Float(f) => (*f).into(),
			FieldValue::Text(s) => s.clone().into(),
			FieldValue::Date(d) => d.format(DATE_FORMAT).to_string().into(),
			FieldValue::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string().into(),
			FieldValue::List(_) | FieldValue::Range(..) => self.to_string().into(),
		}
	}

	pub fn to_json(&self) -> JsonValue {
		match self {
			FieldValue::Null => JsonValue::Null,
			FieldValue::Bool(b) => JsonValue::Bool(*b),
			FieldValue::Int(i) => JsonValue::from(*i),
			FieldValue::Float(f) => serde_json::Number::from_f64(*f)
				.map(JsonValue::Number)
				.unwrap_or(JsonValue::Null),
			FieldValue::Text(s) => JsonValue::String(s.clone()),
			FieldValue::Date(_) | FieldValue::DateTime(_) => JsonValue::String(self.to_string()),
			FieldValue::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
			FieldValue::Range(low, high) => JsonValue::Array(vec![low.to_json(), high.to_json()]),
		}
	}
}

impl fmt::Display for FieldValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FieldValue::Null => f.write_str("null"),
			FieldValue::Bool(b) => write!(f, "{}", b),
			FieldValue::Int(i) => write!(f, "{}", i),
			FieldValue::Float(v) => write!(f, "{}", v),
			FieldValue::Text(s) => f.write_str(s),
			FieldValue::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
			FieldValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
			FieldValue::List(items) => {
				let joined: Vec<String> = items.iter().map(ToString::to_string).collect();
				f.write_str(&joined.join(","))
			}
			FieldValue::Range(low, high) => write!(f, "{},{}", low, high),
		}
	}
}

fn parse_bool(raw: &str) -> Option<bool> {
	match raw.to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" | "t" | "y" => Some(true),
		"0" | "false" | "no" | "off" | "f" | "n" => Some(false),
		_ => None,
	}
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
	DATETIME_INPUT_FORMATS
		.iter()
		.find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
		.or_else(|| {
			NaiveDate::parse_from_str(raw, DATE_FORMAT)
				.ok()
				.and_then(|d| d.and_hms_opt(0, 0, 0))
		})
}

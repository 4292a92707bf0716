//! Admin site settings
//!
//! Settings are read from a TOML file (every key optional) and then
//! overridden by `PLINTH_`-prefixed environment variables.
//!
//! ```toml
//! site_name = "Blog admin"
//! url_prefix = "/admin"
//! database_url = "sqlite://blog.db"
//! paginate_by = 50
//! ```

use crate::error::{AdminError, AdminResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of environment variables that override file settings
pub const ENV_PREFIX: &str = "PLINTH_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
	/// Title shown on the dashboard
	pub site_name: String,
	/// Path under which every admin route is mounted
	pub url_prefix: String,
	/// Where unauthenticated users are sent
	pub login_url: String,
	pub database_url: String,
	/// Rows per list page
	pub paginate_by: u64,
	/// Rows per page of the related-object lookup
	pub filter_paginate_by: u64,
	/// Upper bound for any page size
	pub max_page_size: u64,
	/// Relation hops explored for filters and export fields
	pub max_relation_depth: usize,
	/// Reverse-relation levels explored when collecting dependents
	pub max_delete_depth: usize,
	/// Default tracing filter when `RUST_LOG` is not set
	pub log_level: String,
}

impl Default for AdminSettings {
	fn default() -> Self {
		Self {
			site_name: "Site administration".to_string(),
			url_prefix: "/admin".to_string(),
			login_url: "/accounts/login/".to_string(),
			database_url: "sqlite::memory:".to_string(),
			paginate_by: 20,
			filter_paginate_by: 15,
			max_page_size: 500,
			max_relation_depth: 3,
			max_delete_depth: 8,
			log_level: "info".to_string(),
		}
	}
}

impl AdminSettings {
	pub fn from_toml_str(source: &str) -> AdminResult<Self> {
		toml::from_str(source)
			.map_err(|e| AdminError::Configuration(format!("invalid settings: {}", e)))
	}

	pub fn from_file(path: impl AsRef<Path>) -> AdminResult<Self> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path).map_err(|e| {
			AdminError::Configuration(format!("cannot read {}: {}", path.display(), e))
		})?;
		Self::from_toml_str(&source)
	}

	/// File settings (or defaults), then environment overrides, then validation
	pub fn load(path: Option<&Path>) -> AdminResult<Self> {
		let settings = match path {
			Some(path) => Self::from_file(path)?,
			None => Self::default(),
		};
		let settings = settings.with_overrides(std::env::vars())?;
		settings.validate()?;
		Ok(settings)
	}

	/// Apply `PLINTH_*` variables; unrelated variables are ignored
	pub fn with_overrides<I>(mut self, vars: I) -> AdminResult<Self>
	where
		I: IntoIterator<Item = (String, String)>,
	{
		for (key, value) in vars {
			let Some(name) = key.strip_prefix(ENV_PREFIX) else {
				continue;
			};
			match name {
				"SITE_NAME" => self.site_name = value,
				"URL_PREFIX" => self.url_prefix = value,
				"LOGIN_URL" => self.login_url = value,
				"DATABASE_URL" => self.database_url = value,
				"LOG_LEVEL" => self.log_level = value,
				"PAGINATE_BY" => self.paginate_by = parse_number(&key, &value)?,
				"FILTER_PAGINATE_BY" => self.filter_paginate_by = parse_number(&key, &value)?,
				_ => {}
			}
		}
		Ok(self)
	}

	pub fn validate(&self) -> AdminResult<()> {
		if !self.url_prefix.starts_with('/') {
			return Err(AdminError::Configuration(format!(
				"url_prefix must start with '/', got '{}'",
				self.url_prefix
			)));
		}
		if self.paginate_by == 0 || self.filter_paginate_by == 0 || self.max_page_size == 0 {
			return Err(AdminError::Configuration(
				"page sizes must be greater than zero".to_string(),
			));
		}
		if self.max_relation_depth == 0 || self.max_delete_depth == 0 {
			return Err(AdminError::Configuration(
				"relation depths must be at least 1".to_string(),
			));
		}
		Ok(())
	}

	/// `url_prefix` without a trailing slash
	pub fn prefix(&self) -> &str {
		self.url_prefix.trim_end_matches('/')
	}

	/// Clamp a requested page size to `max_page_size`
	pub fn page_size(&self, requested: u64) -> u64 {
		requested.clamp(1, self.max_page_size)
	}
}

fn parse_number(key: &str, value: &str) -> AdminResult<u64> {
	value
		.trim()
		.parse()
		.map_err(|_| AdminError::Configuration(format!("{} must be a number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_defaults() {
		let settings = AdminSettings::default();

		assert_eq!(settings.url_prefix, "/admin");
		assert_eq!(settings.paginate_by, 20);
		assert_eq!(settings.filter_paginate_by, 15);
		assert_eq!(settings.max_relation_depth, 3);
		assert!(settings.validate().is_ok());
	}

	#[rstest]
	fn test_partial_toml_keeps_defaults() {
		// Arrange
		let source = r#"
			site_name = "Blog admin"
			paginate_by = 50
		"#;

		// Act
		let settings = AdminSettings::from_toml_str(source).unwrap();

		// Assert
		assert_eq!(settings.site_name, "Blog admin");
		assert_eq!(settings.paginate_by, 50);
		assert_eq!(settings.login_url, "/accounts/login/");
	}

	#[rstest]
	fn test_env_overrides_win() {
		// Arrange
		let vars = vec![
			("PLINTH_DATABASE_URL".to_string(), "sqlite://other.db".to_string()),
			("PLINTH_URL_PREFIX".to_string(), "/backoffice".to_string()),
			("PLINTH_PAGINATE_BY".to_string(), "10".to_string()),
			("HOME".to_string(), "/root".to_string()),
		];

		// Act
		let settings = AdminSettings::default().with_overrides(vars).unwrap();

		// Assert
		assert_eq!(settings.database_url, "sqlite://other.db");
		assert_eq!(settings.url_prefix, "/backoffice");
		assert_eq!(settings.paginate_by, 10);
	}

	#[rstest]
	fn test_non_numeric_override_is_rejected() {
		let vars = vec![("PLINTH_PAGINATE_BY".to_string(), "many".to_string())];

		let result = AdminSettings::default().with_overrides(vars);

		assert!(matches!(result, Err(AdminError::Configuration(_))));
	}

	#[rstest]
	#[case(r#"url_prefix = "admin""#)]
	#[case("paginate_by = 0")]
	#[case("max_relation_depth = 0")]
	fn test_invalid_settings(#[case] source: &str) {
		let settings = AdminSettings::from_toml_str(source).unwrap();

		assert!(settings.validate().is_err());
	}

	#[rstest]
	#[case(0, 1)]
	#[case(30, 30)]
	#[case(10_000, 500)]
	fn test_page_size_is_clamped(#[case] requested: u64, #[case] expected: u64) {
		assert_eq!(AdminSettings::default().page_size(requested), expected);
	}

	#[rstest]
	fn test_prefix_trims_trailing_slash() {
		let settings = AdminSettings {
			url_prefix: "/admin/".into(),
			..Default::default()
		};

		assert_eq!(settings.prefix(), "/admin");
	}
}

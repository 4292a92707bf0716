//! Admin URL routing
//!
//! Routes under the admin prefix:
//!
//! - `/` dashboard
//! - `/{admin}/` list with filters, ordering and bulk actions
//! - `/{admin}/add/`
//! - `/{admin}/{pk}/` edit
//! - `/{admin}/delete/`
//! - `/{admin}/export/`
//! - `/{admin}/_ajax/` related-object lookup

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Characters escaped in a primary key path segment
const PK_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'-')
	.remove(b'_')
	.remove(b'.')
	.remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
	Dashboard,
	Index { admin: String },
	Add { admin: String },
	Edit { admin: String, pk: String },
	Delete { admin: String },
	Export { admin: String },
	Ajax { admin: String },
}

impl Route {
	/// Admin name of a per-model route
	pub fn admin_name(&self) -> Option<&str> {
		match self {
			Route::Dashboard => None,
			Route::Index { admin }
			| Route::Add { admin }
			| Route::Edit { admin, .. }
			| Route::Delete { admin }
			| Route::Export { admin }
			| Route::Ajax { admin } => Some(admin),
		}
	}

	/// Path of this route under `prefix` (which has no trailing slash)
	pub fn url(&self, prefix: &str) -> String {
		match self {
			Route::Dashboard => format!("{}/", prefix),
			Route::Index { admin } => format!("{}/{}/", prefix, admin),
			Route::Add { admin } => format!("{}/{}/add/", prefix, admin),
			Route::Edit { admin, pk } => format!(
				"{}/{}/{}/",
				prefix,
				admin,
				utf8_percent_encode(pk, PK_SEGMENT)
			),
			Route::Delete { admin } => format!("{}/{}/delete/", prefix, admin),
			Route::Export { admin } => format!("{}/{}/export/", prefix, admin),
			Route::Ajax { admin } => format!("{}/{}/_ajax/", prefix, admin),
		}
	}
}

/// Match `path` against the admin routes mounted at `prefix`
///
/// The trailing slash is optional. Returns `None` for paths outside the
/// prefix and for unknown shapes.
pub fn resolve(prefix: &str, path: &str) -> Option<Route> {
	let prefix = prefix.trim_end_matches('/');
	let rest = path.strip_prefix(prefix)?;
	if !(rest.is_empty() || rest.starts_with('/')) {
		return None;
	}
	let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
	let route = match segments.as_slice() {
		[] => Route::Dashboard,
		[admin] => Route::Index {
			admin: admin.to_string(),
		},
		[admin, "add"] => Route::Add {
			admin: admin.to_string(),
		},
		[admin, "delete"] => Route::Delete {
			admin: admin.to_string(),
		},
		[admin, "export"] => Route::Export {
			admin: admin.to_string(),
		},
		[admin, "_ajax"] => Route::Ajax {
			admin: admin.to_string(),
		},
		[admin, pk] => Route::Edit {
			admin: admin.to_string(),
			pk: percent_decode_str(pk).decode_utf8().ok()?.into_owned(),
		},
		_ => return None,
	};
	Some(route)
}

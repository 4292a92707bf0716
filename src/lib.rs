//! # Plinth
//!
//! An admin interface generated from a relational data model.
//!
//! Describe entity types once in a [`db::Schema`], register a
//! [`admin::ModelAdmin`] per type on an [`admin::AdminSite`] and serve it: list
//! pages with filters across relations, add and edit forms, a delete page
//! previewing every dependent row, and a streaming JSON export of chosen
//! columns (related ones included).
//!
//! ## Feature Flags
//!
//! - `admin` (default) - admin site, page handlers and the HTTP server
//! - `testing` - blog schema fixture backed by in-memory SQLite
//!
//! ## Crates
//!
//! - [`db`] (`plinth-db`) - schema registry, query model and the SQLite connection
//! - [`admin`] (`plinth-admin`) - everything served under the admin prefix
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use plinth::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = AdminSettings::load(None)?;
//! init_logging(&settings);
//!
//! let schema = Arc::new(
//! 	Schema::builder()
//! 		.entity(
//! 			EntityType::builder("User")
//! 				.table("users")
//! 				.field(Field::id())
//! 				.field(Field::text("username"))
//! 				.display_field("username"),
//! 		)
//! 		.build()?,
//! );
//! let db = Arc::new(SqliteDatabase::connect(&settings.database_url).await?);
//! let user = Arc::clone(schema.entity("User")?);
//!
//! let site = AdminSite::builder(settings, schema, db)
//! 	.register(ModelAdminConfig::new(user).with_ordering("username"))
//! 	.build()?;
//! plinth::admin::server::serve(tokio::net::TcpListener::bind("127.0.0.1:8000").await?, site).await?;
//! # Ok(())
//! # }
//! ```

pub use plinth_db as db;

#[cfg(feature = "admin")]
pub use plinth_admin as admin;

pub mod prelude {
	pub use plinth_db::{
		Database, DatabaseExt, DbError, DbResult, EntityType, Field, FieldKind, FieldValue, Lookup, Predicate,
		Schema, SelectQuery, SortOrder, SqliteDatabase,
	};

	#[cfg(feature = "admin")]
	pub use plinth_admin::{
		AdminAuth, AdminError, AdminPanel, AdminResult, AdminSettings, AdminSite, AdminUser, ModelAdmin,
		ModelAdminConfig, init_logging,
	};

	pub use async_trait::async_trait;
}

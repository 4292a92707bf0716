//! # plinth-admin
//!
//! Auto-generated admin site over the entity types of a [`plinth_db::Schema`].
//!
//! ## Overview
//!
//! - **Registry** ([`AdminSite`], [`ModelAdmin`], [`AdminPanel`]): which entity types are
//!   administered and how, assembled once at startup.
//! - **Queries** ([`path`], [`filters`], [`pagination`]): field path resolution, filter
//!   trees built from the query string, page windows.
//! - **Export** ([`related`], [`export`], [`serializer`]): exportable related fields and a
//!   streaming JSON array of the selected columns.
//! - **Delete** ([`delete`]): dependent-row preview and cascading delete.
//! - **Pages** ([`views`], [`forms`], [`router`]): handlers returning template contexts as JSON.
//! - **Serving** ([`server`], [`auth`], [`settings`], [`logging`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use plinth_admin::{AdminSettings, AdminSite, ModelAdminConfig, init_logging, server};
//! use plinth_db::{EntityType, Field, Schema, SqliteDatabase};
//! use tokio::net::TcpListener;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = AdminSettings::load(None)?;
//! init_logging(&settings);
//!
//! let schema = Arc::new(
//! 	Schema::builder()
//! 		.entity(
//! 			EntityType::builder("Post")
//! 				.field(Field::id())
//! 				.field(Field::text("title")),
//! 		)
//! 		.build()?,
//! );
//! let db = Arc::new(SqliteDatabase::connect(&settings.database_url).await?);
//! let post = Arc::clone(schema.entity("Post")?);
//!
//! let site = AdminSite::builder(settings, schema, db)
//! 	.register(ModelAdminConfig::new(post).with_ordering("-id"))
//! 	.build()?;
//! server::serve(TcpListener::bind("127.0.0.1:8000").await?, site).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod delete;
pub mod error;
pub mod export;
pub mod filters;
pub mod forms;
pub mod http;
pub mod logging;
pub mod model_admin;
pub mod pagination;
pub mod path;
pub mod related;
pub mod router;
pub mod serializer;
pub mod server;
pub mod settings;
pub mod site;
pub mod text;
pub mod views;

pub use auth::{AdminAuth, AdminUser, Authorization, ExtensionAuth};
pub use delete::{CollectedInstance, CollectedObjects, DeleteCollector};
pub use error::{AdminError, AdminResult};
pub use export::{ExportEngine, ExportError, ExportStream};
pub use filters::{FilterEngine, FilterResult, FilterTree};
pub use forms::{FormErrors, ModelForm, Widget};
pub use crate::http::{AdminBody, AdminRequest};
pub use logging::init_logging;
pub use model_admin::{ModelAdmin, ModelAdminConfig};
pub use pagination::{Page, PaginatedQuery};
pub use path::{PathError, RelationHop, ResolvedField};
pub use related::{RelatedFieldCollector, RelatedFieldMap};
pub use router::Route;
pub use settings::AdminSettings;
pub use site::{AdminPanel, AdminSite, AdminSiteBuilder};

//! Admin site registry
//!
//! An [`AdminSite`] maps admin names to [`ModelAdmin`] implementations and
//! holds dashboard panels. It is assembled once by [`AdminSiteBuilder`] and
//! shared as `Arc<AdminSite>`; request handling only reads it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use plinth_admin::{AdminSettings, AdminSite, ModelAdminConfig};
//! use plinth_db::{EntityType, Field, Schema, SqliteDatabase};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Arc::new(
//! 	Schema::builder()
//! 		.entity(EntityType::builder("User").field(Field::id()).field(Field::text("username")))
//! 		.build()?,
//! );
//! let db = Arc::new(SqliteDatabase::connect("sqlite://app.db").await?);
//! let user = Arc::clone(schema.entity("User")?);
//!
//! let site = AdminSite::builder(AdminSettings::default(), schema, db)
//! 	.register(ModelAdminConfig::new(user).with_columns(vec!["id", "username"]))
//! 	.build()?;
//! # Ok(())
//! # }
//! ```

use crate::auth::{AdminAuth, Authorization, ExtensionAuth, authorize};
use crate::error::{AdminError, AdminResult};
use crate::http::{AdminBody, AdminRequest, error_response, redirect};
use crate::model_admin::ModelAdmin;
use crate::router::{self, Route};
use crate::settings::AdminSettings;
use crate::text::slugify;
use crate::views;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use indexmap::IndexMap;
use plinth_db::{Database, Schema};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// A dashboard section that is not tied to one entity type
///
/// ```
/// use async_trait::async_trait;
/// use plinth_admin::{AdminPanel, AdminResult};
/// use plinth_db::Database;
/// use serde_json::{Value, json};
///
/// struct Notes;
///
/// #[async_trait]
/// impl AdminPanel for Notes {
/// 	fn title(&self) -> String {
/// 		"Release Notes".to_string()
/// 	}
///
/// 	async fn context(&self, _db: &dyn Database) -> AdminResult<Value> {
/// 		Ok(json!({"version": "0.1"}))
/// 	}
/// }
///
/// assert_eq!(Notes.slug(), "release-notes");
/// ```
#[async_trait]
pub trait AdminPanel: Send + Sync {
	fn title(&self) -> String;

	fn slug(&self) -> String {
		slugify(&self.title())
	}

	/// Data rendered in the panel
	async fn context(&self, _db: &dyn Database) -> AdminResult<JsonValue> {
		Ok(JsonValue::Object(Default::default()))
	}
}

pub struct AdminSite {
	settings: AdminSettings,
	schema: Arc<Schema>,
	db: Arc<dyn Database>,
	auth: Arc<dyn AdminAuth>,
	admins: IndexMap<String, Arc<dyn ModelAdmin>>,
	panels: IndexMap<String, Arc<dyn AdminPanel>>,
}

impl fmt::Debug for AdminSite {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AdminSite")
			.field("site_name", &self.settings.site_name)
			.field("url_prefix", &self.settings.url_prefix)
			.field("admins", &self.admins.keys().collect::<Vec<_>>())
			.field("panels", &self.panels.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl AdminSite {
	pub fn builder(settings: AdminSettings, schema: Arc<Schema>, db: Arc<dyn Database>) -> AdminSiteBuilder {
		AdminSiteBuilder::new(settings, schema, db)
	}

	pub fn settings(&self) -> &AdminSettings {
		&self.settings
	}

	pub fn schema(&self) -> &Schema {
		&self.schema
	}

	pub fn db(&self) -> &dyn Database {
		self.db.as_ref()
	}

	/// Admin registered under `admin_name`
	pub fn admin(&self, admin_name: &str) -> AdminResult<&Arc<dyn ModelAdmin>> {
		self.admins
			.get(admin_name)
			.ok_or_else(|| AdminError::ModelNotRegistered(admin_name.to_string()))
	}

	/// Admin of the entity type named `entity`
	pub fn admin_for(&self, entity: &str) -> Option<&Arc<dyn ModelAdmin>> {
		self.admins.values().find(|admin| admin.entity().name() == entity)
	}

	pub fn contains(&self, entity: &str) -> bool {
		self.admin_for(entity).is_some()
	}

	/// Registered admins sorted by admin name
	pub fn model_admins(&self) -> Vec<&Arc<dyn ModelAdmin>> {
		let mut admins: Vec<_> = self.admins.values().collect();
		admins.sort_by_key(|admin| admin.admin_name());
		admins
	}

	/// Registered panels sorted by slug
	pub fn panels(&self) -> Vec<&Arc<dyn AdminPanel>> {
		let mut panels: Vec<_> = self.panels.values().collect();
		panels.sort_by_key(|panel| panel.slug());
		panels
	}

	/// Path of `route` under the configured prefix
	pub fn url(&self, route: &Route) -> String {
		route.url(self.settings.prefix())
	}

	/// Serve one request; every failure becomes an error response
	pub async fn handle(&self, request: Request<Bytes>) -> Response<AdminBody> {
		let method = request.method().clone();
		let path = request.uri().path().to_string();
		let response = match self.dispatch(request).await {
			Ok(response) => response,
			Err(e) => error_response(&e),
		};
		tracing::debug!(%method, %path, status = response.status().as_u16(), "admin request");
		response
	}

	async fn dispatch(&self, request: Request<Bytes>) -> AdminResult<Response<AdminBody>> {
		let request = AdminRequest::from_http(request)?;
		let route = router::resolve(self.settings.prefix(), &request.path)
			.ok_or_else(|| AdminError::NotFound(request.path.clone()))?;
		let user = match authorize(self.auth.as_ref(), &request).await {
			Authorization::Granted(user) => user,
			Authorization::Login(location) => return Ok(redirect(&location)),
			Authorization::Denied(user) => return Err(AdminError::PermissionDenied(user.username)),
		};
		let admin = match route.admin_name() {
			Some(name) => Some(Arc::clone(self.admin(name)?)),
			None => None,
		};
		match (route, admin) {
			(Route::Dashboard, _) => views::dashboard(self, &user).await,
			(Route::Index { .. }, Some(admin)) => views::index(self, admin.as_ref(), &request).await,
			(Route::Add { .. }, Some(admin)) => views::add(self, admin.as_ref(), &request).await,
			(Route::Edit { pk, .. }, Some(admin)) => views::edit(self, admin.as_ref(), &request, &pk).await,
			(Route::Delete { .. }, Some(admin)) => views::delete(self, admin.as_ref(), &request).await,
			(Route::Export { .. }, Some(admin)) => views::export(self, admin.as_ref(), &request).await,
			(Route::Ajax { .. }, Some(admin)) => views::ajax_list(self, admin.as_ref(), &request).await,
			(_, None) => Err(AdminError::NotFound(request.path.clone())),
		}
	}
}

/// Startup-time assembly of an [`AdminSite`]
pub struct AdminSiteBuilder {
	settings: AdminSettings,
	schema: Arc<Schema>,
	db: Arc<dyn Database>,
	auth: Option<Arc<dyn AdminAuth>>,
	admins: IndexMap<String, Arc<dyn ModelAdmin>>,
	panels: IndexMap<String, Arc<dyn AdminPanel>>,
}

impl AdminSiteBuilder {
	pub fn new(settings: AdminSettings, schema: Arc<Schema>, db: Arc<dyn Database>) -> Self {
		Self {
			settings,
			schema,
			db,
			auth: None,
			admins: IndexMap::new(),
			panels: IndexMap::new(),
		}
	}

	/// Auth collaborator; defaults to [`ExtensionAuth`] with the configured login URL
	pub fn auth(mut self, auth: Arc<dyn AdminAuth>) -> Self {
		self.auth = Some(auth);
		self
	}

	/// Register an admin under its admin name, replacing any previous one
	pub fn register(mut self, admin: impl ModelAdmin + 'static) -> Self {
		let name = admin.admin_name();
		if self.admins.insert(name.clone(), Arc::new(admin)).is_some() {
			tracing::warn!(admin = %name, "replaced registered model admin");
		}
		self
	}

	/// Remove the admin of entity type `entity`
	pub fn unregister(mut self, entity: &str) -> Self {
		self.admins.retain(|_, admin| admin.entity().name() != entity);
		self
	}

	pub fn register_panel(mut self, panel: impl AdminPanel + 'static) -> Self {
		self.panels.insert(panel.slug(), Arc::new(panel));
		self
	}

	/// Remove the panel titled `title`
	pub fn unregister_panel(mut self, title: &str) -> Self {
		self.panels.retain(|_, panel| panel.title() != title);
		self
	}

	/// Validate settings and registrations and freeze the site
	pub fn build(self) -> AdminResult<Arc<AdminSite>> {
		self.settings.validate()?;
		for (name, admin) in &self.admins {
			let entity = admin.entity().name();
			if self.schema.get(entity).is_none() {
				return Err(AdminError::Configuration(format!(
					"admin '{}' manages '{}', which is not in the schema",
					name, entity
				)));
			}
		}
		let auth = self
			.auth
			.unwrap_or_else(|| Arc::new(ExtensionAuth::new(self.settings.login_url.clone())));
		tracing::info!(
			site = %self.settings.site_name,
			prefix = %self.settings.url_prefix,
			admins = self.admins.len(),
			panels = self.panels.len(),
			"admin site ready"
		);
		Ok(Arc::new(AdminSite {
			settings: self.settings,
			schema: self.schema,
			db: self.db,
			auth,
			admins: self.admins,
			panels: self.panels,
		}))
	}
}

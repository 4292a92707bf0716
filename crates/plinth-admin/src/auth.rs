//! Admin authentication contract
//!
//! The admin never authenticates anyone itself. An [`AdminAuth`] implementation
//! tells it who is logged in and whether that user may use the admin; every
//! route goes through [`authorize`] first.

use crate::http::AdminRequest;
use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

/// The logged-in user as seen by the admin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser {
	pub username: String,
	pub is_admin: bool,
}

impl AdminUser {
	pub fn new(username: impl Into<String>, is_admin: bool) -> Self {
		Self {
			username: username.into(),
			is_admin,
		}
	}
}

#[async_trait]
pub trait AdminAuth: Send + Sync {
	async fn logged_in_user(&self, request: &AdminRequest) -> Option<AdminUser>;

	async fn has_permission(&self, user: &AdminUser) -> bool {
		user.is_admin
	}

	fn login_url(&self) -> &str;
}

/// Reads the [`AdminUser`] that upstream middleware stored in the request extensions
#[derive(Debug, Clone)]
pub struct ExtensionAuth {
	login_url: String,
}

impl ExtensionAuth {
	pub fn new(login_url: impl Into<String>) -> Self {
		Self {
			login_url: login_url.into(),
		}
	}
}

#[async_trait]
impl AdminAuth for ExtensionAuth {
	async fn logged_in_user(&self, request: &AdminRequest) -> Option<AdminUser> {
		request.extensions.get::<AdminUser>().cloned()
	}

	fn login_url(&self) -> &str {
		&self.login_url
	}
}

/// Outcome of the check wrapped around every route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
	Granted(AdminUser),
	/// Not logged in; redirect to this login URL
	Login(String),
	Denied(AdminUser),
}

/// `login_url?next=<path and query>`, with `next` percent-encoded
pub fn login_redirect_url(login_url: &str, next: &str) -> String {
	let separator = if login_url.contains('?') { '&' } else { '?' };
	format!(
		"{}{}next={}",
		login_url,
		separator,
		utf8_percent_encode(next, NON_ALPHANUMERIC)
	)
}

pub async fn authorize(auth: &dyn AdminAuth, request: &AdminRequest) -> Authorization {
	let Some(user) = auth.logged_in_user(request).await else {
		return Authorization::Login(login_redirect_url(auth.login_url(), &request.full_path()));
	};
	if auth.has_permission(&user).await {
		Authorization::Granted(user)
	} else {
		tracing::warn!(user = %user.username, path = %request.path, "admin permission denied");
		Authorization::Denied(user)
	}
}

//! HTTP/1 serving on hyper
//!
//! Request bodies are collected before dispatch; response bodies are passed
//! through untouched, so export streams reach the client chunk by chunk.

use crate::http::{AdminBody, BoxError};
use crate::site::AdminSite;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::Service;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// Accept connections until accepting fails
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use plinth_admin::{AdminSettings, AdminSite, server};
/// use plinth_db::{Schema, SqliteDatabase};
/// use tokio::net::TcpListener;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Arc::new(SqliteDatabase::connect("sqlite://app.db").await?);
/// let schema = Arc::new(Schema::builder().build()?);
/// let site = AdminSite::builder(AdminSettings::default(), schema, db).build()?;
///
/// let listener = TcpListener::bind("127.0.0.1:8000").await?;
/// server::serve(listener, site).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(listener: TcpListener, site: Arc<AdminSite>) -> std::io::Result<()> {
	serve_with_shutdown(listener, site, std::future::pending()).await
}

/// Accept connections until `shutdown` resolves
///
/// Connections already accepted keep running on their own tasks.
pub async fn serve_with_shutdown<F>(listener: TcpListener, site: Arc<AdminSite>, shutdown: F) -> std::io::Result<()>
where
	F: Future<Output = ()>,
{
	tracing::info!(addr = ?listener.local_addr().ok(), prefix = %site.settings().url_prefix, "admin listening");
	tokio::pin!(shutdown);
	loop {
		tokio::select! {
			accepted = listener.accept() => {
				let (stream, remote_addr) = accepted?;
				let site = Arc::clone(&site);
				tokio::spawn(async move {
					if let Err(e) = handle_connection(stream, remote_addr, site).await {
						tracing::debug!(%remote_addr, error = %e, "connection closed with error");
					}
				});
			}
			_ = &mut shutdown => {
				tracing::info!("admin server stopped accepting connections");
				return Ok(());
			}
		}
	}
}

/// Serve every request of one TCP connection
pub async fn handle_connection(stream: TcpStream, remote_addr: SocketAddr, site: Arc<AdminSite>) -> Result<(), hyper::Error> {
	let service = AdminService { site, remote_addr };
	http1::Builder::new()
		.serve_connection(TokioIo::new(stream), service)
		.await
}

/// Hyper service forwarding to [`AdminSite::handle`]
struct AdminService {
	site: Arc<AdminSite>,
	remote_addr: SocketAddr,
}

impl Service<hyper::Request<Incoming>> for AdminService {
	type Response = hyper::Response<AdminBody>;
	type Error = BoxError;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

	fn call(&self, request: hyper::Request<Incoming>) -> Self::Future {
		let site = Arc::clone(&self.site);
		let remote_addr = self.remote_addr;
		Box::pin(async move {
			let (mut parts, body) = request.into_parts();
			let body: Bytes = body.collect().await?.to_bytes();
			parts.extensions.insert(remote_addr);
			let request = hyper::Request::from_parts(parts, body);
			Ok(site.handle(request).await)
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::auth::{AdminAuth, AdminUser};
	use crate::http::AdminRequest;
	use crate::model_admin::ModelAdminConfig;
	use crate::settings::AdminSettings;
	use async_trait::async_trait;
	use plinth_db::Database;
	use plinth_db::testing::{blog_database, blog_schema};
	use rstest::rstest;
	use tokio::io::{AsyncReadExt, AsyncWriteExt};
	use tokio::sync::oneshot;

	struct AlwaysAdmin;

	#[async_trait]
	impl AdminAuth for AlwaysAdmin {
		async fn logged_in_user(&self, _request: &AdminRequest) -> Option<AdminUser> {
			Some(AdminUser::new("alice", true))
		}

		fn login_url(&self) -> &str {
			"/login/"
		}
	}

	#[rstest]
	#[tokio::test]
	async fn test_serves_export_over_tcp() {
		// Arrange
		let schema = Arc::new(blog_schema());
		let db: Arc<dyn Database> = Arc::new(blog_database().await);
		let user = Arc::clone(schema.entity("User").unwrap());
		let site = AdminSite::builder(AdminSettings::default(), schema, db)
			.auth(Arc::new(AlwaysAdmin))
			.register(ModelAdminConfig::new(user).with_ordering("id"))
			.build()
			.unwrap();
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let (stop, stopped) = oneshot::channel::<()>();
		let server = tokio::spawn(serve_with_shutdown(listener, site, async {
			let _ = stopped.await;
		}));

		// Act
		let body = "fields=username";
		let mut stream = TcpStream::connect(addr).await.unwrap();
		let request = format!(
			"POST /admin/user/export/ HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
			 Content-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
			body.len(),
			body
		);
		stream.write_all(request.as_bytes()).await.unwrap();
		let mut response = String::new();
		stream.read_to_string(&mut response).await.unwrap();
		stop.send(()).unwrap();
		server.await.unwrap().unwrap();

		// Assert
		assert!(response.starts_with("HTTP/1.1 200 OK"), "{}", response);
		assert!(response.contains("attachment; filename=export-user.json"));
		assert!(response.contains(r#"{"username":"alice"}"#));
		assert!(response.contains(r#"{"username":"bob"}"#));
	}
}

//! End-to-end tests of the admin routes against the in-memory blog database

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, LOCATION};
use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use plinth_admin::{AdminBody, AdminPanel, AdminResult, AdminSettings, AdminSite, AdminUser, ModelAdminConfig};
use plinth_db::testing::{blog_database, blog_schema};
use plinth_db::{Database, SqliteDatabase};
use rstest::rstest;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

struct SiteStats;

#[async_trait]
impl AdminPanel for SiteStats {
	fn title(&self) -> String {
		"Site Stats".to_string()
	}

	async fn context(&self, db: &dyn Database) -> AdminResult<JsonValue> {
		let users = db.fetch_count("SELECT COUNT(*) FROM users").await?;
		Ok(json!({ "users": users }))
	}
}

struct Fixture {
	site: Arc<AdminSite>,
	db: Arc<SqliteDatabase>,
}

impl Fixture {
	async fn new() -> Self {
		Self::with_settings(AdminSettings::default()).await
	}

	async fn with_settings(settings: AdminSettings) -> Self {
		let schema = Arc::new(blog_schema());
		let db = Arc::new(blog_database().await);
		let entity = |name: &str| Arc::clone(schema.entity(name).unwrap());
		let site = AdminSite::builder(
			settings,
			Arc::clone(&schema),
			Arc::clone(&db) as Arc<dyn Database>,
		)
		.register(
			ModelAdminConfig::new(entity("Post"))
				.with_columns(vec!["id", "title", "author", "views"])
				.with_paginate_by(2),
		)
		.register(ModelAdminConfig::new(entity("User")).with_ordering("id"))
		.register(
			ModelAdminConfig::new(entity("Comment"))
				.with_foreign_key_lookup("post", "title")
				.with_filter_paginate_by(2),
		)
		.register(ModelAdminConfig::new(entity("Category")).with_delete_recursive(false))
		.register_panel(SiteStats)
		.build()
		.unwrap();
		Self { site, db }
	}

	async fn send(&self, request: Request<Bytes>) -> Response<AdminBody> {
		self.site.handle(request).await
	}

	async fn get(&self, uri: &str) -> Response<AdminBody> {
		self.send(as_user(Request::builder().uri(uri).body(Bytes::new()).unwrap(), true))
			.await
	}

	async fn post(&self, uri: &str, body: &str) -> Response<AdminBody> {
		let request = Request::builder()
			.method(Method::POST)
			.uri(uri)
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
			.body(Bytes::from(body.to_string()))
			.unwrap();
		self.send(as_user(request, true)).await
	}

	async fn count(&self, sql: &str) -> u64 {
		self.db.fetch_count(sql).await.unwrap()
	}
}

fn as_user(mut request: Request<Bytes>, is_admin: bool) -> Request<Bytes> {
	request
		.extensions_mut()
		.insert(AdminUser::new("alice", is_admin));
	request
}

async fn body_bytes(response: Response<AdminBody>) -> Bytes {
	response.into_body().collect().await.unwrap().to_bytes()
}

async fn body_json(response: Response<AdminBody>) -> JsonValue {
	serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn location(response: &Response<AdminBody>) -> &str {
	response.headers()[LOCATION].to_str().unwrap()
}

#[rstest]
#[tokio::test]
async fn test_anonymous_request_redirects_to_login() {
	// Arrange
	let fixture = Fixture::new().await;
	let request = Request::builder()
		.uri("/admin/post/?page=2")
		.body(Bytes::new())
		.unwrap();

	// Act
	let response = fixture.send(request).await;

	// Assert
	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(
		location(&response),
		"/accounts/login/?next=%2Fadmin%2Fpost%2F%3Fpage%3D2"
	);
}

#[rstest]
#[tokio::test]
async fn test_user_without_permission_is_forbidden() {
	let fixture = Fixture::new().await;
	let request = as_user(Request::builder().uri("/admin/").body(Bytes::new()).unwrap(), false);

	let response = fixture.send(request).await;

	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	assert_eq!(body_json(response).await["status"], 403);
}

#[rstest]
#[case("/admin/tag/")]
#[case("/admin/post/1/extra/")]
#[case("/elsewhere/")]
#[tokio::test]
async fn test_unknown_routes_are_not_found(#[case] uri: &str) {
	let fixture = Fixture::new().await;

	let response = fixture.get(uri).await;

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn test_dashboard_lists_sorted_admins_and_panels() {
	// Arrange
	let fixture = Fixture::new().await;

	// Act
	let context = body_json(fixture.get("/admin/").await).await;

	// Assert
	let names: Vec<&str> = context["model_admins"]
		.as_array()
		.unwrap()
		.iter()
		.map(|m| m["admin_name"].as_str().unwrap())
		.collect();
	assert_eq!(names, vec!["category", "comment", "post", "user"]);
	assert_eq!(context["model_admins"][2]["urls"]["add"], "/admin/post/add/");
	assert_eq!(
		context["panels"],
		json!([{"title": "Site Stats", "slug": "site-stats", "context": {"users": 2}}])
	);
	assert_eq!(context["user"], "alice");
}

#[rstest]
#[tokio::test]
async fn test_index_filters_orders_and_paginates() {
	// Arrange
	let fixture = Fixture::new().await;

	// Act
	let context = body_json(
		fixture
			.get("/admin/post/?author__username=alice&ordering=-views")
			.await,
	)
	.await;

	// Assert
	assert_eq!(
		context["rows"],
		json!([
			{"pk": 1, "url": "/admin/post/1/", "values": ["1", "Hello World", "1", "10"]},
			{"pk": 2, "url": "/admin/post/2/", "values": ["2", "Second Post", "1", "3"]},
		])
	);
	assert_eq!(context["page"]["total"], 2);
	assert_eq!(context["active_filters"], json!([["author__username", "alice"]]));
	assert_eq!(context["filter_tree"]["children"]["author"]["entity"], "User");
	assert_eq!(context["columns"][3]["verbose_name"], "Views");
	assert_eq!(
		context["columns"][3]["sort_url"],
		"?author__username=alice&ordering=views"
	);
}

#[rstest]
#[tokio::test]
async fn test_index_second_page() {
	let fixture = Fixture::new().await;

	let context = body_json(fixture.get("/admin/post/?ordering=id&page=2").await).await;

	assert_eq!(context["rows"].as_array().unwrap().len(), 1);
	assert_eq!(context["rows"][0]["pk"], 3);
	assert_eq!(context["page"]["pages"], 2);
	assert_eq!(context["prev_url"], "?ordering=id&page=1");
	assert_eq!(context["next_url"], JsonValue::Null);
}

#[rstest]
#[case("id=1&id=3&action=delete", "/admin/post/delete/?id=1&id=3")]
#[case("id=1&id=3&action=export", "/admin/post/export/?id__in=1%2C3")]
#[tokio::test]
async fn test_bulk_action_redirects(#[case] body: &str, #[case] expected: &str) {
	let fixture = Fixture::new().await;

	let response = fixture.post("/admin/post/", body).await;

	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(location(&response), expected);
}

#[rstest]
#[tokio::test]
async fn test_add_form_hides_auto_increment_key() {
	let fixture = Fixture::new().await;

	let context = body_json(fixture.get("/admin/post/add/").await).await;

	let fields: Vec<&str> = context["form"]["fields"]
		.as_array()
		.unwrap()
		.iter()
		.map(|f| f["name"].as_str().unwrap())
		.collect();
	assert_eq!(
		fields,
		vec!["author", "title", "body", "published", "views", "rating", "created"]
	);
	assert_eq!(context["adding"], true);
}

#[rstest]
#[tokio::test]
async fn test_add_saves_and_redirects_to_index() {
	// Arrange
	let fixture = Fixture::new().await;
	let body = "author=2&title=Fresh&body=Text&views=5&created=2024-05-01&save=Save";

	// Act
	let response = fixture.post("/admin/post/add/", body).await;

	// Assert
	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(location(&response), "/admin/post/");
	assert_eq!(
		fixture
			.count("SELECT COUNT(*) FROM posts WHERE title = 'Fresh' AND author_id = 2 AND published = 0")
			.await,
		1
	);
}

#[rstest]
#[tokio::test]
async fn test_add_with_unknown_relation_shows_errors() {
	// Arrange
	let fixture = Fixture::new().await;
	let body = "author=99&title=Orphan&body=x&views=1&created=2024-05-01";

	// Act
	let response = fixture.post("/admin/post/add/", body).await;

	// Assert
	assert_eq!(response.status(), StatusCode::OK);
	let context = body_json(response).await;
	assert_eq!(context["form"]["errors"], json!({"author": ["Select a valid choice."]}));
	assert_eq!(fixture.count("SELECT COUNT(*) FROM posts").await, 3);
}

#[rstest]
#[tokio::test]
async fn test_edit_shows_current_values() {
	let fixture = Fixture::new().await;

	let context = body_json(fixture.get("/admin/post/1/").await).await;

	let title = context["form"]["fields"]
		.as_array()
		.unwrap()
		.iter()
		.find(|f| f["name"] == "title")
		.unwrap();
	assert_eq!(title["value"], "Hello World");
	assert_eq!(context["pk"], 1);
	assert_eq!(context["adding"], false);
}

#[rstest]
#[case("", "/admin/post/2/")]
#[case("&save_add=1", "/admin/post/add/")]
#[case("&save=1", "/admin/post/")]
#[tokio::test]
async fn test_edit_saves_and_redirects_by_button(#[case] button: &str, #[case] expected: &str) {
	// Arrange
	let fixture = Fixture::new().await;
	let body = format!(
		"author=1&title=Renamed&body=More+words&views=3&created=2024-02-10{}",
		button
	);

	// Act
	let response = fixture.post("/admin/post/2/", &body).await;

	// Assert
	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(location(&response), expected);
	assert_eq!(
		fixture
			.count("SELECT COUNT(*) FROM posts WHERE id = 2 AND title = 'Renamed'")
			.await,
		1
	);
}

#[rstest]
#[case("/admin/post/99/", StatusCode::NOT_FOUND)]
#[case("/admin/post/abc/", StatusCode::BAD_REQUEST)]
#[tokio::test]
async fn test_edit_rejects_missing_or_malformed_keys(#[case] uri: &str, #[case] expected: StatusCode) {
	let fixture = Fixture::new().await;

	let response = fixture.get(uri).await;

	assert_eq!(response.status(), expected);
}

#[rstest]
#[tokio::test]
async fn test_delete_page_previews_dependents() {
	// Arrange
	let fixture = Fixture::new().await;

	// Act
	let context = body_json(fixture.get("/admin/user/delete/?id=1").await).await;

	// Assert
	let object = &context["objects"][0];
	assert_eq!(object["repr"], "alice");
	let collected: Vec<(&str, bool)> = object["collected"]
		.as_array()
		.unwrap()
		.iter()
		.map(|g| (g["entity"].as_str().unwrap(), g["detach"].as_bool().unwrap()))
		.collect();
	assert_eq!(
		collected,
		vec![
			("Comment", true),
			("Post", false),
			("Profile", false),
			("Comment", false),
		]
	);
}

#[rstest]
#[tokio::test]
async fn test_delete_post_cascades_and_redirects() {
	// Arrange
	let fixture = Fixture::new().await;

	// Act
	let response = fixture.post("/admin/user/delete/", "id=1").await;

	// Assert
	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(location(&response), "/admin/user/");
	assert_eq!(fixture.count("SELECT COUNT(*) FROM users").await, 1);
	assert_eq!(fixture.count("SELECT COUNT(*) FROM posts").await, 1);
	assert_eq!(fixture.count("SELECT COUNT(*) FROM comments").await, 1);
}

#[rstest]
#[tokio::test]
async fn test_delete_beyond_depth_limit_is_flagged_and_refused() {
	// Arrange
	let fixture = Fixture::with_settings(AdminSettings {
		max_delete_depth: 1,
		..AdminSettings::default()
	})
	.await;

	// Act
	let context = body_json(fixture.get("/admin/user/delete/?id=1").await).await;
	let response = fixture.post("/admin/user/delete/", "id=1").await;

	// Assert
	assert_eq!(context["objects"][0]["truncated"], json!(true));
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(fixture.count("SELECT COUNT(*) FROM users").await, 2);
	assert_eq!(fixture.count("SELECT COUNT(*) FROM posts").await, 3);
}

#[rstest]
#[tokio::test]
async fn test_non_recursive_delete_removes_only_selected_rows() {
	let fixture = Fixture::new().await;

	let response = fixture.post("/admin/category/delete/", "id=3").await;

	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(fixture.count("SELECT COUNT(*) FROM categories").await, 2);
}

#[rstest]
#[tokio::test]
async fn test_export_page_offers_related_fields() {
	let fixture = Fixture::new().await;

	let context = body_json(fixture.get("/admin/post/export/?published=1").await).await;

	assert_eq!(context["related_fields"][0]["path"], "author");
	assert_eq!(context["related_fields"][0]["fields"][0]["key"], "author__id");
	assert_eq!(context["fields"][0]["key"], "id");
	assert_eq!(context["active_filters"], json!([["published", "1"]]));
}

#[rstest]
#[tokio::test]
async fn test_export_streams_filtered_rows() {
	// Arrange
	let fixture = Fixture::new().await;

	// Act
	let response = fixture
		.post(
			"/admin/post/export/?published=1&ordering=id",
			"fields=title&fields=author__username",
		)
		.await;

	// Assert
	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		response.headers()[CONTENT_DISPOSITION],
		"attachment; filename=export-post.json"
	);
	let exported: JsonValue = serde_json::from_slice(&body_bytes(response).await).unwrap();
	assert_eq!(
		exported,
		json!([
			{"title": "Hello World", "author": {"username": "alice"}},
			{"title": "Bob's Notes", "author": {"username": "bob"}},
		])
	);
}

#[rstest]
#[case("fields=author__password")]
#[case("fields=nope")]
#[case("")]
#[tokio::test]
async fn test_export_rejects_bad_field_lists(#[case] body: &str) {
	let fixture = Fixture::new().await;

	let response = fixture.post("/admin/post/export/", body).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[rstest]
#[tokio::test]
async fn test_ajax_lookup_searches_related_rows() {
	// Arrange
	let fixture = Fixture::new().await;

	// Act
	let context = body_json(
		fixture
			.get("/admin/comment/_ajax/?field=post&query=POST")
			.await,
	)
	.await;

	// Assert
	assert_eq!(
		context,
		json!({
			"prev_page": 0,
			"next_page": 0,
			"object_list": [{"id": 2, "repr": "Second Post"}],
		})
	);
}

#[rstest]
#[case("1", 0, 2, vec!["Bob's Notes", "Hello World"])]
#[case("2", 1, 0, vec!["Second Post"])]
#[tokio::test]
async fn test_ajax_lookup_pages(
	#[case] page: &str,
	#[case] prev_page: u64,
	#[case] next_page: u64,
	#[case] reprs: Vec<&str>,
) {
	let fixture = Fixture::new().await;

	let context = body_json(
		fixture
			.get(&format!("/admin/comment/_ajax/?field=post&page={}", page))
			.await,
	)
	.await;

	assert_eq!(context["prev_page"], prev_page);
	assert_eq!(context["next_page"], next_page);
	let found: Vec<&str> = context["object_list"]
		.as_array()
		.unwrap()
		.iter()
		.map(|o| o["repr"].as_str().unwrap())
		.collect();
	assert_eq!(found, reprs);
}

#[rstest]
#[case("/admin/comment/_ajax/?field=author")]
#[case("/admin/comment/_ajax/")]
#[tokio::test]
async fn test_ajax_lookup_requires_configured_field(#[case] uri: &str) {
	let fixture = Fixture::new().await;

	let response = fixture.get(uri).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

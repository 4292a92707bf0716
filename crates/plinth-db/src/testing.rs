//! Blog schema fixture shared by the workspace tests.
//!
//! Relations: `Profile.user -> User`, `Post.author -> User`,
//! `Comment.post -> Post`, `Comment.author -> User` (nullable) and the
//! self-reference `Category.parent -> Category` (nullable).

use crate::schema::{EntityType, Field, Schema};
use crate::sqlite::SqliteDatabase;

/// Table definitions matching [`blog_schema`]
pub const BLOG_DDL: &[&str] = &[
	"CREATE TABLE users (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		username TEXT NOT NULL,
		email TEXT NOT NULL,
		is_admin BOOLEAN NOT NULL DEFAULT 0
	)",
	"CREATE TABLE profiles (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		user_id INTEGER NOT NULL REFERENCES users (id),
		bio TEXT NOT NULL
	)",
	"CREATE TABLE posts (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		author_id INTEGER NOT NULL REFERENCES users (id),
		title TEXT NOT NULL,
		body TEXT NOT NULL DEFAULT '',
		published BOOLEAN NOT NULL DEFAULT 0,
		views INTEGER NOT NULL DEFAULT 0,
		rating REAL,
		created TEXT NOT NULL
	)",
	"CREATE TABLE comments (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		post_id INTEGER NOT NULL REFERENCES posts (id),
		author_id INTEGER REFERENCES users (id),
		content TEXT NOT NULL
	)",
	"CREATE TABLE categories (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		parent_id INTEGER REFERENCES categories (id),
		name TEXT NOT NULL
	)",
];

/// Seed rows for [`BLOG_DDL`]
pub const BLOG_SEED: &[&str] = &[
	"INSERT INTO users (id, username, email, is_admin) VALUES
		(1, 'alice', 'alice@example.com', 1),
		(2, 'bob', 'bob@example.com', 0)",
	"INSERT INTO profiles (id, user_id, bio) VALUES (1, 1, 'Rustacean')",
	"INSERT INTO posts (id, author_id, title, body, published, views, rating, created) VALUES
		(1, 1, 'Hello World', 'First!', 1, 10, 4.5, '2024-01-05'),
		(2, 1, 'Second Post', 'More words', 0, 3, NULL, '2024-02-10'),
		(3, 2, 'Bob''s Notes', 'Notes', 1, 42, 3.0, '2024-03-15')",
	"INSERT INTO comments (id, post_id, author_id, content) VALUES
		(1, 1, 2, 'Nice'),
		(2, 1, NULL, 'Anonymous praise'),
		(3, 3, 1, 'Thanks')",
	"INSERT INTO categories (id, parent_id, name) VALUES
		(1, NULL, 'Root'),
		(2, 1, 'Child'),
		(3, 2, 'Grandchild')",
];

pub fn blog_schema() -> Schema {
	let built = Schema::builder()
		.entity(
			EntityType::builder("User")
				.table("users")
				.field(Field::id())
				.field(Field::text("username"))
				.field(Field::text("email"))
				.field(Field::boolean("is_admin"))
				.display_field("username"),
		)
		.entity(
			EntityType::builder("Profile")
				.table("profiles")
				.field(Field::id())
				.field(Field::foreign_key("user", "User"))
				.field(Field::text("bio")),
		)
		.entity(
			EntityType::builder("Post")
				.table("posts")
				.field(Field::id())
				.field(Field::foreign_key("author", "User"))
				.field(Field::text("title"))
				.field(Field::text("body"))
				.field(Field::boolean("published"))
				.field(Field::integer("views"))
				.field(Field::float("rating").as_nullable())
				.field(Field::date("created"))
				.display_field("title"),
		)
		.entity(
			EntityType::builder("Comment")
				.table("comments")
				.field(Field::id())
				.field(Field::foreign_key("post", "Post"))
				.field(Field::foreign_key("author", "User").as_nullable())
				.field(Field::text("content")),
		)
		.entity(
			EntityType::builder("Category")
				.table("categories")
				.field(Field::id())
				.field(Field::foreign_key("parent", "Category").as_nullable())
				.field(Field::text("name"))
				.display_field("name"),
		)
		.build();
	match built {
		Ok(schema) => schema,
		Err(e) => panic!("blog schema fixture is invalid: {}", e),
	}
}

/// In-memory database with the blog tables and seed rows
///
/// # Panics
///
/// Panics when the database cannot be created; intended for tests only.
pub async fn blog_database() -> SqliteDatabase {
	let db = match SqliteDatabase::in_memory().await {
		Ok(db) => db,
		Err(e) => panic!("cannot open in-memory sqlite: {}", e),
	};
	for sql in BLOG_DDL.iter().chain(BLOG_SEED) {
		if let Err(e) = sqlx::query(sql).execute(db.pool()).await {
			panic!("blog fixture statement failed: {}\n{}", e, sql);
		}
	}
	db
}

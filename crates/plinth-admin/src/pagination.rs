//! Page-number pagination over a query

use crate::error::AdminResult;
use plinth_db::{Database, DatabaseExt, Record, SelectQuery};
use serde::Serialize;

/// Position of one page within a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
	pub number: u64,
	pub per_page: u64,
	pub total: u64,
	pub pages: u64,
	/// Previous page number, 0 on the first page
	pub prev_page: u64,
	/// Next page number, 0 on the last page
	pub next_page: u64,
}

impl Page {
	/// Clamp `requested` into `1..=pages`; an empty result still has one page
	pub fn new(requested: u64, per_page: u64, total: u64) -> Self {
		let per_page = per_page.max(1);
		let pages = total.div_ceil(per_page).max(1);
		let number = requested.clamp(1, pages);
		Self {
			number,
			per_page,
			total,
			pages,
			prev_page: if number > 1 { number - 1 } else { 0 },
			next_page: if number < pages { number + 1 } else { 0 },
		}
	}
}

/// Parse a `page` query value; anything but a positive integer means page 1
pub fn parse_page(raw: Option<&str>) -> u64 {
	raw.and_then(|s| s.trim().parse::<u64>().ok())
		.filter(|page| *page > 0)
		.unwrap_or(1)
}

pub struct PaginatedQuery {
	query: SelectQuery,
	per_page: u64,
	requested: u64,
}

impl PaginatedQuery {
	pub fn new(query: SelectQuery, per_page: u64, page: Option<&str>) -> Self {
		Self {
			query,
			per_page,
			requested: parse_page(page),
		}
	}

	/// Count the full result, then load the rows of the clamped page
	pub async fn fetch(&self, db: &dyn Database) -> AdminResult<(Page, Vec<Record>)> {
		let total = db.count_rows(&self.query).await?;
		let page = Page::new(self.requested, self.per_page, total);
		let rows = if total == 0 {
			Vec::new()
		} else {
			let query = self.query.clone().paginate(page.number, page.per_page);
			db.fetch_records(&query).await?
		};
		Ok((page, rows))
	}
}

//! Page number pagination
//!
//! Listings take `page` (1-based) and `page_size` query parameters and
//! render as `{"data": [..], "links": {..}, "meta": {"pagination": {..}}}`.

use axum::http::{HeaderMap, Uri};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

use crate::prelude::*;
use crate::settings::Settings;

pub const PAGE_QUERY_PARAM: &str = "page";
pub const PAGE_SIZE_QUERY_PARAM: &str = "page_size";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
	pub page: u64,
	pub page_size: u64,
}

impl PageRequest {
	/// Page requested by the query string.
	///
	/// An unparsable or zero `page` is `Error::NotFound`; a bad `page_size`
	/// falls back to the default and is capped at the maximum.
	pub fn from_query(query: &HashMap<String, String>, settings: &Settings) -> ApiResult<PageRequest> {
		let page = match query.get(PAGE_QUERY_PARAM) {
			Some(page) => page.trim().parse::<u64>().ok().filter(|p| *p > 0).ok_or(Error::NotFound)?,
			None => 1,
		};
		let page_size = query
			.get(PAGE_SIZE_QUERY_PARAM)
			.and_then(|size| size.trim().parse::<u64>().ok())
			.filter(|size| *size > 0)
			.map_or(settings.page_size, |size| size.min(settings.max_page_size))
			.max(1);

		Ok(PageRequest { page, page_size })
	}

	pub fn offset(&self) -> u64 {
		self.page.saturating_sub(1).saturating_mul(self.page_size)
	}

	/// Number of pages for `count` items; an empty listing still has one page
	pub fn pages(&self, count: u64) -> u64 {
		count.div_ceil(self.page_size.max(1)).max(1)
	}
}

#[derive(Debug, Serialize)]
struct Links {
	first: Option<String>,
	last: Option<String>,
	next: Option<String>,
	prev: Option<String>,
}

#[derive(Debug, Serialize)]
struct PaginationMeta {
	page: u64,
	pages: u64,
	count: u64,
}

#[derive(Debug, Serialize)]
struct Meta {
	pagination: PaginationMeta,
}

#[derive(Debug, Serialize)]
struct PageBody {
	data: Vec<Value>,
	links: Links,
	meta: Meta,
}

/// Absolute URL of the request, for building page links
pub fn request_url(headers: &HeaderMap, uri: &Uri) -> ApiResult<Url> {
	let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
	let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
	let url = match (uri.scheme_str(), uri.authority()) {
		(Some(scheme), Some(authority)) => format!("{}://{}{}", scheme, authority, path_and_query),
		_ => format!(
			"{}://{}{}",
			header("x-forwarded-proto").unwrap_or("http"),
			header("host").unwrap_or("localhost"),
			path_and_query
		),
	};
	Url::parse(&url).map_err(|_| Error::ValidationError("Invalid request URL".into()))
}

/// `url` with `key` set to `value`, keeping every other query parameter
pub fn replace_query_param(url: &Url, key: &str, value: &str) -> String {
	let mut replaced = false;
	let mut pairs: Vec<(String, String)> = url
		.query_pairs()
		.filter_map(|(k, v)| {
			if k != key {
				return Some((k.into_owned(), v.into_owned()));
			}
			if replaced {
				return None;
			}
			replaced = true;
			Some((k.into_owned(), value.to_string()))
		})
		.collect();
	if !replaced {
		pairs.push((key.to_string(), value.to_string()));
	}

	let mut url = url.clone();
	url.query_pairs_mut().clear().extend_pairs(pairs);
	url.to_string()
}

/// Render one page of `count` items
pub fn paginated_response(url: &Url, page: PageRequest, count: u64, data: Vec<Value>) -> ApiResult<Value> {
	let pages = page.pages(count);
	if page.page > pages {
		debug!(page = page.page, pages, "page out of range");
		return Err(Error::NotFound);
	}

	let link = |n: u64| replace_query_param(url, PAGE_QUERY_PARAM, &n.to_string());
	let body = PageBody {
		data,
		links: Links {
			first: Some(link(1)),
			last: Some(link(pages)),
			next: (page.page < pages).then(|| link(page.page + 1)),
			prev: (page.page > 1).then(|| link(page.page - 1)),
		},
		meta: Meta { pagination: PaginationMeta { page: page.page, pages, count } },
	};
	Ok(serde_json::to_value(body)?)
}


// vim: ts=4

//! Custom middlewares

use axum::{
	body::Body,
	extract::{Request, State},
	http::{HeaderValue, response::Response},
	middleware::Next,
};
use std::time::Instant;
use tracing::{Instrument, Span, field};

use crate::extract::{Auth, RequestId};
use crate::prelude::*;
use crate::token::TokenUser;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

fn record_user(user: &TokenUser) {
	let span = Span::current();
	if let Some(user_id) = user.id() {
		span.record("user_id", user_id);
	}
	if let Some(organization_id) = user.organization_id() {
		span.record("organization_id", organization_id);
	}
}

fn authenticate(app: &App, req: &Request) -> ApiResult<Option<TokenUser>> {
	if crate::auth::token_from_headers(req.headers()).is_none() {
		return Ok(None);
	}
	let user = app.verifier()?.authenticate(req.headers())?;
	Ok(user.map(|user| user.with_cache(app.permission_cache.clone())))
}

pub async fn require_auth(
	State(app): State<App>,
	mut req: Request,
	next: Next,
) -> ApiResult<Response<Body>> {
	let user = authenticate(&app, &req)?.ok_or(Error::Unauthorized)?;
	record_user(&user);
	req.extensions_mut().insert(Auth(user));

	Ok(next.run(req).await)
}

pub async fn optional_auth(
	State(app): State<App>,
	mut req: Request,
	next: Next,
) -> ApiResult<Response<Body>> {
	if let Some(user) = authenticate(&app, &req)? {
		record_user(&user);
		req.extensions_mut().insert(Auth(user));
	}

	Ok(next.run(req).await)
}

/// Wrap the request in a span carrying a request id and, once
/// authenticated, the user and organization ids
pub async fn log_requests(mut req: Request, next: Next) -> Response<Body> {
	let request_id: Box<str> = req
		.headers()
		.get(REQUEST_ID_HEADER)
		.and_then(|v| v.to_str().ok())
		.filter(|id| !id.is_empty())
		.map_or_else(|| uuid::Uuid::new_v4().to_string().into(), Into::into);
	req.extensions_mut().insert(RequestId(request_id.clone()));

	let span = info_span!(
		"request",
		request_id = %request_id,
		method = %req.method(),
		path = %req.uri().path(),
		user_id = field::Empty,
		organization_id = field::Empty,
	);

	async move {
		let started = Instant::now();
		let mut response = next.run(req).await;
		let status = response.status();
		if status.is_server_error() {
			warn!(status = status.as_u16(), elapsed = ?started.elapsed(), "request failed");
		} else {
			info!(status = status.as_u16(), elapsed = ?started.elapsed(), "request handled");
		}

		if let Ok(value) = HeaderValue::from_str(&request_id) {
			response.headers_mut().insert(REQUEST_ID_HEADER, value);
		}
		response
	}
	.instrument(span)
	.await
}


// vim: ts=4

//! Permission checks evaluated before a viewset action runs
//!
//! A `PermissionClass` is a constructor: viewsets store classes and
//! instantiate a fresh set of checks for every request.

use axum::http::HeaderMap;

use crate::prelude::*;
use crate::settings::Settings;
use crate::token::TokenUser;
use crate::utils::parse_dn;

/// Everything a permission check may look at
#[derive(Debug, Clone, Copy)]
pub struct RequestCtx<'a> {
	pub action: &'a Action,
	pub user: Option<&'a TokenUser>,
	pub headers: &'a HeaderMap,
	pub settings: &'a Settings,
	/// User permissions the viewset requires for this action, if any
	pub required_user_permissions: Option<&'a [Box<str>]>,
}

pub trait Permission: Send + Sync {
	fn name(&self) -> &'static str;

	fn has_permission(&self, ctx: &RequestCtx<'_>) -> bool;
}

pub type PermissionClass = fn() -> Box<dyn Permission>;

/// Permission class constructor for any `Default` permission type
pub fn class<P: Permission + Default + 'static>() -> Box<dyn Permission> {
	Box::new(P::default())
}

/// Run every check, failing on the first one that denies access
pub fn check_permissions(permissions: &[Box<dyn Permission>], ctx: &RequestCtx<'_>) -> ApiResult<()> {
	for permission in permissions {
		if !permission.has_permission(ctx) {
			warn!(
				permission = permission.name(),
				action = %ctx.action,
				user_id = ctx.user.and_then(TokenUser::id).unwrap_or("-"),
				"permission denied"
			);
			return Err(if ctx.user.is_some() { Error::PermissionDenied } else { Error::Unauthorized });
		}
	}
	Ok(())
}

// Built-in permissions //
//**********************//
#[derive(Debug, Default)]
pub struct AllowAny;

impl Permission for AllowAny {
	fn name(&self) -> &'static str {
		"AllowAny"
	}

	fn has_permission(&self, _ctx: &RequestCtx<'_>) -> bool {
		true
	}
}

#[derive(Debug, Default)]
pub struct IsAuthenticated;

impl Permission for IsAuthenticated {
	fn name(&self) -> &'static str {
		"IsAuthenticated"
	}

	fn has_permission(&self, ctx: &RequestCtx<'_>) -> bool {
		ctx.user.is_some()
	}
}

/// Requires the user to hold every permission the viewset lists for the
/// current action. Actions without requirements are allowed so the other
/// checks can decide.
#[derive(Debug, Default)]
pub struct HasViewSetActionPermissions;

impl Permission for HasViewSetActionPermissions {
	fn name(&self) -> &'static str {
		"HasViewSetActionPermissions"
	}

	fn has_permission(&self, ctx: &RequestCtx<'_>) -> bool {
		let Some(user) = ctx.user else {
			return false;
		};
		match ctx.required_user_permissions {
			Some(required) => user.has_perms(required),
			None => true,
		}
	}
}

/// Accepts calls from another internal service, identified by the client
/// certificate verified by the fronting proxy.
#[derive(Debug, Clone)]
pub struct InternalRequest {
	service_name: &'static str,
}

impl InternalRequest {
	pub const fn new(service_name: &'static str) -> Self {
		Self { service_name }
	}

	fn is_internal_call(headers: &HeaderMap) -> bool {
		let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
		header("x-nginx-source") == Some("internal") && header("x-ssl-client-verify") == Some("SUCCESS")
	}
}

impl Permission for InternalRequest {
	fn name(&self) -> &'static str {
		"InternalRequest"
	}

	fn has_permission(&self, ctx: &RequestCtx<'_>) -> bool {
		if ctx.settings.environment.is_development() {
			return true;
		}
		if !Self::is_internal_call(ctx.headers) {
			return false;
		}

		let dn = ctx.headers.get("x-ssl-client-dn").and_then(|v| v.to_str().ok()).unwrap_or("");
		let expected = format!(
			"{}.{}-internal",
			self.service_name,
			ctx.settings.environment.as_str().to_ascii_lowercase()
		);
		let cn = parse_dn(dn).remove("CN");
		if cn.as_deref() != Some(expected.as_str()) {
			debug!(expected = %expected, cn = ?cn, "internal call certificate mismatch");
			return false;
		}
		true
	}
}

/// Internal calls from the engine service
#[derive(Debug, Clone)]
pub struct EngineRequest(InternalRequest);

impl Default for EngineRequest {
	fn default() -> Self {
		Self(InternalRequest::new("engine"))
	}
}

impl Permission for EngineRequest {
	fn name(&self) -> &'static str {
		"EngineRequest"
	}

	fn has_permission(&self, ctx: &RequestCtx<'_>) -> bool {
		self.0.has_permission(ctx)
	}
}


// vim: ts=4

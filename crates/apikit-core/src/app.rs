//! App state type

use std::sync::Arc;

use crate::auth::JwtVerifier;
use crate::prelude::*;
use crate::rpc::RpcClient;
use crate::settings::Settings;
use crate::token::PermissionCache;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct AppState {
	pub settings: Settings,
	pub verifier: Option<JwtVerifier>,
	pub permission_cache: Arc<PermissionCache>,
	pub rpc: Option<RpcClient>,
}

impl AppState {
	pub fn new(settings: Settings) -> ApiResult<AppState> {
		let verifier = settings.jwt.as_ref().map(JwtVerifier::new).transpose()?;
		let rpc = RpcClient::from_settings(&settings)?;
		let permission_cache = Arc::new(PermissionCache::new(settings.permission_cache_capacity));

		Ok(AppState { settings, verifier, permission_cache, rpc })
	}

	pub fn verifier(&self) -> ApiResult<&JwtVerifier> {
		self.verifier.as_ref().ok_or_else(|| Error::config("JWT verification is not configured"))
	}

	pub fn rpc(&self) -> ApiResult<&RpcClient> {
		self.rpc.as_ref().ok_or_else(|| Error::config("ENGINE_RPC_URL is not configured"))
	}
}

impl std::fmt::Debug for AppState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AppState")
			.field("settings", &self.settings)
			.field("verifier", &self.verifier)
			.field("rpc", &self.rpc)
			.finish_non_exhaustive()
	}
}

pub type App = Arc<AppState>;

// vim: ts=4

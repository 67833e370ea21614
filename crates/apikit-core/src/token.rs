//! Token users and their feature-permission cache
//!
//! A token user is backed only by its JWT claims. Its permissions are derived
//! from the `features` claim and cached for the lifetime of the token, as
//! they cannot change until a new token is issued.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

use apikit_types::token::TokenClaims;

use crate::prelude::*;

/// Cache life used when the token does not carry a usable `exp`/`iat` pair
pub const FALLBACK_CACHE_LIFE_SECS: i64 = 300;

const DEFAULT_CACHE_CAPACITY: usize = 1024;

pub type Permissions = Arc<[Box<str>]>;

#[derive(Debug, Clone)]
struct CacheEntry {
	permissions: Permissions,
	expires_at: Timestamp,
}

/// Shared cache of flattened permission lists, keyed by token identity
pub struct PermissionCache {
	entries: parking_lot::Mutex<LruCache<Box<str>, CacheEntry>>,
}

impl PermissionCache {
	pub fn new(max_entries: usize) -> Self {
		let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
		Self { entries: parking_lot::Mutex::new(LruCache::new(capacity)) }
	}

	pub fn get(&self, key: &str) -> Option<Permissions> {
		let mut entries = self.entries.lock();
		let entry = entries.get(key)?;
		if Timestamp::now() >= entry.expires_at {
			entries.pop(key);
			return None;
		}
		Some(entry.permissions.clone())
	}

	pub fn put(&self, key: &str, permissions: Permissions, life_secs: i64) {
		let expires_at = Timestamp::now().add_seconds(life_secs);
		self.entries.lock().put(key.into(), CacheEntry { permissions, expires_at });
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

impl Default for PermissionCache {
	fn default() -> Self {
		Self::new(DEFAULT_CACHE_CAPACITY)
	}
}

impl std::fmt::Debug for PermissionCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PermissionCache").field("len", &self.len()).finish()
	}
}

// TokenUser //
//***********//
/// Authenticated user with no database representation
#[derive(Debug, Clone)]
pub struct TokenUser {
	pub claims: TokenClaims,
	/// Raw (encoded) token the claims were taken from
	pub raw_token: Box<str>,
	cache: Option<Arc<PermissionCache>>,
}

impl TokenUser {
	pub fn new(claims: TokenClaims, raw_token: impl Into<Box<str>>) -> Self {
		Self { claims, raw_token: raw_token.into(), cache: None }
	}

	pub fn with_cache(mut self, cache: Arc<PermissionCache>) -> Self {
		self.cache = Some(cache);
		self
	}

	pub fn id(&self) -> Option<&str> {
		self.claims.user_id.as_deref()
	}

	pub fn organization_id(&self) -> Option<&str> {
		self.claims.organization_id.as_deref()
	}

	/// Unique key for this token: `jti`, then `at_hash`, then `"{sub}.{exp}"`
	pub fn permission_cache_key(&self) -> Option<String> {
		if let Some(jti) = self.claims.jti.as_deref().filter(|s| !s.is_empty()) {
			return Some(jti.to_string());
		}
		if let Some(at_hash) = self.claims.at_hash.as_deref().filter(|s| !s.is_empty()) {
			return Some(at_hash.to_string());
		}
		match (self.claims.sub.as_deref().filter(|s| !s.is_empty()), self.claims.exp) {
			(Some(sub), Some(exp)) if exp != 0 => Some(format!("{}.{}", sub, exp)),
			_ => None,
		}
	}

	/// Token lifetime in seconds, or the fallback life
	pub fn permission_cache_life(&self) -> i64 {
		match (self.claims.exp, self.claims.iat) {
			(Some(exp), Some(iat)) if exp != 0 && iat != 0 => {
				exp.checked_sub(iat).filter(|life| *life > 0).unwrap_or(FALLBACK_CACHE_LIFE_SECS)
			}
			_ => FALLBACK_CACHE_LIFE_SECS,
		}
	}

	/// All `"{feature}.{permission}"` strings granted by the token
	pub fn all_permissions(&self) -> Permissions {
		let key = self.permission_cache_key();

		if let (Some(cache), Some(key)) = (&self.cache, &key) {
			if let Some(permissions) = cache.get(key) {
				if !permissions.is_empty() {
					return permissions;
				}
			}
		}

		let Some(features) = &self.claims.features else {
			return Arc::from([]);
		};
		if features.is_empty() {
			return Arc::from([]);
		}

		let permissions: Permissions = features
			.iter()
			.flat_map(|(feature, perms)| {
				perms.iter().map(move |perm| format!("{}.{}", feature, perm).into_boxed_str())
			})
			.collect();

		if let (Some(cache), Some(key)) = (&self.cache, &key) {
			debug!(key = %key, count = permissions.len(), "caching token permissions");
			cache.put(key, permissions.clone(), self.permission_cache_life());
		}

		permissions
	}

	pub fn has_perm(&self, perm: &str) -> bool {
		self.all_permissions().iter().any(|p| p.as_ref() == perm)
	}

	pub fn has_perms<S: AsRef<str>>(&self, perms: &[S]) -> bool {
		let granted = self.all_permissions();
		perms.iter().all(|perm| granted.iter().any(|p| p.as_ref() == perm.as_ref()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::BTreeMap;

	fn claims_with_features() -> TokenClaims {
		let mut features = BTreeMap::new();
		features.insert("shipments".into(), vec!["view".into(), "edit".into()]);
		features.insert("wallets".into(), vec!["sign".into()]);
		TokenClaims {
			user_id: Some("user-1".into()),
			features: Some(features),
			..Default::default()
		}
	}

	#[test]
	fn test_cache_key_preference() {
		let mut claims = TokenClaims {
			jti: Some("jti-1".into()),
			at_hash: Some("hash-1".into()),
			sub: Some("sub".into()),
			exp: Some(2000),
			..Default::default()
		};
		assert_eq!(TokenUser::new(claims.clone(), "t").permission_cache_key().as_deref(), Some("jti-1"));

		claims.jti = None;
		assert_eq!(TokenUser::new(claims.clone(), "t").permission_cache_key().as_deref(), Some("hash-1"));

		claims.at_hash = None;
		assert_eq!(TokenUser::new(claims.clone(), "t").permission_cache_key().as_deref(), Some("sub.2000"));

		claims.exp = None;
		assert_eq!(TokenUser::new(claims, "t").permission_cache_key(), None);
	}

	#[test]
	fn test_cache_life() {
		let claims = TokenClaims { exp: Some(1600), iat: Some(1000), ..Default::default() };
		assert_eq!(TokenUser::new(claims, "t").permission_cache_life(), 600);

		let claims = TokenClaims { exp: Some(1000), iat: Some(1600), ..Default::default() };
		assert_eq!(TokenUser::new(claims, "t").permission_cache_life(), FALLBACK_CACHE_LIFE_SECS);

		let claims = TokenClaims { exp: Some(1600), ..Default::default() };
		assert_eq!(TokenUser::new(claims, "t").permission_cache_life(), FALLBACK_CACHE_LIFE_SECS);

		let claims = TokenClaims { exp: Some(i64::MAX), iat: Some(-1), ..Default::default() };
		assert_eq!(TokenUser::new(claims, "t").permission_cache_life(), FALLBACK_CACHE_LIFE_SECS);
	}

	#[test]
	fn test_permissions_from_features() {
		let user = TokenUser::new(claims_with_features(), "t");
		let perms = user.all_permissions();
		assert_eq!(perms.len(), 3);
		assert!(user.has_perm("shipments.view"));
		assert!(user.has_perm("wallets.sign"));
		assert!(!user.has_perm("wallets.view"));
		assert!(user.has_perms(&["shipments.view", "shipments.edit"]));
		assert!(!user.has_perms(&["shipments.view", "admin.all"]));
	}

	#[test]
	fn test_no_features_no_permissions() {
		let user = TokenUser::new(TokenClaims::default(), "t");
		assert!(user.all_permissions().is_empty());
		assert!(!user.has_perm("anything"));
		assert!(user.has_perms::<&str>(&[]));
	}

	#[test]
	fn test_permissions_are_cached_by_token_key() {
		let cache = Arc::new(PermissionCache::new(8));
		let mut claims = claims_with_features();
		claims.jti = Some("jti-cached".into());

		let user = TokenUser::new(claims.clone(), "t").with_cache(cache.clone());
		assert!(user.has_perm("shipments.view"));
		assert_eq!(cache.len(), 1);

		// Same key, different claims: cached list wins until the entry expires
		claims.features = None;
		let user = TokenUser::new(claims, "t").with_cache(cache.clone());
		assert!(user.has_perm("shipments.view"));
	}

	#[test]
	fn test_expired_cache_entry_is_dropped() {
		let cache = PermissionCache::new(4);
		cache.put("k", Arc::from(vec!["a.b".into()]), -1);
		assert!(cache.get("k").is_none());
		assert!(cache.is_empty());
	}
}

// vim: ts=4

//! Claims carried by access tokens issued by the profiles service.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;

/// Validated JWT payload.
///
/// `features` maps a feature name to the permissions granted on it, e.g.
/// `{"shipments": ["view", "edit"]}` grants `shipments.view` and
/// `shipments.edit`.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TokenClaims {
	pub user_id: Option<Box<str>>,
	pub organization_id: Option<Box<str>>,
	pub jti: Option<Box<str>>,
	pub at_hash: Option<Box<str>>,
	pub sub: Option<Box<str>>,
	pub exp: Option<i64>,
	pub iat: Option<i64>,
	pub features: Option<BTreeMap<Box<str>, Vec<Box<str>>>>,
	/// Claims not interpreted by this crate
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}


// vim: ts=4

//! Utility functions

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::LazyLock;

use axum::http::HeaderMap;

use crate::prelude::*;

static DN_REGEX: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"/?(.+?)=([^/]+)").ok());

/// Parse an OpenSSL-style distinguished name (`/C=US/CN=engine.prod-internal`)
pub fn parse_dn(ssl_dn: &str) -> HashMap<String, String> {
	let Some(re) = DN_REGEX.as_ref() else {
		return HashMap::new();
	};
	re.captures_iter(ssl_dn)
		.filter_map(|cap| Some((cap.get(1)?.as_str().to_string(), cap.get(2)?.as_str().to_string())))
		.collect()
}

/// Address the request originated from: first `X-Forwarded-For` hop, else the peer
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<String> {
	if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
		if let Some(addr) = forwarded.split(',').next().map(str::trim).filter(|a| !a.is_empty()) {
			return Some(addr.to_string());
		}
	}
	peer.map(|ip| ip.to_string())
}

/// True only for a canonical (lowercase, hyphenated) version 4 UUID
pub fn validate_uuid4(uuid_string: &str) -> bool {
	match uuid::Uuid::parse_str(uuid_string) {
		Ok(uuid) => {
			uuid.get_version_num() == 4
				&& uuid.get_variant() == uuid::Variant::RFC4122
				&& uuid.hyphenated().to_string() == uuid_string
		}
		Err(_) => false,
	}
}

/// Copy of `value` without the given object keys (case-insensitive), at any depth
pub fn remove_keys_recursively(value: &Value, keys: &[&str]) -> Value {
	let keys: Vec<String> = keys.iter().map(|k| k.to_lowercase()).collect();
	strip_keys(value, &keys)
}

fn strip_keys(value: &Value, keys: &[String]) -> Value {
	match value {
		Value::Object(obj) => Value::Object(
			obj.iter()
				.filter(|(key, _)| !keys.contains(&key.to_lowercase()))
				.map(|(key, val)| (key.clone(), strip_keys(val, keys)))
				.collect(),
		),
		other => other.clone(),
	}
}

/// `"shipment_state"` → `"Shipment State"`
pub fn snake_to_sentence(word: &str) -> String {
	word.split('_')
		.map(|part| {
			let mut chars = part.chars();
			match chars.next() {
				Some(c) => c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
				None => "_".to_string(),
			}
		})
		.collect::<Vec<_>>()
		.join(" ")
}

pub fn domain_from_email(email: &str) -> ApiResult<&str> {
	match email.split_once('@') {
		Some((_, domain)) => Ok(domain.split('@').next().unwrap_or(domain)),
		None => Err(Error::ValidationError("Domain can't be determined from username.".into())),
	}
}

fn parse_form_value(item: &str) -> Value {
	let lowered = item.to_lowercase();
	let candidate = if lowered == "true" || lowered == "false" { lowered.as_str() } else { item };
	serde_json::from_str(candidate).unwrap_or_else(|_| Value::String(item.to_string()))
}

/// Parse a urlencoded body. Repeated keys become lists and scalar values
/// are typed when they read as JSON (`"1"` → `1`, `"True"` → `true`).
pub fn parse_urlencoded(data: &str) -> Option<Map<String, Value>> {
	if data.is_empty() {
		return None;
	}

	let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
	for (key, val) in url::form_urlencoded::parse(data.as_bytes()) {
		// Blank values are dropped
		if val.is_empty() {
			continue;
		}
		match grouped.iter_mut().find(|(k, _)| *k == key) {
			Some((_, vals)) => vals.push(val.into_owned()),
			None => grouped.push((key.into_owned(), vec![val.into_owned()])),
		}
	}

	let mut body = Map::new();
	for (key, vals) in grouped {
		let value = if vals.len() > 1 {
			Value::Array(vals.iter().map(|v| parse_form_value(v)).collect())
		} else {
			vals.first().map_or(Value::Null, |v| parse_form_value(v))
		};
		body.insert(key, value);
	}
	Some(body)
}


// vim: ts=4

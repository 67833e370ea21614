//! Declarative action configuration
//!
//! Configuration tables can be written as JSON, naming serializers and
//! permission classes registered in a `Registry`:
//!
//! ```json
//! {
//!   "create": { "request_serializer": "ShipmentCreate", "response_serializer": "Shipment" },
//!   "list": { "response_serializer": { "default": "Shipment", "csv": "ShipmentCsv" } },
//!   "update": { "required_user_permissions": "shipments.edit" }
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;
use serde_with::{OneOrMany, serde_as};
use std::collections::{BTreeMap, HashMap, HashSet};

use axum::http::StatusCode;

use crate::action_config::{ActionConfig, ActionConfigBuilder};
use crate::permission::{
	AllowAny, EngineRequest, HasViewSetActionPermissions, IsAuthenticated, PermissionClass, class,
};
use crate::prelude::*;
use crate::serializer::SerializerRef;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawResponseSerializer {
	Name(String),
	Formats(BTreeMap<String, String>),
}

#[serde_as]
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawActionConfig {
	serializer: Option<String>,
	request_serializer: Option<String>,
	response_serializer: Option<RawResponseSerializer>,
	request_validation: Option<Value>,
	permission_classes: Option<Vec<String>>,
	#[serde_as(as = "Option<OneOrMany<_>>")]
	required_user_permissions: Option<Vec<String>>,
	success_status: Option<u16>,
}

/// Names resolvable from a declarative configuration
pub struct Registry {
	serializers: HashMap<Box<str>, SerializerRef>,
	permissions: HashMap<Box<str>, PermissionClass>,
	custom_actions: HashSet<Box<str>>,
}

impl Default for Registry {
	fn default() -> Self {
		Self::new()
	}
}

impl Registry {
	/// Registry knowing the built-in permission classes
	pub fn new() -> Self {
		let mut permissions: HashMap<Box<str>, PermissionClass> = HashMap::new();
		permissions.insert("AllowAny".into(), class::<AllowAny>);
		permissions.insert("IsAuthenticated".into(), class::<IsAuthenticated>);
		permissions.insert("HasViewSetActionPermissions".into(), class::<HasViewSetActionPermissions>);
		permissions.insert("EngineRequest".into(), class::<EngineRequest>);

		Self { serializers: HashMap::new(), permissions, custom_actions: HashSet::new() }
	}

	/// Register a serializer under its own name
	pub fn serializer(self, serializer: SerializerRef) -> Self {
		let name = serializer.name().to_string();
		self.serializer_as(name, serializer)
	}

	pub fn serializer_as(mut self, name: impl Into<Box<str>>, serializer: SerializerRef) -> Self {
		self.serializers.insert(name.into(), serializer);
		self
	}

	pub fn permission(mut self, name: impl Into<Box<str>>, class: PermissionClass) -> Self {
		self.permissions.insert(name.into(), class);
		self
	}

	/// Allow an extra (non-CRUDL) action name in configuration tables
	pub fn custom_action(mut self, name: impl Into<Box<str>>) -> Self {
		self.custom_actions.insert(name.into());
		self
	}

	fn lookup_serializer(&self, name: &str) -> ApiResult<SerializerRef> {
		self.serializers
			.get(name)
			.cloned()
			.ok_or_else(|| Error::config(format!("unknown serializer {}", name)))
	}

	fn lookup_permission(&self, name: &str) -> ApiResult<PermissionClass> {
		self.permissions
			.get(name)
			.copied()
			.ok_or_else(|| Error::config(format!("unknown permission class {}", name)))
	}

	fn action(&self, name: &str) -> ApiResult<Action> {
		match Action::from(name) {
			Action::Custom(custom) if !self.custom_actions.contains(&custom) => {
				Err(Error::config(format!("unknown action {}", custom)))
			}
			action => Ok(action),
		}
	}

	/// Build one action's record from its JSON description
	pub fn parse_action_config(&self, value: &Value) -> ApiResult<ActionConfig> {
		let raw = RawActionConfig::deserialize(value)
			.map_err(|err| Error::config(format!("invalid action configuration: {}", err)))?;

		let mut builder = ActionConfigBuilder::default();
		if let Some(name) = &raw.serializer {
			builder = builder.serializer(self.lookup_serializer(name)?);
		}
		if let Some(name) = &raw.request_serializer {
			builder = builder.request_serializer(self.lookup_serializer(name)?);
		}
		match &raw.response_serializer {
			Some(RawResponseSerializer::Name(name)) => {
				builder = builder.response_serializer(self.lookup_serializer(name)?);
			}
			Some(RawResponseSerializer::Formats(formats)) => {
				let map = formats
					.iter()
					.map(|(format, name)| Ok((format.as_str(), self.lookup_serializer(name)?)))
					.collect::<ApiResult<Vec<_>>>()?;
				builder = builder.response_serializer_map(map);
			}
			None => {}
		}
		match &raw.request_validation {
			Some(Value::Bool(raise)) => builder = builder.request_validation(*raise),
			Some(_) => return Err(Error::config("request_validation should be a boolean value")),
			None => {}
		}
		for name in raw.permission_classes.iter().flatten() {
			builder = builder.permission(self.lookup_permission(name)?);
		}
		if let Some(perms) = raw.required_user_permissions {
			builder = builder.required_user_permissions(perms);
		}
		if let Some(status) = raw.success_status {
			let status = StatusCode::from_u16(status)
				.map_err(|_| Error::config(format!("invalid success_status {}", status)))?;
			builder = builder.success_status(status);
		}

		builder.build()
	}

	/// Build a whole `action → record` table from a JSON object
	pub fn parse_configuration(&self, value: &Value) -> ApiResult<HashMap<Action, ActionConfig>> {
		let Some(obj) = value.as_object() else {
			return Err(Error::config("configuration should be an object keyed by action"));
		};
		obj.iter()
			.map(|(name, config)| {
				let action = self.action(name)?;
				let config = self
					.parse_action_config(config)
					.map_err(|err| Error::config(format!("{}: {}", action, err)))?;
				Ok((action, config))
			})
			.collect()
	}
}

impl std::fmt::Debug for Registry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Registry")
			.field("serializers", &self.serializers.keys().collect::<Vec<_>>())
			.field("permissions", &self.permissions.keys().collect::<Vec<_>>())
			.field("custom_actions", &self.custom_actions)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::action_config::Serializers;
	use crate::serializer::{FieldKind, FieldSerializer, same_serializer};
	use serde_json::json;

	fn registry() -> Registry {
		let ser = |name: &str| FieldSerializer::new(name).field("id", FieldKind::ReadOnly).into_ref();
		Registry::new()
			.serializer(ser("Shipment"))
			.serializer(ser("ShipmentCreate"))
			.serializer(ser("ShipmentCsv"))
			.custom_action("summary")
	}

	fn config_error<T: std::fmt::Debug>(result: ApiResult<T>) -> String {
		match result {
			Err(Error::ConfigError(msg)) => msg,
			other => panic!("expected configuration error, got {:?}", other),
		}
	}

	#[test]
	fn test_parse_configuration() {
		let registry = registry();
		let table = registry
			.parse_configuration(&json!({
				"create": {
					"request_serializer": "ShipmentCreate",
					"response_serializer": "Shipment",
					"success_status": 202,
				},
				"list": { "response_serializer": { "default": "Shipment", "csv": "ShipmentCsv" } },
				"update": {
					"permission_classes": ["IsAuthenticated", "HasViewSetActionPermissions"],
					"required_user_permissions": "shipments.edit",
				},
				"summary": { "serializer": "Shipment" },
			}))
			.unwrap();

		let create = &table[&Action::Create];
		assert!(matches!(create.serializers(), Serializers::Split { request: Some(_), response: Some(_) }));
		assert_eq!(create.success_status(), Some(StatusCode::ACCEPTED));

		let list = table[&Action::List].standardize_serializer_properties().unwrap();
		let csv = list.response.as_ref().unwrap().select(Some("csv"));
		assert!(same_serializer(csv, &registry.lookup_serializer("ShipmentCsv").unwrap()));

		let update = &table[&Action::Update];
		assert_eq!(update.permission_classes().map(<[_]>::len), Some(2));
		let expected: Vec<Box<str>> = vec!["shipments.edit".into()];
		assert_eq!(update.required_user_permissions(), Some(expected.as_slice()));

		assert!(matches!(table[&Action::from("summary")].serializers(), Serializers::Unified(_)));
	}

	#[test]
	fn test_request_validation_must_be_boolean() {
		let msg = config_error(registry().parse_action_config(&json!({ "request_validation": "yes" })));
		assert_eq!(msg, "request_validation should be a boolean value");

		let config = registry().parse_action_config(&json!({ "request_validation": false })).unwrap();
		assert!(!config.raise_validation());
	}

	#[test]
	fn test_required_user_permissions_list() {
		let config = registry()
			.parse_action_config(&json!({ "required_user_permissions": ["a.view", "b.view"] }))
			.unwrap();
		assert_eq!(config.required_user_permissions().map(<[_]>::len), Some(2));
	}

	#[test]
	fn test_unknown_names_are_rejected() {
		let registry = registry();
		assert!(config_error(registry.parse_action_config(&json!({ "serializer": "Nope" })))
			.contains("unknown serializer Nope"));
		assert!(config_error(registry.parse_action_config(&json!({ "permission_classes": ["IsOwner"] })))
			.contains("unknown permission class IsOwner"));
		assert!(config_error(registry.parse_action_config(&json!({ "serialiser": "Shipment" })))
			.contains("invalid action configuration"));
		assert!(config_error(registry.parse_configuration(&json!({ "archive": {} })))
			.contains("unknown action archive"));
	}

	#[test]
	fn test_builder_conflict_surfaces() {
		let msg = config_error(registry().parse_configuration(&json!({
			"create": { "serializer": "Shipment", "request_serializer": "ShipmentCreate" },
		})));
		assert!(msg.starts_with("create: serializer cannot be provided"));
	}
}

// vim: ts=4

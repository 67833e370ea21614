//! Action-keyed serializer and permission tables
//!
//! Lighter alternatives to a full `ActionConfig` table for viewsets that
//! only need to swap serializers or permission classes per action.

use std::collections::HashMap;

use crate::permission::{Permission, PermissionClass};
use crate::prelude::*;
use crate::serializer::SerializerRef;

// ActionSerializers //
//*******************//
/// Serializers keyed by action name, or by `"{action}.{format}"` for a
/// response format variant
#[derive(Debug, Clone, Default)]
pub struct ActionSerializers {
	default: Option<SerializerRef>,
	classes: HashMap<Box<str>, SerializerRef>,
}

impl ActionSerializers {
	pub fn new(default: Option<SerializerRef>) -> Self {
		Self { default, classes: HashMap::new() }
	}

	pub fn with(mut self, key: impl Into<Box<str>>, serializer: SerializerRef) -> Self {
		self.classes.insert(key.into(), serializer);
		self
	}

	pub fn serializer_for(&self, action: &Action, format: Option<&str>) -> ApiResult<SerializerRef> {
		let action = action.lookup_key(|a| self.classes.contains_key(a.as_str()));

		let with_format = format
			.map(|format| format!("{}.{}", action, format))
			.and_then(|key| self.classes.get(key.as_str()));
		if let Some(serializer) = with_format.or_else(|| self.classes.get(action.as_str())) {
			return Ok(serializer.clone());
		}

		self.default
			.clone()
			.ok_or_else(|| Error::config(format!("no serializer configured for action {}", action)))
	}
}

// ActionPermissions //
//*******************//
#[derive(Debug, Clone, Default)]
pub struct ActionPermissions {
	defaults: Vec<PermissionClass>,
	classes: HashMap<Action, Vec<PermissionClass>>,
}

impl ActionPermissions {
	pub fn new(defaults: &[PermissionClass]) -> Self {
		Self { defaults: defaults.to_vec(), classes: HashMap::new() }
	}

	/// Permission classes for `action`; an empty list allows every request
	pub fn with(mut self, action: impl Into<Action>, classes: &[PermissionClass]) -> Self {
		self.classes.insert(action.into(), classes.to_vec());
		self
	}

	pub fn permissions_for(&self, action: &Action) -> Vec<Box<dyn Permission>> {
		let action = action.lookup_key(|a| self.classes.contains_key(a));
		let classes = self.classes.get(action).unwrap_or(&self.defaults);
		classes.iter().map(|class| class()).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::permission::{AllowAny, HasViewSetActionPermissions, IsAuthenticated, class};
	use crate::serializer::{FieldKind, FieldSerializer, same_serializer};

	fn ser(name: &str) -> SerializerRef {
		FieldSerializer::new(name).field("id", FieldKind::ReadOnly).into_ref()
	}

	#[test]
	fn test_serializer_lookup() {
		let default = ser("Default");
		let list = ser("List");
		let list_csv = ser("ListCsv");
		let update = ser("Update");
		let table = ActionSerializers::new(Some(default.clone()))
			.with("list", list.clone())
			.with("list.csv", list_csv.clone())
			.with("update", update.clone());

		assert!(same_serializer(&table.serializer_for(&Action::List, None).unwrap(), &list));
		assert!(same_serializer(&table.serializer_for(&Action::List, Some("csv")).unwrap(), &list_csv));
		assert!(same_serializer(&table.serializer_for(&Action::List, Some("pdf")).unwrap(), &list));
		assert!(same_serializer(&table.serializer_for(&Action::PartialUpdate, None).unwrap(), &update));
		assert!(same_serializer(&table.serializer_for(&Action::Create, None).unwrap(), &default));
	}

	#[test]
	fn test_serializer_without_default() {
		let table = ActionSerializers::default().with("list", ser("List"));
		assert!(matches!(table.serializer_for(&Action::Retrieve, None), Err(Error::ConfigError(_))));
	}

	#[test]
	fn test_permission_lookup() {
		let table = ActionPermissions::new(&[class::<HasViewSetActionPermissions>])
			.with(Action::List, &[class::<AllowAny>])
			.with(Action::Update, &[class::<IsAuthenticated>, class::<HasViewSetActionPermissions>])
			.with("archive", &[]);

		let names = |action: Action| -> Vec<&'static str> {
			table.permissions_for(&action).iter().map(|p| p.name()).collect()
		};
		assert_eq!(names(Action::List), vec!["AllowAny"]);
		assert_eq!(names(Action::PartialUpdate), vec!["IsAuthenticated", "HasViewSetActionPermissions"]);
		assert_eq!(names(Action::Create), vec!["HasViewSetActionPermissions"]);
		assert!(names(Action::from("archive")).is_empty());
	}
}

// vim: ts=4

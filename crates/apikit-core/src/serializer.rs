//! Serializer abstraction used by viewsets
//!
//! A serializer validates inbound payloads and renders stored instances.
//! `SerializerRef` plays the role of a serializer "class": viewsets hold
//! references and pick one per action and direction.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::prelude::*;

pub trait Serializer: Send + Sync {
	/// Name used in logs and configuration errors
	fn name(&self) -> &str;

	/// Resource type used when rendering (defaults to the serializer name)
	fn resource_name(&self) -> &str {
		self.name()
	}

	/// Validate an inbound payload and return the cleaned data.
	///
	/// Rejections are reported as `Error::Invalid`.
	fn validate(&self, data: &Value, partial: bool) -> ApiResult<Value>;

	/// Writable fields of a payload that failed validation.
	///
	/// Used when a viewset does not raise validation errors; the result may
	/// be incomplete but never carries read-only or unknown fields.
	fn clean(&self, data: &Value) -> Value {
		self.validate(data, true).unwrap_or_else(|_| Value::Object(Map::new()))
	}

	/// Render a stored instance
	fn represent(&self, instance: &Value) -> Value;
}

pub type SerializerRef = Arc<dyn Serializer>;

impl std::fmt::Debug for dyn Serializer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Serializer({})", self.name())
	}
}

/// Returns true if both references point to the same serializer
pub fn same_serializer(a: &SerializerRef, b: &SerializerRef) -> bool {
	Arc::ptr_eq(a, b)
}

// FieldSerializer //
//*****************//
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
	Required,
	Optional,
	/// Rendered but never accepted from a payload
	ReadOnly,
}

#[derive(Debug, Clone)]
struct Field {
	name: Box<str>,
	kind: FieldKind,
}

/// Serializer described by a list of fields
///
/// ```
/// use apikit_core::serializer::{FieldKind, FieldSerializer, Serializer};
///
/// let ser = FieldSerializer::new("ShipmentSerializer")
///     .field("id", FieldKind::ReadOnly)
///     .field("name", FieldKind::Required);
/// assert_eq!(ser.name(), "ShipmentSerializer");
/// ```
#[derive(Debug, Clone)]
pub struct FieldSerializer {
	name: Box<str>,
	resource_name: Option<Box<str>>,
	fields: Vec<Field>,
}

impl FieldSerializer {
	pub fn new(name: impl Into<Box<str>>) -> Self {
		Self { name: name.into(), resource_name: None, fields: Vec::new() }
	}

	pub fn resource(mut self, resource_name: impl Into<Box<str>>) -> Self {
		self.resource_name = Some(resource_name.into());
		self
	}

	pub fn field(mut self, name: impl Into<Box<str>>, kind: FieldKind) -> Self {
		self.fields.push(Field { name: name.into(), kind });
		self
	}

	pub fn into_ref(self) -> SerializerRef {
		Arc::new(self)
	}
}

impl Serializer for FieldSerializer {
	fn name(&self) -> &str {
		&self.name
	}

	fn resource_name(&self) -> &str {
		self.resource_name.as_deref().unwrap_or(&self.name)
	}

	fn validate(&self, data: &Value, partial: bool) -> ApiResult<Value> {
		let Some(obj) = data.as_object() else {
			return Err(Error::invalid_field(
				"non_field_errors",
				"Invalid data. Expected a dictionary.",
			));
		};

		let mut errors = FieldErrors::new();
		let mut validated = Map::new();
		for field in &self.fields {
			match (field.kind, obj.get(field.name.as_ref())) {
				(FieldKind::ReadOnly, _) => {}
				(FieldKind::Required, None | Some(Value::Null)) if !partial => {
					errors
						.entry(field.name.clone())
						.or_default()
						.push("This field is required.".into());
				}
				(_, Some(value)) => {
					validated.insert(field.name.to_string(), value.clone());
				}
				(_, None) => {}
			}
		}

		if errors.is_empty() { Ok(Value::Object(validated)) } else { Err(Error::Invalid(errors)) }
	}

	fn clean(&self, data: &Value) -> Value {
		let mut cleaned = Map::new();
		if let Some(obj) = data.as_object() {
			for field in self.fields.iter().filter(|f| f.kind != FieldKind::ReadOnly) {
				if let Some(value) = obj.get(field.name.as_ref()) {
					cleaned.insert(field.name.to_string(), value.clone());
				}
			}
		}
		Value::Object(cleaned)
	}

	fn represent(&self, instance: &Value) -> Value {
		let mut out = Map::new();
		if let Some(obj) = instance.as_object() {
			for field in &self.fields {
				if let Some(value) = obj.get(field.name.as_ref()) {
					out.insert(field.name.to_string(), value.clone());
				}
			}
		}
		Value::Object(out)
	}
}


// vim: ts=4

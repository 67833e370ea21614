//! Per-action viewset configuration
//!
//! An `ActionConfig` describes how one action of a configurable viewset
//! selects serializers, permission classes, required user permissions and
//! its success status. Records are built once, then validated for their
//! action and normalized lazily on first use. Both steps are memoized; a
//! failing step is not, so a broken record keeps failing loudly.

use axum::http::StatusCode;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::permission::PermissionClass;
use crate::prelude::*;
use crate::serializer::SerializerRef;

/// Reserved format key holding the fallback response serializer
pub const DEFAULT_FORMAT: &str = "default";

// ResponseSerializers //
//*********************//
/// Response serializers selectable by format suffix
#[derive(Debug, Clone)]
pub struct ResponseSerializers {
	default: SerializerRef,
	formats: HashMap<Box<str>, SerializerRef>,
}

impl ResponseSerializers {
	pub fn new(default: SerializerRef) -> Self {
		Self { default, formats: HashMap::new() }
	}

	pub fn with_format(mut self, format: impl Into<Box<str>>, serializer: SerializerRef) -> Self {
		let format = format.into();
		if format.as_ref() == DEFAULT_FORMAT {
			self.default = serializer;
		} else {
			self.formats.insert(format, serializer);
		}
		self
	}

	/// Build from a `format → serializer` map, which must contain `"default"`
	pub fn from_map(
		map: impl IntoIterator<Item = (Box<str>, SerializerRef)>,
	) -> ApiResult<ResponseSerializers> {
		let mut formats: HashMap<Box<str>, SerializerRef> = map.into_iter().collect();
		let default = formats
			.remove(DEFAULT_FORMAT)
			.ok_or_else(|| Error::config("response_serializer needs a default provided"))?;
		Ok(Self { default, formats })
	}

	pub fn default_serializer(&self) -> &SerializerRef {
		&self.default
	}

	pub fn get(&self, format: &str) -> Option<&SerializerRef> {
		if format == DEFAULT_FORMAT { Some(&self.default) } else { self.formats.get(format) }
	}

	/// Serializer for the requested format, or the default one.
	///
	/// Unknown formats silently use the default.
	pub fn select(&self, format: Option<&str>) -> &SerializerRef {
		format.and_then(|f| self.get(f)).unwrap_or(&self.default)
	}

	pub fn formats(&self) -> impl Iterator<Item = &str> {
		self.formats.keys().map(AsRef::as_ref)
	}
}

/// Response serializer as supplied by the developer
#[derive(Debug, Clone)]
pub enum ResponseSpec {
	Single(SerializerRef),
	/// Format-keyed map, not checked until normalization
	Map(HashMap<Box<str>, SerializerRef>),
	Set(ResponseSerializers),
}

impl ResponseSpec {
	fn standardize(&self) -> ApiResult<ResponseSerializers> {
		match self {
			ResponseSpec::Single(serializer) => Ok(ResponseSerializers::new(serializer.clone())),
			ResponseSpec::Map(map) => ResponseSerializers::from_map(
				map.iter().map(|(format, serializer)| (format.clone(), serializer.clone())),
			),
			ResponseSpec::Set(set) => Ok(set.clone()),
		}
	}
}

/// Serializer selection of one action.
///
/// A single serializer for both directions excludes direction-specific ones.
#[derive(Debug, Clone, Default)]
pub enum Serializers {
	/// Nothing configured, the viewset default applies
	#[default]
	Inherit,
	Unified(SerializerRef),
	Split {
		request: Option<SerializerRef>,
		response: Option<ResponseSpec>,
	},
}

/// Canonical serializer selection produced by normalization
#[derive(Debug, Clone)]
pub struct NormalizedSerializers {
	pub request: Option<SerializerRef>,
	pub response: Option<ResponseSerializers>,
	/// The response may use a different serializer than the one that
	/// produced the instance, so it must be serialized again
	pub re_serialize_response: bool,
}

// ActionConfig //
//**************//
#[derive(Debug, Default)]
pub struct ActionConfig {
	serializers: Serializers,
	request_validation: Option<bool>,
	permission_classes: Option<Vec<PermissionClass>>,
	required_user_permissions: Option<Vec<Box<str>>>,
	success_status: Option<StatusCode>,

	validated: OnceLock<()>,
	normalized: OnceLock<NormalizedSerializers>,
}

impl ActionConfig {
	pub fn builder() -> ActionConfigBuilder {
		ActionConfigBuilder::default()
	}

	pub fn serializers(&self) -> &Serializers {
		&self.serializers
	}

	pub fn request_validation(&self) -> Option<bool> {
		self.request_validation
	}

	/// Whether request validation errors abort the action (default: yes)
	pub fn raise_validation(&self) -> bool {
		self.request_validation.unwrap_or(true)
	}

	pub fn permission_classes(&self) -> Option<&[PermissionClass]> {
		self.permission_classes.as_deref()
	}

	pub fn required_user_permissions(&self) -> Option<&[Box<str>]> {
		self.required_user_permissions.as_deref()
	}

	pub fn success_status(&self) -> Option<StatusCode> {
		self.success_status
	}

	fn has_request_serializer(&self) -> bool {
		matches!(self.serializers, Serializers::Split { request: Some(_), .. })
	}

	/// Check the record against the restrictions of `action`.
	///
	/// Read-only actions take no request-side settings and `destroy` takes
	/// no serializers at all. Passing once makes later calls no-ops.
	pub fn validate_action(&self, action: &Action) -> ApiResult<()> {
		if self.validated.get().is_some() {
			return Ok(());
		}

		if action.is_read_only() {
			let request_side = [
				("request_serializer", self.has_request_serializer()),
				("request_validation", self.request_validation.is_some()),
				("success_status", self.success_status.is_some()),
			];
			if let Some((field, _)) = request_side.iter().find(|(_, set)| *set) {
				return Err(Error::config(format!("{} not valid for action {}", field, action)));
			}
		}

		if *action == Action::Destroy && !matches!(self.serializers, Serializers::Inherit) {
			return Err(Error::config(format!("serializers are not valid for action {}", action)));
		}

		let _ = self.validated.set(());
		Ok(())
	}

	/// Canonical `{request, response}` serializers, computed once
	pub fn standardize_serializer_properties(&self) -> ApiResult<&NormalizedSerializers> {
		if let Some(normalized) = self.normalized.get() {
			return Ok(normalized);
		}

		let normalized = match &self.serializers {
			Serializers::Inherit => {
				NormalizedSerializers { request: None, response: None, re_serialize_response: false }
			}
			Serializers::Unified(serializer) => NormalizedSerializers {
				request: Some(serializer.clone()),
				response: Some(ResponseSerializers::new(serializer.clone())),
				re_serialize_response: false,
			},
			Serializers::Split { request, response } => NormalizedSerializers {
				request: request.clone(),
				response: response.as_ref().map(ResponseSpec::standardize).transpose()?,
				re_serialize_response: true,
			},
		};

		Ok(self.normalized.get_or_init(|| normalized))
	}

	pub fn is_validated(&self) -> bool {
		self.validated.get().is_some()
	}

	pub fn is_normalized(&self) -> bool {
		self.normalized.get().is_some()
	}
}

// ActionConfigBuilder //
//*********************//
#[derive(Debug, Default)]
pub struct ActionConfigBuilder {
	serializer: Option<SerializerRef>,
	request_serializer: Option<SerializerRef>,
	response_serializer: Option<ResponseSpec>,
	request_validation: Option<bool>,
	permission_classes: Option<Vec<PermissionClass>>,
	required_user_permissions: Option<Vec<Box<str>>>,
	success_status: Option<StatusCode>,
}

impl ActionConfigBuilder {
	/// Serializer used for both the request and the response
	pub fn serializer(mut self, serializer: SerializerRef) -> Self {
		self.serializer = Some(serializer);
		self
	}

	pub fn request_serializer(mut self, serializer: SerializerRef) -> Self {
		self.request_serializer = Some(serializer);
		self
	}

	pub fn response_serializer(mut self, serializer: SerializerRef) -> Self {
		self.response_serializer = Some(ResponseSpec::Single(serializer));
		self
	}

	pub fn response_serializers(mut self, serializers: ResponseSerializers) -> Self {
		self.response_serializer = Some(ResponseSpec::Set(serializers));
		self
	}

	/// Format-keyed response serializers; `"default"` is required
	pub fn response_serializer_map<K: Into<Box<str>>>(
		mut self,
		map: impl IntoIterator<Item = (K, SerializerRef)>,
	) -> Self {
		let map = map.into_iter().map(|(format, serializer)| (format.into(), serializer)).collect();
		self.response_serializer = Some(ResponseSpec::Map(map));
		self
	}

	pub fn response_spec(mut self, spec: ResponseSpec) -> Self {
		self.response_serializer = Some(spec);
		self
	}

	pub fn request_validation(mut self, raise: bool) -> Self {
		self.request_validation = Some(raise);
		self
	}

	/// Append a permission class overriding the viewset defaults
	pub fn permission(mut self, class: PermissionClass) -> Self {
		self.permission_classes.get_or_insert_with(Vec::new).push(class);
		self
	}

	pub fn required_user_permission(mut self, perm: impl Into<Box<str>>) -> Self {
		self.required_user_permissions.get_or_insert_with(Vec::new).push(perm.into());
		self
	}

	pub fn required_user_permissions<S: Into<Box<str>>>(
		mut self,
		perms: impl IntoIterator<Item = S>,
	) -> Self {
		self.required_user_permissions = Some(perms.into_iter().map(Into::into).collect());
		self
	}

	pub fn success_status(mut self, status: StatusCode) -> Self {
		self.success_status = Some(status);
		self
	}

	pub fn build(self) -> ApiResult<ActionConfig> {
		let serializers = match (self.serializer, self.request_serializer, self.response_serializer) {
			(Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
				return Err(Error::config(
					"serializer cannot be provided if either request_serializer or response_serializer are provided",
				));
			}
			(Some(serializer), None, None) => Serializers::Unified(serializer),
			(None, None, None) => Serializers::Inherit,
			(None, request, response) => Serializers::Split { request, response },
		};

		Ok(ActionConfig {
			serializers,
			request_validation: self.request_validation,
			permission_classes: self.permission_classes,
			required_user_permissions: self.required_user_permissions,
			success_status: self.success_status,
			validated: OnceLock::new(),
			normalized: OnceLock::new(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::serializer::{FieldKind, FieldSerializer, same_serializer};

	fn ser(name: &str) -> SerializerRef {
		FieldSerializer::new(name).field("id", FieldKind::ReadOnly).into_ref()
	}

	fn config_error(result: ApiResult<impl std::fmt::Debug>) -> String {
		match result {
			Err(Error::ConfigError(msg)) => msg,
			other => panic!("expected configuration error, got {:?}", other),
		}
	}

	#[test]
	fn test_serializer_conflicts_with_split() {
		let msg = config_error(
			ActionConfig::builder()
				.serializer(ser("Default"))
				.request_serializer(ser("Request"))
				.build(),
		);
		assert!(msg.contains("serializer cannot be provided"));

		let msg = config_error(
			ActionConfig::builder()
				.serializer(ser("Default"))
				.response_serializer(ser("Response"))
				.build(),
		);
		assert!(msg.contains("serializer cannot be provided"));
	}

	#[test]
	fn test_required_user_permission_single_is_list() {
		let config =
			ActionConfig::builder().required_user_permission("shipments.view").build().unwrap();
		let expected: Vec<Box<str>> = vec!["shipments.view".into()];
		assert_eq!(config.required_user_permissions(), Some(expected.as_slice()));
	}

	#[test]
	fn test_validation_read_only_actions() {
		for action in [Action::Retrieve, Action::List, Action::Destroy] {
			let config = ActionConfig::builder().request_serializer(ser("Request")).build().unwrap();
			let msg = config_error(config.validate_action(&action));
			assert_eq!(msg, format!("request_serializer not valid for action {}", action));

			let config = ActionConfig::builder().request_validation(true).build().unwrap();
			let msg = config_error(config.validate_action(&action));
			assert_eq!(msg, format!("request_validation not valid for action {}", action));

			let config = ActionConfig::builder().success_status(StatusCode::OK).build().unwrap();
			let msg = config_error(config.validate_action(&action));
			assert_eq!(msg, format!("success_status not valid for action {}", action));
		}
	}

	#[test]
	fn test_validation_destroy_rejects_serializers() {
		let config = ActionConfig::builder().serializer(ser("Default")).build().unwrap();
		let msg = config_error(config.validate_action(&Action::Destroy));
		assert_eq!(msg, "serializers are not valid for action destroy");

		let config = ActionConfig::builder().response_serializer(ser("Response")).build().unwrap();
		let msg = config_error(config.validate_action(&Action::Destroy));
		assert_eq!(msg, "serializers are not valid for action destroy");

		let config = ActionConfig::builder().required_user_permission("x.delete").build().unwrap();
		assert!(config.validate_action(&Action::Destroy).is_ok());
	}

	#[test]
	fn test_validation_list_allows_response_serializer() {
		let config = ActionConfig::builder().response_serializer(ser("List")).build().unwrap();
		assert!(config.validate_action(&Action::List).is_ok());
		let config = ActionConfig::builder().serializer(ser("List")).build().unwrap();
		assert!(config.validate_action(&Action::List).is_ok());
	}

	#[test]
	fn test_validate_action_is_idempotent() {
		let config = ActionConfig::builder().request_serializer(ser("Request")).build().unwrap();
		assert!(!config.is_validated());
		assert!(config.validate_action(&Action::Create).is_ok());
		assert!(config.is_validated());
		assert!(config.validate_action(&Action::Create).is_ok());
	}

	#[test]
	fn test_failed_validation_is_not_memoized() {
		let config = ActionConfig::builder().success_status(StatusCode::OK).build().unwrap();
		assert!(config.validate_action(&Action::List).is_err());
		assert!(!config.is_validated());
		assert!(config.validate_action(&Action::List).is_err());
	}

	#[test]
	fn test_standardize_unified_serializer() {
		let default = ser("Default");
		let config = ActionConfig::builder().serializer(default.clone()).build().unwrap();
		assert!(matches!(config.serializers(), Serializers::Unified(_)));

		for _ in 0..2 {
			let normalized = config.standardize_serializer_properties().unwrap();
			assert!(same_serializer(normalized.request.as_ref().unwrap(), &default));
			assert!(same_serializer(
				normalized.response.as_ref().unwrap().default_serializer(),
				&default
			));
			assert!(!normalized.re_serialize_response);
		}
	}

	#[test]
	fn test_standardize_request_only() {
		let request = ser("Request");
		let config = ActionConfig::builder().request_serializer(request.clone()).build().unwrap();

		for _ in 0..2 {
			let normalized = config.standardize_serializer_properties().unwrap();
			assert!(same_serializer(normalized.request.as_ref().unwrap(), &request));
			assert!(normalized.response.is_none());
			assert!(normalized.re_serialize_response);
		}
	}

	#[test]
	fn test_standardize_split_serializers() {
		let request = ser("Request");
		let response = ser("Response");
		let config = ActionConfig::builder()
			.request_serializer(request)
			.response_serializer(response.clone())
			.build()
			.unwrap();

		let normalized = config.standardize_serializer_properties().unwrap();
		assert!(normalized.re_serialize_response);
		assert!(same_serializer(normalized.response.as_ref().unwrap().default_serializer(), &response));
		assert!(config.is_normalized());
	}

	#[test]
	fn test_standardize_map_requires_default() {
		let config = ActionConfig::builder()
			.response_serializer_map([("csv", ser("Csv"))])
			.build()
			.unwrap();
		let msg = config_error(config.standardize_serializer_properties());
		assert_eq!(msg, "response_serializer needs a default provided");
		assert!(!config.is_normalized());
	}

	#[test]
	fn test_response_format_selection() {
		let default = ser("Default");
		let csv = ser("Csv");
		let config = ActionConfig::builder()
			.response_serializer_map([("default", default.clone()), ("csv", csv.clone())])
			.build()
			.unwrap();

		let normalized = config.standardize_serializer_properties().unwrap();
		let response = normalized.response.as_ref().unwrap();
		assert!(same_serializer(response.select(Some("csv")), &csv));
		assert!(same_serializer(response.select(Some("pdf")), &default));
		assert!(same_serializer(response.select(None), &default));
		assert_eq!(response.formats().collect::<Vec<_>>(), vec!["csv"]);
	}

	#[test]
	fn test_inherit_has_nothing_to_normalize() {
		let config = ActionConfig::default();
		let normalized = config.standardize_serializer_properties().unwrap();
		assert!(normalized.request.is_none());
		assert!(normalized.response.is_none());
		assert!(!normalized.re_serialize_response);
		assert!(config.raise_validation());
	}
}

// vim: ts=4

//! Configurable viewsets
//!
//! A `ViewSet` owns a table of `ActionConfig` records and resolves, for the
//! action of each request, the serializer to parse with, the serializer to
//! render with and the permission checks to run. Actions without a record
//! fall back to the viewset-level defaults.

use std::collections::HashMap;
use std::sync::{LazyLock, OnceLock};

use crate::action_config::ActionConfig;
use crate::permission::{Permission, PermissionClass};
use crate::prelude::*;
use crate::serializer::SerializerRef;

/// Record used for actions missing from the configuration table
static EMPTY_CONFIG: LazyLock<ActionConfig> = LazyLock::new(ActionConfig::default);

type UserPermissionMap = HashMap<Action, Vec<Box<str>>>;

pub struct ViewSet {
	name: Box<str>,
	serializer: Option<SerializerRef>,
	permission_classes: Vec<PermissionClass>,
	configuration: Option<HashMap<Action, ActionConfig>>,
	action_user_permissions: UserPermissionMap,
	default_required_user_permissions: Option<Vec<Box<str>>>,

	/// Merged action → user permissions map, set once the table is processed
	processed: OnceLock<UserPermissionMap>,
}

impl ViewSet {
	pub fn builder(name: impl Into<Box<str>>) -> ViewSetBuilder {
		ViewSetBuilder {
			name: name.into(),
			serializer: None,
			permission_classes: Vec::new(),
			configuration: None,
			action_user_permissions: HashMap::new(),
			default_required_user_permissions: None,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	fn configuration(&self) -> ApiResult<&HashMap<Action, ActionConfig>> {
		self.configuration.as_ref().ok_or_else(|| {
			Error::config(format!("{} should include a `configuration` attribute.", self.name))
		})
	}

	/// Validate and normalize every record of the table.
	///
	/// Runs once; calling it at startup surfaces configuration errors
	/// before the first request does.
	pub fn validate(&self) -> ApiResult<()> {
		self.processed().map(|_| ())
	}

	fn processed(&self) -> ApiResult<&UserPermissionMap> {
		if let Some(processed) = self.processed.get() {
			return Ok(processed);
		}

		let configuration = self.configuration()?;
		let mut user_permissions = self.action_user_permissions.clone();
		for (action, config) in configuration {
			config.validate_action(action)?;
			config.standardize_serializer_properties()?;

			if let Some(required) = config.required_user_permissions().filter(|r| !r.is_empty()) {
				user_permissions.insert(action.clone(), required.to_vec());
			}
		}

		debug!(viewset = %self.name, actions = configuration.len(), "viewset configuration processed");
		Ok(self.processed.get_or_init(|| user_permissions))
	}

	/// Record applying to `action`, or an empty record
	pub fn configuration_for(&self, action: &Action) -> ApiResult<&ActionConfig> {
		self.processed()?;
		let configuration = self.configuration()?;
		let key = action.lookup_key(|a| configuration.contains_key(a));
		Ok(configuration.get(key).unwrap_or(&EMPTY_CONFIG))
	}

	pub fn default_serializer(&self) -> ApiResult<&SerializerRef> {
		self.serializer.as_ref().ok_or_else(|| {
			Error::config(format!(
				"{} should either include a `serializer` attribute, or configure one for every action.",
				self.name
			))
		})
	}

	/// Serializer class for `action` in the given direction.
	///
	/// For responses a matching `format` variant wins over the default.
	pub fn resolve_serializer(
		&self,
		action: &Action,
		direction: SerializationDirection,
		format: Option<&str>,
	) -> ApiResult<SerializerRef> {
		let config = self.configuration_for(action)?;
		let normalized = config.standardize_serializer_properties()?;

		let configured = match direction {
			SerializationDirection::Request => normalized.request.as_ref(),
			SerializationDirection::Response => {
				normalized.response.as_ref().map(|response| response.select(format))
			}
		};

		match configured {
			Some(serializer) => Ok(serializer.clone()),
			None => self.default_serializer().cloned(),
		}
	}

	/// Fresh permission checks for `action`
	pub fn resolve_permissions(&self, action: &Action) -> ApiResult<Vec<Box<dyn Permission>>> {
		let config = self.configuration_for(action)?;
		let classes = match config.permission_classes() {
			Some(classes) if !classes.is_empty() => classes,
			_ => &self.permission_classes,
		};
		Ok(classes.iter().map(|class| class()).collect())
	}

	/// Resource type rendered for `action`
	pub fn resource_name(
		&self,
		action: &Action,
		direction: SerializationDirection,
		format: Option<&str>,
	) -> ApiResult<String> {
		Ok(self.resolve_serializer(action, direction, format)?.resource_name().to_string())
	}

	/// User permissions required for `action`, falling back to the viewset default
	pub fn required_user_permissions(&self, action: &Action) -> ApiResult<Option<&[Box<str>]>> {
		let user_permissions = self.processed()?;
		let key = action.lookup_key(|a| user_permissions.contains_key(a));
		Ok(user_permissions
			.get(key)
			.map(Vec::as_slice)
			.or(self.default_required_user_permissions.as_deref()))
	}
}

impl std::fmt::Debug for ViewSet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ViewSet")
			.field("name", &self.name)
			.field("serializer", &self.serializer)
			.field("actions", &self.configuration.as_ref().map(|c| c.keys().collect::<Vec<_>>()))
			.finish_non_exhaustive()
	}
}

// ViewSetBuilder //
//****************//
pub struct ViewSetBuilder {
	name: Box<str>,
	serializer: Option<SerializerRef>,
	permission_classes: Vec<PermissionClass>,
	configuration: Option<HashMap<Action, ActionConfig>>,
	action_user_permissions: UserPermissionMap,
	default_required_user_permissions: Option<Vec<Box<str>>>,
}

impl ViewSetBuilder {
	/// Default serializer for actions without one of their own
	pub fn serializer(mut self, serializer: SerializerRef) -> Self {
		self.serializer = Some(serializer);
		self
	}

	/// Append a default permission class
	pub fn permission(mut self, class: PermissionClass) -> Self {
		self.permission_classes.push(class);
		self
	}

	/// Attach an (initially empty) configuration table
	pub fn configurable(mut self) -> Self {
		self.configuration.get_or_insert_with(HashMap::new);
		self
	}

	pub fn action(mut self, action: impl Into<Action>, config: ActionConfig) -> Self {
		self.configuration.get_or_insert_with(HashMap::new).insert(action.into(), config);
		self
	}

	pub fn configuration(mut self, configuration: HashMap<Action, ActionConfig>) -> Self {
		self.configuration = Some(configuration);
		self
	}

	/// Statically required user permissions; configuration records override them
	pub fn action_user_permissions<S: Into<Box<str>>>(
		mut self,
		action: impl Into<Action>,
		perms: impl IntoIterator<Item = S>,
	) -> Self {
		self.action_user_permissions
			.insert(action.into(), perms.into_iter().map(Into::into).collect());
		self
	}

	pub fn default_required_user_permissions<S: Into<Box<str>>>(
		mut self,
		perms: impl IntoIterator<Item = S>,
	) -> Self {
		self.default_required_user_permissions = Some(perms.into_iter().map(Into::into).collect());
		self
	}

	pub fn build(self) -> ViewSet {
		ViewSet {
			name: self.name,
			serializer: self.serializer,
			permission_classes: self.permission_classes,
			configuration: self.configuration,
			action_user_permissions: self.action_user_permissions,
			default_required_user_permissions: self.default_required_user_permissions,
			processed: OnceLock::new(),
		}
	}
}


// vim: ts=4

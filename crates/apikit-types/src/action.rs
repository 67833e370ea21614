//! Logical viewset actions and serialization directions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

static UPDATE: Action = Action::Update;

/// Logical operation handled by a viewset for one inbound request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
	Create,
	Retrieve,
	Update,
	PartialUpdate,
	Destroy,
	List,
	/// Any extra action registered on a viewset (e.g. `"sign"`)
	Custom(Box<str>),
}

impl Action {
	pub fn as_str(&self) -> &str {
		match self {
			Action::Create => "create",
			Action::Retrieve => "retrieve",
			Action::Update => "update",
			Action::PartialUpdate => "partial_update",
			Action::Destroy => "destroy",
			Action::List => "list",
			Action::Custom(name) => name,
		}
	}

	/// Actions which never parse a request payload
	pub fn is_read_only(&self) -> bool {
		matches!(self, Action::Retrieve | Action::List | Action::Destroy)
	}

	/// Key to look this action up with in an action-keyed table.
	///
	/// PATCH shares the PUT entry unless the table has its own
	/// `partial_update` entry. `has_entry` reports whether the table
	/// contains the given action.
	pub fn lookup_key(&self, has_entry: impl Fn(&Action) -> bool) -> &Action {
		match self {
			Action::PartialUpdate if !has_entry(self) => &UPDATE,
			_ => self,
		}
	}
}

impl std::fmt::Display for Action {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Action {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"create" => Action::Create,
			"retrieve" => Action::Retrieve,
			"update" => Action::Update,
			"partial_update" => Action::PartialUpdate,
			"destroy" => Action::Destroy,
			"list" => Action::List,
			custom => Action::Custom(custom.into()),
		})
	}
}

impl From<&str> for Action {
	fn from(s: &str) -> Self {
		match s.parse() {
			Ok(action) => action,
			Err(never) => match never {},
		}
	}
}

impl Serialize for Action {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for Action {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let name = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
		Ok(Action::from(name.as_ref()))
	}
}

/// Which side of a request a serializer is chosen for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationDirection {
	/// Parsing the inbound payload
	#[default]
	Request,
	/// Producing the outbound payload
	Response,
}


// vim: ts=4

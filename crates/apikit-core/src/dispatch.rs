//! Configurable CRUD viewsets over a model store
//!
//! `ConfigurableModelViewSet` implements create, retrieve, update,
//! partial_update, destroy and list on top of a `ModelStore`, taking
//! serializers, permission checks and success statuses from its `ViewSet`.

use async_trait::async_trait;
use axum::{
	Json, Router,
	body::Bytes,
	extract::{Path, Query, State},
	http::{HeaderMap, StatusCode, Uri, header},
	middleware,
	response::{IntoResponse, Response},
	routing::get,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::action_config::ActionConfig;
use crate::app::AppState;
use crate::extract::OptionalAuth;
use crate::pagination::{self, PageRequest};
use crate::permission::{RequestCtx, check_permissions};
use crate::prelude::*;
use crate::serializer::SerializerRef;
use crate::token::TokenUser;
use crate::utils::parse_urlencoded;
use crate::viewset::ViewSet;

pub const FORMAT_QUERY_PARAM: &str = "format";

/// Persistence behind a model viewset. Instances are JSON objects.
#[async_trait]
pub trait ModelStore: Send + Sync {
	async fn create(&self, data: Value) -> ApiResult<Value>;

	/// `Error::NotFound` when no instance has this id
	async fn retrieve(&self, id: &str) -> ApiResult<Value>;

	async fn update(&self, id: &str, data: Value, partial: bool) -> ApiResult<Value>;

	async fn destroy(&self, id: &str) -> ApiResult<()>;

	/// One window of the listing and the total number of instances
	async fn list(&self, offset: u64, limit: u64) -> ApiResult<(Vec<Value>, u64)>;
}

pub struct ConfigurableModelViewSet {
	viewset: ViewSet,
	store: Arc<dyn ModelStore>,
}

impl ConfigurableModelViewSet {
	pub fn new(viewset: ViewSet, store: Arc<dyn ModelStore>) -> Self {
		Self { viewset, store }
	}

	pub fn viewset(&self) -> &ViewSet {
		&self.viewset
	}

	/// Run the permission checks configured for `action`
	pub fn check_permissions(
		&self,
		app: &AppState,
		action: &Action,
		user: Option<&TokenUser>,
		headers: &HeaderMap,
	) -> ApiResult<()> {
		let ctx = RequestCtx {
			action,
			user,
			headers,
			settings: &app.settings,
			required_user_permissions: self.viewset.required_user_permissions(action)?,
		};
		check_permissions(&self.viewset.resolve_permissions(action)?, &ctx)
	}

	fn validate(
		&self,
		action: &Action,
		config: &ActionConfig,
		serializer: &SerializerRef,
		data: &Value,
		partial: bool,
	) -> ApiResult<Value> {
		match serializer.validate(data, partial) {
			Ok(validated) => Ok(validated),
			Err(Error::Invalid(errors)) if !config.raise_validation() => {
				warn!(
					viewset = self.viewset.name(),
					action = %action,
					serializer = serializer.name(),
					errors = ?errors,
					"request validation failed, keeping writable fields"
				);
				Ok(serializer.clean(data))
			}
			Err(err) => Err(err),
		}
	}

	/// Render a saved instance, with the response serializer when the
	/// action configures one
	fn render(
		&self,
		action: &Action,
		config: &ActionConfig,
		request_serializer: &SerializerRef,
		instance: &Value,
		format: Option<&str>,
	) -> ApiResult<Value> {
		if config.standardize_serializer_properties()?.re_serialize_response {
			let serializer =
				self.viewset.resolve_serializer(action, SerializationDirection::Response, format)?;
			Ok(serializer.represent(instance))
		} else {
			Ok(request_serializer.represent(instance))
		}
	}

	pub async fn create(&self, data: Value, format: Option<&str>) -> ApiResult<(StatusCode, Value)> {
		let action = Action::Create;
		let config = self.viewset.configuration_for(&action)?;
		let serializer = self.viewset.resolve_serializer(&action, SerializationDirection::Request, None)?;

		let data = self.validate(&action, config, &serializer, &data, false)?;
		let instance = self.store.create(data).await?;
		let body = self.render(&action, config, &serializer, &instance, format)?;

		Ok((config.success_status().unwrap_or(StatusCode::CREATED), body))
	}

	pub async fn retrieve(&self, id: &str, format: Option<&str>) -> ApiResult<Value> {
		let action = Action::Retrieve;
		let serializer =
			self.viewset.resolve_serializer(&action, SerializationDirection::Response, format)?;
		let instance = self.store.retrieve(id).await?;
		Ok(serializer.represent(&instance))
	}

	pub async fn update(
		&self,
		id: &str,
		data: Value,
		partial: bool,
		format: Option<&str>,
	) -> ApiResult<(StatusCode, Value)> {
		let action = if partial { Action::PartialUpdate } else { Action::Update };
		let config = self.viewset.configuration_for(&action)?;
		let serializer = self.viewset.resolve_serializer(&action, SerializationDirection::Request, None)?;

		// 404 before validation errors
		self.store.retrieve(id).await?;
		let data = self.validate(&action, config, &serializer, &data, partial)?;
		let instance = self.store.update(id, data, partial).await?;
		let body = self.render(&action, config, &serializer, &instance, format)?;

		Ok((config.success_status().unwrap_or(StatusCode::OK), body))
	}

	pub async fn destroy(&self, id: &str) -> ApiResult<StatusCode> {
		self.store.destroy(id).await?;
		Ok(StatusCode::NO_CONTENT)
	}

	pub async fn list(&self, page: PageRequest, url: &Url, format: Option<&str>) -> ApiResult<Value> {
		let action = Action::List;
		let serializer =
			self.viewset.resolve_serializer(&action, SerializationDirection::Response, format)?;

		let (instances, count) = self.store.list(page.offset(), page.page_size).await?;
		let data = instances.iter().map(|instance| serializer.represent(instance)).collect();
		pagination::paginated_response(url, page, count, data)
	}
}

impl std::fmt::Debug for ConfigurableModelViewSet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConfigurableModelViewSet").field("viewset", &self.viewset).finish_non_exhaustive()
	}
}

// Routes //
//********//
#[derive(Clone)]
struct ViewSetState {
	app: App,
	viewset: Arc<ConfigurableModelViewSet>,
}

fn format_param(query: &HashMap<String, String>) -> Option<&str> {
	query.get(FORMAT_QUERY_PARAM).map(String::as_str).filter(|f| !f.is_empty())
}

/// Request payload as JSON; urlencoded forms are converted
fn parse_body(headers: &HeaderMap, body: &Bytes) -> ApiResult<Value> {
	let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
	if content_type.starts_with("application/x-www-form-urlencoded") {
		let form = std::str::from_utf8(body).map_err(|_| Error::Parse)?;
		return Ok(Value::Object(parse_urlencoded(form).unwrap_or_default()));
	}
	if body.is_empty() {
		return Ok(Value::Object(serde_json::Map::new()));
	}
	Ok(serde_json::from_slice(body)?)
}

async fn list_instances(
	State(state): State<ViewSetState>,
	OptionalAuth(user): OptionalAuth,
	Query(query): Query<HashMap<String, String>>,
	headers: HeaderMap,
	uri: Uri,
) -> ApiResult<Json<Value>> {
	state.viewset.check_permissions(&state.app, &Action::List, user.as_ref(), &headers)?;
	let page = PageRequest::from_query(&query, &state.app.settings)?;
	let url = pagination::request_url(&headers, &uri)?;
	Ok(Json(state.viewset.list(page, &url, format_param(&query)).await?))
}

async fn create_instance(
	State(state): State<ViewSetState>,
	OptionalAuth(user): OptionalAuth,
	Query(query): Query<HashMap<String, String>>,
	headers: HeaderMap,
	body: Bytes,
) -> ApiResult<Response> {
	state.viewset.check_permissions(&state.app, &Action::Create, user.as_ref(), &headers)?;
	let data = parse_body(&headers, &body)?;
	let (status, body) = state.viewset.create(data, format_param(&query)).await?;
	Ok((status, Json(body)).into_response())
}

async fn retrieve_instance(
	State(state): State<ViewSetState>,
	OptionalAuth(user): OptionalAuth,
	Path(id): Path<String>,
	Query(query): Query<HashMap<String, String>>,
	headers: HeaderMap,
) -> ApiResult<Json<Value>> {
	state.viewset.check_permissions(&state.app, &Action::Retrieve, user.as_ref(), &headers)?;
	Ok(Json(state.viewset.retrieve(&id, format_param(&query)).await?))
}

async fn update_instance(
	state: ViewSetState,
	user: Option<TokenUser>,
	id: String,
	query: HashMap<String, String>,
	headers: HeaderMap,
	body: Bytes,
	partial: bool,
) -> ApiResult<Response> {
	let action = if partial { Action::PartialUpdate } else { Action::Update };
	state.viewset.check_permissions(&state.app, &action, user.as_ref(), &headers)?;
	let data = parse_body(&headers, &body)?;
	let (status, body) = state.viewset.update(&id, data, partial, format_param(&query)).await?;
	Ok((status, Json(body)).into_response())
}

async fn put_instance(
	State(state): State<ViewSetState>,
	OptionalAuth(user): OptionalAuth,
	Path(id): Path<String>,
	Query(query): Query<HashMap<String, String>>,
	headers: HeaderMap,
	body: Bytes,
) -> ApiResult<Response> {
	update_instance(state, user, id, query, headers, body, false).await
}

async fn patch_instance(
	State(state): State<ViewSetState>,
	OptionalAuth(user): OptionalAuth,
	Path(id): Path<String>,
	Query(query): Query<HashMap<String, String>>,
	headers: HeaderMap,
	body: Bytes,
) -> ApiResult<Response> {
	update_instance(state, user, id, query, headers, body, true).await
}

async fn destroy_instance(
	State(state): State<ViewSetState>,
	OptionalAuth(user): OptionalAuth,
	Path(id): Path<String>,
	headers: HeaderMap,
) -> ApiResult<StatusCode> {
	state.viewset.check_permissions(&state.app, &Action::Destroy, user.as_ref(), &headers)?;
	state.viewset.destroy(&id).await
}

/// Routes for `prefix` (e.g. `"shipments"`), with or without a trailing slash.
///
/// The viewset configuration is validated here so errors surface at startup.
pub fn router(app: App, prefix: &str, viewset: ConfigurableModelViewSet) -> ApiResult<Router> {
	viewset.viewset().validate()?;
	info!(viewset = viewset.viewset().name(), prefix, "mounting viewset");

	let prefix = prefix.trim_matches('/');
	let collection = format!("/{}", prefix);
	let detail = format!("/{}/{{id}}", prefix);
	let state = ViewSetState { app: app.clone(), viewset: Arc::new(viewset) };

	let collection_routes = get(list_instances).post(create_instance);
	let detail_routes =
		get(retrieve_instance).put(put_instance).patch(patch_instance).delete(destroy_instance);

	Ok(Router::new()
		.route(&collection, collection_routes.clone())
		.route(&format!("{}/", collection), collection_routes)
		.route(&detail, detail_routes.clone())
		.route(&format!("{}/", detail), detail_routes)
		.route_layer(middleware::from_fn_with_state(app, crate::middleware::optional_auth))
		.with_state(state))
}


// vim: ts=4

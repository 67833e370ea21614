//! Common test utilities and helpers
//!
//! Fixtures shared by the integration tests: signed tokens, an in-memory
//! model store and a shipments viewset.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
	Router,
	body::Body,
	http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

use apikit::prelude::*;
use apikit::serializer::{FieldKind, FieldSerializer};
use apikit::settings::JwtKey;

pub const SECRET: &str = "integration-test-secret";
pub const HOST: &str = "api.test";

pub fn settings() -> Settings {
	Settings::builder()
		.jwt(Algorithm::HS256, JwtKey::Secret(SECRET.as_bytes().into()))
		.page_size(2)
		.max_page_size(10)
		.build()
		.unwrap()
}

fn now() -> i64 {
	i64::try_from(SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()).unwrap()
}

/// Token for `user_id` granting `features` (e.g. `{"shipments": ["view"]}`)
pub fn token(user_id: &str, features: Value) -> String {
	let claims = json!({
		"user_id": user_id,
		"organization_id": "org-1",
		"jti": format!("jti-{}", user_id),
		"iat": now(),
		"exp": now() + 3600,
		"features": features,
	});
	jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET.as_bytes()))
		.unwrap()
}

// MemoryStore //
//*************//
#[derive(Default)]
pub struct MemoryStore {
	items: Mutex<Vec<Value>>,
}

impl MemoryStore {
	pub fn with_items(names: &[&str]) -> Arc<MemoryStore> {
		let items = names
			.iter()
			.enumerate()
			.map(|(n, name)| {
				json!({ "id": (n + 1).to_string(), "name": name, "carrier": "acme", "status": "open" })
			})
			.collect();
		Arc::new(MemoryStore { items: Mutex::new(items) })
	}

	pub fn get(&self, id: &str) -> Option<Value> {
		self.items.lock().iter().find(|i| i["id"] == id).cloned()
	}
}

#[async_trait]
impl ModelStore for MemoryStore {
	async fn create(&self, mut data: Value) -> ApiResult<Value> {
		let mut items = self.items.lock();
		data["id"] = json!((items.len() + 1).to_string());
		data["status"] = json!("open");
		items.push(data.clone());
		Ok(data)
	}

	async fn retrieve(&self, id: &str) -> ApiResult<Value> {
		self.get(id).ok_or(Error::NotFound)
	}

	async fn update(&self, id: &str, data: Value, partial: bool) -> ApiResult<Value> {
		let mut items = self.items.lock();
		let item = items.iter_mut().find(|i| i["id"] == id).ok_or(Error::NotFound)?;
		let Some(data) = data.as_object() else {
			return Err(Error::Parse);
		};
		if !partial {
			*item = json!({ "id": id, "status": item["status"].clone() });
		}
		if let Some(item) = item.as_object_mut() {
			item.extend(data.clone());
		}
		Ok(item.clone())
	}

	async fn destroy(&self, id: &str) -> ApiResult<()> {
		let mut items = self.items.lock();
		let before = items.len();
		items.retain(|i| i["id"] != id);
		if items.len() == before { Err(Error::NotFound) } else { Ok(()) }
	}

	async fn list(&self, offset: u64, limit: u64) -> ApiResult<(Vec<Value>, u64)> {
		let items = self.items.lock();
		let window = items
			.iter()
			.skip(usize::try_from(offset).unwrap())
			.take(usize::try_from(limit).unwrap())
			.cloned()
			.collect();
		Ok((window, u64::try_from(items.len()).unwrap()))
	}
}

// Shipments viewset //
//*******************//
pub fn shipment_serializer() -> SerializerRef {
	FieldSerializer::new("ShipmentSerializer")
		.resource("Shipment")
		.field("id", FieldKind::ReadOnly)
		.field("name", FieldKind::Required)
		.field("carrier", FieldKind::Optional)
		.field("status", FieldKind::ReadOnly)
		.into_ref()
}

pub fn shipment_create_serializer() -> SerializerRef {
	FieldSerializer::new("ShipmentCreateSerializer")
		.field("name", FieldKind::Required)
		.field("carrier", FieldKind::Required)
		.into_ref()
}

pub fn shipment_csv_serializer() -> SerializerRef {
	FieldSerializer::new("ShipmentCsvSerializer")
		.field("id", FieldKind::ReadOnly)
		.field("name", FieldKind::ReadOnly)
		.into_ref()
}

/// Shipments viewset
///
/// - list: anyone, with a `csv` response variant
/// - create: split serializers, response re-serialized
/// - retrieve: requires `shipments.view`
/// - update (and PATCH through it): requires `shipments.edit`, answers 202
/// - destroy: any authenticated user
pub fn shipment_viewset(store: Arc<MemoryStore>) -> ConfigurableModelViewSet {
	let viewset = ViewSet::builder("ShipmentViewSet")
		.serializer(shipment_serializer())
		.permission(class::<IsAuthenticated>)
		.permission(class::<HasViewSetActionPermissions>)
		.action(
			Action::List,
			ActionConfig::builder()
				.permission(class::<AllowAny>)
				.response_serializer_map([
					("default", shipment_serializer()),
					("csv", shipment_csv_serializer()),
				])
				.build()
				.unwrap(),
		)
		.action(
			Action::Create,
			ActionConfig::builder()
				.request_serializer(shipment_create_serializer())
				.response_serializer(shipment_serializer())
				.build()
				.unwrap(),
		)
		.action(
			Action::Retrieve,
			ActionConfig::builder().required_user_permission("shipments.view").build().unwrap(),
		)
		.action(
			Action::Update,
			ActionConfig::builder()
				.required_user_permission("shipments.edit")
				.success_status(StatusCode::ACCEPTED)
				.build()
				.unwrap(),
		)
		.build();
	ConfigurableModelViewSet::new(viewset, store)
}

pub fn router(store: Arc<MemoryStore>) -> Router {
	let mut builder = AppBuilder::new();
	builder.settings(settings()).viewset("shipments", shipment_viewset(store));
	let (_app, router) = builder.build().unwrap();
	router
}

// Requests //
//**********//
pub struct TestResponse {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Value,
}

pub async fn send(
	router: &Router,
	method: Method,
	uri: &str,
	token: Option<&str>,
	body: Option<Value>,
) -> TestResponse {
	let mut req = Request::builder().method(method).uri(uri).header(header::HOST, HOST);
	if let Some(token) = token {
		req = req.header(header::AUTHORIZATION, format!("JWT {}", token));
	}
	let req = match body {
		Some(body) => req
			.header(header::CONTENT_TYPE, "application/json")
			.body(Body::from(serde_json::to_vec(&body).unwrap()))
			.unwrap(),
		None => req.body(Body::empty()).unwrap(),
	};

	let response = router.clone().oneshot(req).await.unwrap();
	let status = response.status();
	let headers = response.headers().clone();
	let bytes = response.into_body().collect().await.unwrap().to_bytes();
	let body = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes)
			.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
	};

	TestResponse { status, headers, body }
}

// vim: ts=4

//! Clients for AWS API gateway services (IoT device registry, URL shortener)
//!
//! Requests and responses are JSON. POST calls must answer `201 Created`,
//! every other method `200 OK`. Request signing (SigV4 for `execute-api`)
//! is left to a `RequestSigner`.

use axum::http::{Method, StatusCode, Uri, header, request::Parts};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use url::Url;

use crate::prelude::*;
use crate::rpc::{HttpClient, http_client};
use crate::settings::Settings;

static DEVICE_ID_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r"(?i)[0-9A-F]{8}-[0-9A-F]{4}-4[0-9A-F]{3}-[89AB][0-9A-F]{3}-[0-9A-F]{12}").ok()
});

/// Adds authentication to an outgoing request
///
/// `body` is the exact payload that will be sent, for signatures that
/// cover it.
pub trait RequestSigner: Send + Sync {
	fn sign(&self, parts: &mut Parts, body: &[u8]) -> ApiResult<()>;
}

/// Sends requests as they are, for gateways without IAM authorization
#[derive(Debug, Default)]
pub struct Unsigned;

impl RequestSigner for Unsigned {
	fn sign(&self, _parts: &mut Parts, _body: &[u8]) -> ApiResult<()> {
		Ok(())
	}
}

pub struct AwsClient {
	name: &'static str,
	prefix: Option<&'static str>,
	base_url: Box<str>,
	timeout: Duration,
	signer: Arc<dyn RequestSigner>,
	client: HttpClient,
}

impl AwsClient {
	/// Client for the gateway at `base_url`. `name` tags its log lines.
	pub fn new(
		name: &'static str,
		base_url: &str,
		signer: Arc<dyn RequestSigner>,
		timeout: Duration,
	) -> ApiResult<Self> {
		Url::parse(base_url).map_err(|err| Error::config(format!("{}: {}", name, err)))?;
		Ok(Self {
			name,
			prefix: None,
			base_url: base_url.trim_end_matches('/').into(),
			timeout,
			signer,
			client: http_client(),
		})
	}

	/// IoT device gateway at `https://{host}/{stage}`
	pub fn iot(host: &str, stage: &str, signer: Arc<dyn RequestSigner>, timeout: Duration) -> ApiResult<Self> {
		Self::new("aws_iot_client", &format!("https://{}/{}", host, stage), signer, timeout)
	}

	pub fn url_shortener(url: &str, signer: Arc<dyn RequestSigner>, timeout: Duration) -> ApiResult<Self> {
		Ok(Self::new("aws_client", url, signer, timeout)?.endpoint_prefix("urlshortener"))
	}

	/// IoT client for `IOT_AWS_HOST`, if one is configured
	pub fn iot_from_settings(settings: &Settings, signer: Arc<dyn RequestSigner>) -> ApiResult<Option<Self>> {
		settings
			.iot_aws_host
			.as_deref()
			.map(|host| Self::iot(host, &settings.iot_gateway_stage, signer, settings.requests_timeout))
			.transpose()
	}

	/// URL shortener client for `URL_SHORTENER_URL`, if one is configured
	pub fn url_shortener_from_settings(
		settings: &Settings,
		signer: Arc<dyn RequestSigner>,
	) -> ApiResult<Option<Self>> {
		settings
			.url_shortener_url
			.as_deref()
			.map(|url| Self::url_shortener(url, signer, settings.requests_timeout))
			.transpose()
	}

	/// Prefix for the endpoint names written to the log
	#[must_use]
	pub fn endpoint_prefix(mut self, prefix: &'static str) -> Self {
		self.prefix = Some(prefix);
		self
	}

	pub async fn post(&self, endpoint: &str, payload: Option<&Value>, query: &[(&str, &str)]) -> ApiResult<Value> {
		self.call(Method::POST, endpoint, payload, query).await
	}

	pub async fn put(&self, endpoint: &str, payload: Option<&Value>, query: &[(&str, &str)]) -> ApiResult<Value> {
		self.call(Method::PUT, endpoint, payload, query).await
	}

	pub async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> ApiResult<Value> {
		self.call(Method::GET, endpoint, None, query).await
	}

	pub async fn delete(&self, endpoint: &str, query: &[(&str, &str)]) -> ApiResult<Value> {
		self.call(Method::DELETE, endpoint, None, query).await
	}

	/// Endpoint name with device ids replaced, e.g. `get::devices/<device_id>`
	pub fn endpoint_name(&self, method: &Method, endpoint: &str) -> String {
		let endpoint = redact_device_ids(endpoint);
		let method = method.as_str().to_ascii_lowercase();
		match self.prefix {
			Some(prefix) => format!("{}::{}::{}", prefix, method, endpoint),
			None => format!("{}::{}", method, endpoint),
		}
	}

	async fn call(
		&self,
		method: Method,
		endpoint: &str,
		payload: Option<&Value>,
		query: &[(&str, &str)],
	) -> ApiResult<Value> {
		let name = self.endpoint_name(&method, endpoint);
		let expected = if method == Method::POST { StatusCode::CREATED } else { StatusCode::OK };
		let request = self.request(method, endpoint, payload, query)?;

		let started = Instant::now();
		let response = match tokio::time::timeout(self.timeout, self.client.request(request)).await {
			Ok(Ok(response)) => response,
			Ok(Err(err)) if err.is_connect() => {
				warn!(client = self.name, endpoint = %name, "connection failed: {}", err);
				return Err(service_unavailable());
			}
			Ok(Err(err)) => {
				warn!(client = self.name, endpoint = %name, "request failed: {}", err);
				return Err(Error::aws(err.to_string()));
			}
			Err(_) => {
				warn!(client = self.name, endpoint = %name, timeout = ?self.timeout, "request timed out");
				return Err(Error::aws(format!("{} timed out", name)));
			}
		};

		let status = response.status();
		let body = response
			.into_body()
			.collect()
			.await
			.map_err(|err| Error::aws(err.to_string()))?
			.to_bytes();
		let response: Value = serde_json::from_slice(&body).map_err(|err| {
			warn!(client = self.name, endpoint = %name, status = status.as_u16(), "non-JSON response: {}", err);
			Error::aws(err.to_string())
		})?;
		if status != expected {
			return Err(error_from_response(self.name, &name, status, &response));
		}

		info!(client = self.name, endpoint = %name, elapsed = ?started.elapsed(), "aws call duration");
		Ok(response)
	}

	fn request(
		&self,
		method: Method,
		endpoint: &str,
		payload: Option<&Value>,
		query: &[(&str, &str)],
	) -> ApiResult<hyper::Request<Full<Bytes>>> {
		let mut url = Url::parse(&format!("{}/{}", self.base_url, endpoint.trim_start_matches('/')))
			.map_err(|err| Error::aws(err.to_string()))?;
		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query);
		}
		let uri: Uri = url.as_str().parse().map_err(|err: axum::http::uri::InvalidUri| Error::aws(err.to_string()))?;
		let body = match payload {
			Some(payload) => serde_json::to_vec(payload)?,
			None => Vec::new(),
		};

		let (mut parts, ()) = hyper::Request::builder()
			.method(method)
			.uri(uri)
			.header(header::CONTENT_TYPE, "application/json")
			.body(())
			.map_err(|err| Error::aws(err.to_string()))?
			.into_parts();
		self.signer.sign(&mut parts, &body)?;

		Ok(hyper::Request::from_parts(parts, Full::new(Bytes::from(body))))
	}
}

impl std::fmt::Debug for AwsClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AwsClient")
			.field("name", &self.name)
			.field("base_url", &self.base_url)
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

fn redact_device_ids(endpoint: &str) -> Cow<'_, str> {
	match DEVICE_ID_REGEX.as_ref() {
		Some(re) => re.replace_all(endpoint, "<device_id>"),
		None => Cow::Borrowed(endpoint),
	}
}

fn service_unavailable() -> Error {
	Error::Aws {
		message: "Service temporarily unavailable, try again later".into(),
		status: StatusCode::SERVICE_UNAVAILABLE,
		code: "service_unavailable",
	}
}

fn display(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

/// Error for a response with an unexpected status
///
/// The code is taken from `error.code` and falls back to the HTTP status.
/// The message is `error.message`, `error`, `message` or the whole body,
/// whichever is found first.
pub fn error_from_response(client: &str, endpoint: &str, status: StatusCode, response: &Value) -> Error {
	let mut code = status.as_u16().to_string();
	let message = match response.get("error") {
		Some(err) => {
			if let Some(err_code) = err.get("code") {
				code = display(err_code);
			}
			display(err.get("message").unwrap_or(err))
		}
		None => display(response.get("message").unwrap_or(response)),
	};

	error!(client, endpoint, code = %code, "aws_client error: {}", message);
	Error::aws(format!("Error in AWS IoT Request: [{}] {}", code, message))
}


// vim: ts=4

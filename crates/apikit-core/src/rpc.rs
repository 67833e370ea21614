//! JSON-RPC client for the engine service

use axum::http::{Method, StatusCode, Uri, header};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use serde_json::{Value, json};
use std::time::{Duration, Instant};

use crate::prelude::*;
use crate::settings::Settings;

const INVALID_RESPONSE: &str = "Invalid response from Engine";

pub(crate) type HttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

pub(crate) fn http_client() -> HttpClient {
	let connector = HttpsConnectorBuilder::new()
		.with_webpki_roots()
		.https_or_http()
		.enable_http1()
		.build();
	Client::builder(TokioExecutor::new()).build(connector)
}

pub struct RpcClient {
	url: Uri,
	timeout: Duration,
	client: HttpClient,
}

impl RpcClient {
	pub fn new(url: &str, timeout: Duration) -> ApiResult<Self> {
		let url: Uri =
			url.parse().map_err(|err| Error::config(format!("ENGINE_RPC_URL: {}", err)))?;
		Ok(Self { url, timeout, client: http_client() })
	}

	/// Client for `ENGINE_RPC_URL`, if one is configured
	pub fn from_settings(settings: &Settings) -> ApiResult<Option<Self>> {
		settings
			.engine_rpc_url
			.as_deref()
			.map(|url| Self::new(url, settings.requests_timeout))
			.transpose()
	}

	/// Call `method` and return its `result` member
	pub async fn call(&self, method: &str, params: Value) -> ApiResult<Value> {
		debug!(method, "calling engine RPC");
		let body = serde_json::to_vec(&payload(method, params))?;
		let request = hyper::Request::builder()
			.method(Method::POST)
			.uri(self.url.clone())
			.header(header::CONTENT_TYPE, "application/json")
			.body(Full::new(Bytes::from(body)))
			.map_err(|err| Error::rpc(err.to_string()))?;

		let started = Instant::now();
		let response = match tokio::time::timeout(self.timeout, self.client.request(request)).await {
			Ok(Ok(response)) => response,
			Ok(Err(err)) if err.is_connect() => {
				// connection errors may carry internal URLs
				warn!(method, "engine RPC connection failed: {}", err);
				return Err(service_unavailable());
			}
			Ok(Err(err)) => {
				warn!(method, "engine RPC request failed: {}", err);
				return Err(Error::rpc(err.to_string()));
			}
			Err(_) => {
				warn!(method, timeout = ?self.timeout, "engine RPC call timed out");
				return Err(Error::rpc(format!("Engine RPC call {} timed out", method)));
			}
		};

		let status = response.status();
		let body = response
			.into_body()
			.collect()
			.await
			.map_err(|err| Error::rpc(err.to_string()))?
			.to_bytes();
		info!(method, elapsed = ?started.elapsed(), "rpc_client duration");

		interpret_response(method, status, &body)
	}

	/// Sign `transaction` with the wallet, returning the signed transaction and its hash
	pub async fn sign_transaction(&self, wallet_id: &str, transaction: Value) -> ApiResult<(Value, Value)> {
		debug!(wallet_id, "signing transaction");
		let result = self
			.call("transaction.sign", json!({ "signerWallet": wallet_id, "txUnsigned": transaction }))
			.await?;
		signed_transaction(result)
	}

	/// Submit a signed transaction, returning its receipt
	pub async fn send_transaction(&self, signed: Value, callback_url: &str) -> ApiResult<Value> {
		debug!(callback_url, "sending transaction");
		let result = self
			.call("transaction.send", json!({ "callbackUrl": callback_url, "txSigned": signed }))
			.await?;
		transaction_receipt(result)
	}
}

impl std::fmt::Debug for RpcClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RpcClient")
			.field("url", &self.url)
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

pub fn payload(method: &str, params: Value) -> Value {
	let params = if params.is_null() { json!({}) } else { params };
	json!({ "jsonrpc": "2.0", "id": 0, "method": method, "params": params })
}

fn service_unavailable() -> Error {
	Error::Rpc {
		message: "Service temporarily unavailable, try again later".into(),
		status: StatusCode::SERVICE_UNAVAILABLE,
		code: "service_unavailable",
	}
}

/// Map an engine HTTP response to its `result` member or an RPC error
pub fn interpret_response(method: &str, status: StatusCode, body: &[u8]) -> ApiResult<Value> {
	if !status.is_success() {
		let body = String::from_utf8_lossy(body);
		error!(method, status = status.as_u16(), "rpc_client error: {}", body);
		return Err(Error::rpc(body));
	}

	let mut response: Value =
		serde_json::from_slice(body).map_err(|err| Error::rpc(err.to_string()))?;
	if let Some(err) = response.get("error") {
		let code = err.get("code").cloned().unwrap_or_default();
		error!(method, code = %code, "rpc_client error: {}", err);
		let message = match err.get("message") {
			Some(Value::String(message)) => message.clone(),
			Some(other) => other.to_string(),
			None => err.to_string(),
		};
		return Err(Error::rpc(message));
	}

	response.get_mut("result").map(Value::take).ok_or_else(|| Error::rpc(INVALID_RESPONSE))
}

fn succeeded(result: &Value) -> bool {
	result.get("success").and_then(Value::as_bool).unwrap_or(false)
}

fn signed_transaction(mut result: Value) -> ApiResult<(Value, Value)> {
	if succeeded(&result) {
		if let Some(transaction) = result.get_mut("transaction").map(Value::take) {
			debug!("successful signing of transaction");
			let hash = result.get_mut("hash").map(Value::take).unwrap_or(Value::Null);
			return Ok((transaction, hash));
		}
	}
	Err(Error::rpc(INVALID_RESPONSE))
}

fn transaction_receipt(mut result: Value) -> ApiResult<Value> {
	if succeeded(&result) {
		if let Some(receipt) = result.get_mut("receipt").map(Value::take) {
			debug!("successful sending of transaction");
			return Ok(receipt);
		}
	}
	Err(Error::rpc(INVALID_RESPONSE))
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{Json, Router, routing::post};

	fn rpc_error(result: ApiResult<impl std::fmt::Debug>) -> (String, StatusCode, &'static str) {
		match result {
			Err(Error::Rpc { message, status, code }) => (message, status, code),
			other => panic!("expected RPC error, got {:?}", other),
		}
	}

	#[test]
	fn test_payload() {
		assert_eq!(
			payload("wallet.create", Value::Null),
			json!({ "jsonrpc": "2.0", "id": 0, "method": "wallet.create", "params": {} })
		);
	}

	#[test]
	fn test_interpret_success() {
		let body = br#"{"jsonrpc":"2.0","id":0,"result":{"success":true,"wallet":{"id":"w-1"}}}"#;
		let result = interpret_response("wallet.create", StatusCode::OK, body).unwrap();
		assert_eq!(result["wallet"]["id"], "w-1");
	}

	#[test]
	fn test_interpret_engine_error() {
		let body = br#"{"jsonrpc":"2.0","id":0,"error":{"code":402,"message":"Wallet not found"}}"#;
		let (message, status, code) = rpc_error(interpret_response("wallet.get", StatusCode::OK, body));
		assert_eq!(message, "Wallet not found");
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(code, "server_error");
	}

	#[test]
	fn test_interpret_engine_error_without_code() {
		let body = br#"{"jsonrpc":"2.0","id":0,"error":{"message":"Engine busy"}}"#;
		let (message, status, _) = rpc_error(interpret_response("wallet.get", StatusCode::OK, body));
		assert_eq!(message, "Engine busy");
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn test_interpret_http_error() {
		let (message, status, _) =
			rpc_error(interpret_response("wallet.get", StatusCode::BAD_GATEWAY, b"upstream down"));
		assert_eq!(message, "upstream down");
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn test_interpret_missing_result() {
		let (message, _, _) = rpc_error(interpret_response("wallet.get", StatusCode::OK, b"{}"));
		assert_eq!(message, INVALID_RESPONSE);
		assert!(rpc_error(interpret_response("wallet.get", StatusCode::OK, b"not json")).1.is_server_error());
	}

	#[test]
	fn test_transaction_results() {
		let (tx, hash) =
			signed_transaction(json!({ "success": true, "transaction": { "nonce": 1 }, "hash": "0xab" }))
				.unwrap();
		assert_eq!(tx, json!({ "nonce": 1 }));
		assert_eq!(hash, "0xab");

		let (message, _, _) = rpc_error(signed_transaction(json!({ "success": false, "transaction": {} })));
		assert_eq!(message, INVALID_RESPONSE);

		assert_eq!(transaction_receipt(json!({ "success": true, "receipt": { "id": 7 } })).unwrap(), json!({ "id": 7 }));
		assert!(transaction_receipt(json!({ "success": true })).is_err());
	}

	#[tokio::test]
	async fn test_connection_failure_is_service_unavailable() {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		drop(listener);

		let client = RpcClient::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
		let (message, status, code) = rpc_error(client.call("wallet.get", json!({})).await);
		assert_eq!(message, "Service temporarily unavailable, try again later");
		assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(code, "service_unavailable");
	}

	#[tokio::test]
	async fn test_sign_transaction_roundtrip() {
		async fn engine(Json(req): Json<Value>) -> Json<Value> {
			assert_eq!(req["method"], "transaction.sign");
			assert_eq!(req["params"]["signerWallet"], "w-1");
			Json(json!({
				"jsonrpc": "2.0",
				"id": 0,
				"result": { "success": true, "transaction": req["params"]["txUnsigned"], "hash": "0x01" },
			}))
		}

		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			let _ = axum::serve(listener, Router::new().route("/", post(engine))).await;
		});

		let client = RpcClient::new(&format!("http://{}/", addr), Duration::from_secs(5)).unwrap();
		let (tx, hash) = client.sign_transaction("w-1", json!({ "to": "0x02" })).await.unwrap();
		assert_eq!(tx, json!({ "to": "0x02" }));
		assert_eq!(hash, "0x01");
	}
}

// vim: ts=4

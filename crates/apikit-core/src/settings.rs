//! Service settings
//!
//! Settings are built once at startup, either explicitly through
//! `SettingsBuilder` or from the process environment with
//! `Settings::from_env()`.

use jsonwebtoken::Algorithm;
use std::{env, str::FromStr, time::Duration};

use crate::prelude::*;

pub const DEFAULT_REQUESTS_TIMEOUT: Duration = Duration::from_secs(270);
pub const DEFAULT_IOT_GATEWAY_STAGE: &str = "dev";
pub const DEFAULT_PAGE_SIZE: u64 = 25;
pub const DEFAULT_MAX_PAGE_SIZE: u64 = 100;
pub const DEFAULT_PERMISSION_CACHE_CAPACITY: usize = 1024;

/// Deployment environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
	Local,
	Int,
	Other(Box<str>),
}

impl Environment {
	pub fn as_str(&self) -> &str {
		match self {
			Environment::Local => "LOCAL",
			Environment::Int => "INT",
			Environment::Other(name) => name,
		}
	}

	/// Local and integration environments skip internal-call checks
	pub fn is_development(&self) -> bool {
		matches!(self, Environment::Local | Environment::Int)
	}
}

impl From<&str> for Environment {
	fn from(s: &str) -> Self {
		match s.to_ascii_uppercase().as_str() {
			"LOCAL" => Environment::Local,
			"INT" => Environment::Int,
			other => Environment::Other(other.into()),
		}
	}
}

impl std::fmt::Display for Environment {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Key material used to validate access tokens
#[derive(Clone)]
pub enum JwtKey {
	Secret(Box<[u8]>),
	RsaPem(Box<str>),
	EcPem(Box<str>),
}

impl std::fmt::Debug for JwtKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			JwtKey::Secret(_) => f.write_str("JwtKey::Secret(..)"),
			JwtKey::RsaPem(_) => f.write_str("JwtKey::RsaPem(..)"),
			JwtKey::EcPem(_) => f.write_str("JwtKey::EcPem(..)"),
		}
	}
}

#[derive(Debug, Clone)]
pub struct JwtSettings {
	pub algorithm: Algorithm,
	pub key: JwtKey,
	pub audience: Option<Box<str>>,
}

#[derive(Debug, Clone)]
pub struct Settings {
	pub environment: Environment,
	/// Forward the caller's token to other services
	pub profiles_enabled: bool,
	pub engine_rpc_url: Option<Box<str>>,
	/// AWS IoT API gateway host, without scheme
	pub iot_aws_host: Option<Box<str>>,
	pub iot_gateway_stage: Box<str>,
	pub url_shortener_url: Option<Box<str>>,
	pub requests_timeout: Duration,
	pub jwt: Option<JwtSettings>,
	pub page_size: u64,
	pub max_page_size: u64,
	pub permission_cache_capacity: usize,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			environment: Environment::Local,
			profiles_enabled: false,
			engine_rpc_url: None,
			iot_aws_host: None,
			iot_gateway_stage: DEFAULT_IOT_GATEWAY_STAGE.into(),
			url_shortener_url: None,
			requests_timeout: DEFAULT_REQUESTS_TIMEOUT,
			jwt: None,
			page_size: DEFAULT_PAGE_SIZE,
			max_page_size: DEFAULT_MAX_PAGE_SIZE,
			permission_cache_capacity: DEFAULT_PERMISSION_CACHE_CAPACITY,
		}
	}
}

impl Settings {
	pub fn builder() -> SettingsBuilder {
		SettingsBuilder { settings: Settings::default() }
	}

	/// Read settings from environment variables
	pub fn from_env() -> ApiResult<Settings> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Read settings through an arbitrary variable lookup
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ApiResult<Settings> {
		let mut builder = Settings::builder();

		if let Some(environment) = lookup("ENVIRONMENT") {
			builder.environment(environment.as_str());
		}
		if let Some(enabled) = lookup("PROFILES_ENABLED") {
			builder.profiles_enabled(parse_bool("PROFILES_ENABLED", &enabled)?);
		}
		if let Some(url) = lookup("ENGINE_RPC_URL") {
			builder.engine_rpc_url(url);
		}
		if let Some(host) = lookup("IOT_AWS_HOST") {
			builder.iot_aws_host(host);
		}
		if let Some(stage) = lookup("IOT_GATEWAY_STAGE") {
			builder.iot_gateway_stage(stage);
		}
		if let Some(url) = lookup("URL_SHORTENER_URL") {
			builder.url_shortener_url(url);
		}
		if let Some(timeout) = lookup("REQUESTS_TIMEOUT") {
			builder.requests_timeout(Duration::from_secs(parse_num("REQUESTS_TIMEOUT", &timeout)?));
		}
		if let Some(size) = lookup("PAGE_SIZE") {
			builder.page_size(parse_num("PAGE_SIZE", &size)?);
		}
		if let Some(size) = lookup("MAX_PAGE_SIZE") {
			builder.max_page_size(parse_num("MAX_PAGE_SIZE", &size)?);
		}
		if let Some(capacity) = lookup("PERMISSION_CACHE_CAPACITY") {
			builder.permission_cache_capacity(parse_num("PERMISSION_CACHE_CAPACITY", &capacity)?);
		}

		let algorithm = match lookup("JWT_ALGORITHM") {
			Some(alg) => Algorithm::from_str(&alg)
				.map_err(|_| Error::config(format!("JWT_ALGORITHM: unsupported algorithm {}", alg)))?,
			None => Algorithm::HS256,
		};
		if let Some(secret) = lookup("JWT_SECRET") {
			builder.jwt(algorithm, JwtKey::Secret(secret.into_bytes().into_boxed_slice()));
		} else if let Some(pem) = lookup("JWT_PUBLIC_KEY") {
			let key = match algorithm {
				Algorithm::ES256 | Algorithm::ES384 => JwtKey::EcPem(pem.into()),
				_ => JwtKey::RsaPem(pem.into()),
			};
			builder.jwt(algorithm, key);
		}
		if let Some(audience) = lookup("JWT_AUDIENCE") {
			builder.jwt_audience(audience);
		}

		builder.build()
	}
}

fn parse_bool(name: &str, value: &str) -> ApiResult<bool> {
	match value.to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" | "" => Ok(false),
		_ => Err(Error::config(format!("{}: expected a boolean, got {:?}", name, value))),
	}
}

fn parse_num<T: FromStr>(name: &str, value: &str) -> ApiResult<T> {
	value
		.trim()
		.parse()
		.map_err(|_| Error::config(format!("{}: expected a number, got {:?}", name, value)))
}

pub struct SettingsBuilder {
	settings: Settings,
}

impl SettingsBuilder {
	pub fn environment(&mut self, environment: impl Into<Environment>) -> &mut Self {
		self.settings.environment = environment.into();
		self
	}
	pub fn profiles_enabled(&mut self, enabled: bool) -> &mut Self {
		self.settings.profiles_enabled = enabled;
		self
	}
	pub fn engine_rpc_url(&mut self, url: impl Into<Box<str>>) -> &mut Self {
		self.settings.engine_rpc_url = Some(url.into());
		self
	}
	pub fn iot_aws_host(&mut self, host: impl Into<Box<str>>) -> &mut Self {
		self.settings.iot_aws_host = Some(host.into());
		self
	}
	pub fn iot_gateway_stage(&mut self, stage: impl Into<Box<str>>) -> &mut Self {
		self.settings.iot_gateway_stage = stage.into();
		self
	}
	pub fn url_shortener_url(&mut self, url: impl Into<Box<str>>) -> &mut Self {
		self.settings.url_shortener_url = Some(url.into());
		self
	}
	pub fn requests_timeout(&mut self, timeout: Duration) -> &mut Self {
		self.settings.requests_timeout = timeout;
		self
	}
	pub fn jwt(&mut self, algorithm: Algorithm, key: JwtKey) -> &mut Self {
		let audience = self.settings.jwt.take().and_then(|jwt| jwt.audience);
		self.settings.jwt = Some(JwtSettings { algorithm, key, audience });
		self
	}
	pub fn jwt_audience(&mut self, audience: impl Into<Box<str>>) -> &mut Self {
		if let Some(jwt) = self.settings.jwt.as_mut() {
			jwt.audience = Some(audience.into());
		}
		self
	}
	pub fn page_size(&mut self, page_size: u64) -> &mut Self {
		self.settings.page_size = page_size;
		self
	}
	pub fn max_page_size(&mut self, max_page_size: u64) -> &mut Self {
		self.settings.max_page_size = max_page_size;
		self
	}
	pub fn permission_cache_capacity(&mut self, capacity: usize) -> &mut Self {
		self.settings.permission_cache_capacity = capacity;
		self
	}

	pub fn build(&mut self) -> ApiResult<Settings> {
		let settings = self.settings.clone();
		if settings.page_size == 0 {
			return Err(Error::config("page_size must be positive"));
		}
		if settings.max_page_size < settings.page_size {
			return Err(Error::config("max_page_size must be at least page_size"));
		}
		Ok(settings)
	}
}


// vim: ts=4

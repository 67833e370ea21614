//! Access token verification
//!
//! Tokens are issued by the profiles service and only validated here. The
//! `Authorization` header may carry them with a `JWT ` or `Bearer ` prefix.

use axum::http::{HeaderMap, HeaderValue, header};
use jsonwebtoken::{DecodingKey, Validation};

use apikit_types::token::TokenClaims;

use crate::prelude::*;
use crate::settings::{JwtKey, JwtSettings, Settings};
use crate::token::TokenUser;

const AUTH_PREFIXES: [&str; 2] = ["JWT ", "Bearer "];

pub struct JwtVerifier {
	key: DecodingKey,
	validation: Validation,
}

impl JwtVerifier {
	pub fn new(settings: &JwtSettings) -> ApiResult<Self> {
		let key = match &settings.key {
			JwtKey::Secret(secret) => DecodingKey::from_secret(secret),
			JwtKey::RsaPem(pem) => DecodingKey::from_rsa_pem(pem.as_bytes())
				.map_err(|err| Error::config(format!("JWT_PUBLIC_KEY: {}", err)))?,
			JwtKey::EcPem(pem) => DecodingKey::from_ec_pem(pem.as_bytes())
				.map_err(|err| Error::config(format!("JWT_PUBLIC_KEY: {}", err)))?,
		};

		let mut validation = Validation::new(settings.algorithm);
		match &settings.audience {
			Some(audience) => validation.set_audience(&[audience.to_string()]),
			None => validation.validate_aud = false,
		}

		Ok(Self { key, validation })
	}

	/// Decode and validate a raw token
	pub fn verify(&self, token: &str) -> ApiResult<TokenClaims> {
		if token.is_empty() {
			return Err(Error::AuthenticationFailed("No JWT provided with request".into()));
		}
		let data = jsonwebtoken::decode::<TokenClaims>(token, &self.key, &self.validation)
			.map_err(|err| {
				debug!("JWT decode error: {:?}", err);
				Error::AuthenticationFailed("Invalid token.".into())
			})?;
		Ok(data.claims)
	}

	/// Token user for the request, if the `Authorization` header carries a token
	pub fn authenticate(&self, headers: &HeaderMap) -> ApiResult<Option<TokenUser>> {
		let Some(token) = token_from_headers(headers) else {
			return Ok(None);
		};
		let claims = self.verify(token)?;
		Ok(Some(TokenUser::new(claims, token)))
	}
}

impl std::fmt::Debug for JwtVerifier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("JwtVerifier").field("algorithms", &self.validation.algorithms).finish()
	}
}

/// Raw token from the `Authorization` header.
///
/// Headers with another scheme are ignored; a recognized prefix with an
/// empty token yields `Some("")` so verification can reject it.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
	let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
	AUTH_PREFIXES.iter().find_map(|prefix| value.strip_prefix(prefix)).map(str::trim)
}

/// Token to forward to other services, only when profiles are enabled
pub fn jwt_from_auth<'a>(settings: &Settings, user: Option<&'a TokenUser>) -> Option<&'a str> {
	if !settings.profiles_enabled {
		return None;
	}
	user.map(|user| user.raw_token.as_ref())
}

/// Headers authenticating an outgoing request with `token`
pub fn auth_headers(token: &str) -> ApiResult<HeaderMap> {
	let mut headers = HeaderMap::new();
	let value = HeaderValue::from_str(&format!("JWT {}", token))
		.map_err(|_| Error::ValidationError("Token contains invalid characters".into()))?;
	headers.insert(header::AUTHORIZATION, value);
	Ok(headers)
}


// vim: ts=4

//! Extractors for data the middlewares attach to a request

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::prelude::*;
use crate::token::TokenUser;

// Auth //
//******//
#[derive(Debug, Clone)]
pub struct Auth(pub TokenUser);

impl<S> FromRequestParts<S> for Auth
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		if let Some(auth) = parts.extensions.get::<Auth>().cloned() {
			Ok(auth)
		} else {
			Err(Error::Unauthorized)
		}
	}
}

// OptionalAuth //
//**************//
/// Auth extractor that doesn't fail for anonymous requests
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<TokenUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let auth = parts.extensions.get::<Auth>().cloned().map(|a| a.0);
		Ok(OptionalAuth(auth))
	}
}

// RequestId //
//***********//
#[derive(Clone, Debug)]
pub struct RequestId(pub Box<str>);

impl<S> FromRequestParts<S> for RequestId
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		parts
			.extensions
			.get::<RequestId>()
			.cloned()
			.ok_or_else(|| Error::Internal("request id middleware not installed".into()))
	}
}


// vim: ts=4

//! Core of the apikit toolkit.
//!
//! Configurable viewsets resolve per-action serializers and permission
//! checks from an `ActionConfig` table. Around them this crate provides
//! JWT authentication middleware, paginated listings, a generic CRUD
//! dispatcher over a `ModelStore`, a JSON-RPC client and clients for
//! AWS API gateway services.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod action_config;
pub mod app;
pub mod auth;
pub mod aws;
pub mod decl;
pub mod dispatch;
pub mod extract;
pub mod middleware;
pub mod mixins;
pub mod pagination;
pub mod permission;
pub mod prelude;
pub mod rpc;
pub mod serializer;
pub mod settings;
pub mod token;
pub mod utils;
pub mod viewset;

// Re-export commonly used types
pub use action_config::{ActionConfig, ResponseSerializers, Serializers};
pub use app::{App, AppState};
pub use extract::{Auth, OptionalAuth, RequestId};
pub use permission::{Permission, PermissionClass, RequestCtx};
pub use serializer::{Serializer, SerializerRef};
pub use settings::Settings;
pub use token::TokenUser;
pub use viewset::ViewSet;

// vim: ts=4

//! apikit builds REST services out of configurable viewsets.
//!
//! # Features
//!
//! - Per-action serializers
//!     - separate request and response serializers
//!     - response variants selected by format (`?format=csv`)
//! - Per-action permission classes and required user permissions
//! - JWT authentication with cached token permissions
//! - Paginated listings
//! - JSON-RPC client for the engine service
//! - AWS IoT and URL shortener gateway clients

// Re-export shared types from apikit-types
pub use apikit_types::action;
pub use apikit_types::error;
pub use apikit_types::token as claims;
pub use apikit_types::types;

// Core re-exports
pub use apikit_core::action_config;
pub use apikit_core::auth;
pub use apikit_core::aws;
pub use apikit_core::decl;
pub use apikit_core::dispatch;
pub use apikit_core::extract;
pub use apikit_core::middleware;
pub use apikit_core::mixins;
pub use apikit_core::pagination;
pub use apikit_core::permission;
pub use apikit_core::rpc;
pub use apikit_core::serializer;
pub use apikit_core::settings;
pub use apikit_core::token;
pub use apikit_core::utils;
pub use apikit_core::viewset;

// Local modules
pub mod app;
pub mod prelude;

pub use crate::app::{App, AppBuilder};

// vim: ts=4

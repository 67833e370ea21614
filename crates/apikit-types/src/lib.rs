//! Shared types for the apikit toolkit.
//!
//! This crate contains the foundational types shared by the core crate and
//! by services built on top of it: the error type, logical actions, token
//! claims and timestamps.

pub mod action;
pub mod error;
pub mod prelude;
pub mod token;
pub mod types;

// vim: ts=4

//! Axum-based API server for AnnSuraksha.
//!
//! This crate provides:
//! - `/register`, `/api/login` - accounts and HS256 session tokens
//! - `/delivery`, `/deliveries/:id/*`, `/complaint` - chain-mirrored workflows
//! - `/trust_scores/*`, `/dashboard/*`, `/alerts/recent`, `/timeline` - read views
//! - `/users/:aadhar_number/deliveries` - a beneficiary's deliveries, optionally checked on chain
//! - `/dao/*` - dealer votes

#![warn(missing_docs)]

pub mod auth;
/// Error body and status mapping shared by handlers and extractors.
pub mod error;
/// API server runtime and in-process app builder.
pub mod server;

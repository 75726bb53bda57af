//! Signed-token issuance, verification and decoding for HTTP
//! authentication, plus axum middleware that puts a verified payload
//! on the request.
//!
//! The interesting part is [`TokenProvider`]: it owns the secret and
//! the default option sets, merges call-site options over them, and
//! folds every failure mode into the classified [`AuthError`] shape.
//! The middleware in [`middleware::bearer`] is thin plumbing on top.

pub mod app;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod payload;
pub mod provider;
pub mod state;

pub use error::AuthError;
pub use payload::Payload;
pub use provider::{DecodedToken, Secret, SignOptions, TokenProvider, VerifyOptions};

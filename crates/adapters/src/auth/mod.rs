// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer token validation

mod http;

pub use http::HttpAuthAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAuthAdapter;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from token validation
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a bearer token to the user it was issued for
#[async_trait]
pub trait AuthAdapter: Clone + Send + Sync + 'static {
    async fn validate_token(&self, token: &str) -> Result<i64, AuthError>;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake auth adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{AuthAdapter, AuthError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Accepts only tokens registered with [`FakeAuthAdapter::with_token`]
#[derive(Clone, Default)]
pub struct FakeAuthAdapter {
    tokens: Arc<Mutex<HashMap<String, i64>>>,
    checked: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl FakeAuthAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: impl Into<String>, user_id: i64) -> Self {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.into(), user_id);
        self
    }

    /// Every validation takes this long, like a slow auth service
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Tokens presented so far
    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl AuthAdapter for FakeAuthAdapter {
    async fn validate_token(&self, token: &str) -> Result<i64, AuthError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.checked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(token.to_string());
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(token)
            .copied()
            .ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_auth_resolves_known_tokens_only() {
        let auth = FakeAuthAdapter::new().with_token("good", 5);

        assert_eq!(auth.validate_token("good").await.unwrap(), 5);
        assert!(matches!(
            auth.validate_token("bad").await,
            Err(AuthError::InvalidToken)
        ));
        assert_eq!(auth.checked(), vec!["good", "bad"]);
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token validation against the auth service

use super::{AuthAdapter, AuthError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    #[serde(rename = "userID")]
    user_id: i64,
}

/// Calls `GET {url}` with `Authorization: Bearer <token>`; expects
/// `{"userID": <id>}` on success and 401/403 for a bad token.
#[derive(Clone)]
pub struct HttpAuthAdapter {
    agent: ureq::Agent,
    url: String,
}

impl HttpAuthAdapter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            url: url.into(),
        }
    }
}

#[async_trait]
impl AuthAdapter for HttpAuthAdapter {
    async fn validate_token(&self, token: &str) -> Result<i64, AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let agent = self.agent.clone();
        let url = self.url.clone();
        let bearer = format!("Bearer {token}");

        let body = tokio::task::spawn_blocking(move || -> Result<String, ureq::Error> {
            let mut response = agent.get(&url).header("Authorization", bearer).call()?;
            response.body_mut().read_to_string()
        })
        .await
        .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let body = match body {
            Ok(body) => body,
            Err(ureq::Error::StatusCode(401 | 403)) => return Err(AuthError::InvalidToken),
            Err(e) => return Err(AuthError::Unavailable(e.to_string())),
        };

        parse_user_id(&body)
    }
}

fn parse_user_id(body: &str) -> Result<i64, AuthError> {
    serde_json::from_str::<ValidateResponse>(body)
        .map(|r| r.user_id)
        .map_err(|e| AuthError::Unavailable(format!("unexpected auth response: {e}")))
}

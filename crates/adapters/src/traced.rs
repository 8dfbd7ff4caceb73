// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::auth::{AuthAdapter, AuthError};
use crate::datastore::{DatastoreAdapter, DatastoreError};
use crate::mutation::{MutationAdapter, MutationError};
use async_trait::async_trait;
use pw_core::QueuedOperation;
use tracing::Instrument;

/// Wrapper that adds tracing to any MutationAdapter
#[derive(Clone)]
pub struct TracedMutationAdapter<M> {
    inner: M,
}

impl<M> TracedMutationAdapter<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<M: MutationAdapter> MutationAdapter for TracedMutationAdapter<M> {
    async fn apply(&self, op: &QueuedOperation) -> Result<(), MutationError> {
        let span = tracing::info_span!(
            "mutation.apply",
            id = %op.id,
            kind = %op.kind,
            retry = op.retry_count
        );

        async {
            let start = std::time::Instant::now();
            let result = self.inner.apply(op).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(()) => tracing::debug!(elapsed_ms, "applied"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "apply failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any DatastoreAdapter
#[derive(Clone)]
pub struct TracedDatastoreAdapter<D> {
    inner: D,
}

impl<D> TracedDatastoreAdapter<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<D: DatastoreAdapter> DatastoreAdapter for TracedDatastoreAdapter<D> {
    async fn ping(&self) -> Result<(), DatastoreError> {
        let result = self.inner.ping().await;
        // Pings run every few seconds; only failures are interesting
        match &result {
            Ok(()) => tracing::trace!("datastore ping ok"),
            Err(e) => tracing::debug!(error = %e, "datastore ping failed"),
        }
        result
    }
}

/// Wrapper that adds tracing to any AuthAdapter
#[derive(Clone)]
pub struct TracedAuthAdapter<A> {
    inner: A,
}

impl<A> TracedAuthAdapter<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<A: AuthAdapter> AuthAdapter for TracedAuthAdapter<A> {
    async fn validate_token(&self, token: &str) -> Result<i64, AuthError> {
        let span = tracing::info_span!("auth.validate", token_len = token.len());

        async {
            let result = self.inner.validate_token(token).await;
            match &result {
                Ok(user_id) => tracing::debug!(user_id, "token accepted"),
                Err(AuthError::InvalidToken) => tracing::info!("token rejected"),
                Err(e) => tracing::error!(error = %e, "token validation failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;

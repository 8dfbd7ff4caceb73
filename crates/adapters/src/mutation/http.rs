// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Forwards queued mutations to the business layer over HTTP

use super::{MutationAdapter, MutationError};
use async_trait::async_trait;
use pw_core::QueuedOperation;
use std::time::Duration;

/// Posts each operation as JSON to `{url}/{kind}`
#[derive(Clone)]
pub struct HttpMutationAdapter {
    agent: ureq::Agent,
    url: String,
}

impl HttpMutationAdapter {
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

    fn endpoint(&self, op: &QueuedOperation) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), op.kind)
    }
}

#[async_trait]
impl MutationAdapter for HttpMutationAdapter {
    async fn apply(&self, op: &QueuedOperation) -> Result<(), MutationError> {
        let body = serde_json::to_string(op)?;
        let endpoint = self.endpoint(op);
        let idempotency_key = op.id.clone();
        let agent = self.agent.clone();

        let result = tokio::task::spawn_blocking(move || {
            agent
                .post(&endpoint)
                .header("Content-Type", "application/json")
                .header("Idempotency-Key", idempotency_key)
                .send(body.as_str())
                .map(|_| ())
        })
        .await
        .map_err(|e| MutationError::Unreachable(e.to_string()))?;

        match result {
            Ok(()) => Ok(()),
            Err(ureq::Error::StatusCode(status)) => Err(MutationError::Rejected { status }),
            Err(e) => Err(MutationError::Unreachable(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_core::{OperationKind, Payload};

    #[test]
    fn endpoint_appends_kind() {
        let adapter = HttpMutationAdapter::new("http://api/internal/mutations/", Duration::from_secs(1));
        let op = QueuedOperation::new(
            OperationKind::AddToLibrary,
            1,
            2,
            Payload::new(),
            chrono::Utc::now(),
            0,
        );
        assert_eq!(
            adapter.endpoint(&op),
            "http://api/internal/mutations/add_to_library"
        );
    }
}

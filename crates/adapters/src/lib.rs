// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the collaborators the resilience layer calls through:
//! the mutation writer, the datastore probe and the token validator.

pub mod auth;
pub mod datastore;
pub mod mutation;
pub mod traced;

pub use auth::{AuthAdapter, AuthError, HttpAuthAdapter};
pub use datastore::{DatastoreAdapter, DatastoreError, TcpProbeAdapter};
pub use mutation::{HttpMutationAdapter, MutationAdapter, MutationError};
pub use traced::{TracedAuthAdapter, TracedDatastoreAdapter, TracedMutationAdapter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use auth::FakeAuthAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use datastore::FakeDatastoreAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use mutation::FakeMutationAdapter;

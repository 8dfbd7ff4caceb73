// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod daemon;
pub mod enqueue;
pub mod fields;
pub mod follow;
pub mod listen;
pub mod notify;
pub mod progress;

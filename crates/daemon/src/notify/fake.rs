// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory datagram transport for tests

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::DatagramTransport;

#[derive(Default)]
struct FakeTransportState {
    sent: Vec<(SocketAddr, Vec<u8>)>,
    attempts: usize,
    script: VecDeque<io::ErrorKind>,
    unreachable: Vec<SocketAddr>,
}

/// Records sent datagrams; failures can be scripted per attempt or per address
#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<FakeTransportState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next sends, in order, with these error kinds
    pub fn fail_with(&self, kinds: impl IntoIterator<Item = io::ErrorKind>) {
        self.lock().script.extend(kinds);
    }

    /// Every send to `addr` fails with a non-transient error
    pub fn set_unreachable(&self, addr: SocketAddr) {
        self.lock().unreachable.push(addr);
    }

    pub fn sent(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        self.lock().sent.clone()
    }

    pub fn sent_to(&self, addr: SocketAddr) -> Vec<Vec<u8>> {
        self.lock()
            .sent
            .iter()
            .filter(|(to, _)| *to == addr)
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeTransportState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DatagramTransport for FakeTransport {
    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize> {
        let mut state = self.lock();
        state.attempts += 1;
        if state.unreachable.contains(&addr) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "unreachable"));
        }
        if let Some(kind) = state.script.pop_front() {
            return Err(io::Error::from(kind));
        }
        state.sent.push((addr, bytes.to_vec()));
        Ok(bytes.len())
    }
}

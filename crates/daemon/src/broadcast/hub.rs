// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of live broadcast peers
//!
//! Peers are indexed by connection ID and, once authenticated, by user ID.
//! Both indices live under one lock so they never disagree.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use pw_core::packet::ProgressPayload;
use pw_core::{Clock, Packet, PacketType, SystemClock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::BroadcastError;

struct Peer {
    tx: mpsc::Sender<Packet>,
    user_id: Option<i64>,
}

#[derive(Default)]
struct HubInner {
    peers: HashMap<String, Peer>,
    by_user: HashMap<i64, HashSet<String>>,
}

impl HubInner {
    fn unindex(&mut self, conn_id: &str, user_id: i64) {
        if let Some(conns) = self.by_user.get_mut(&user_id) {
            conns.remove(conn_id);
            if conns.is_empty() {
                self.by_user.remove(&user_id);
            }
        }
    }
}

/// Shared registry of connected peers with a bounded outbox each
pub struct BroadcastHub<C: Clock = SystemClock> {
    inner: Mutex<HubInner>,
    buffer: usize,
    clock: C,
}

impl<C: Clock> BroadcastHub<C> {
    /// `buffer` is the per-peer outbox size; pushes beyond it are dropped
    pub fn new(buffer: usize, clock: C) -> Self {
        Self {
            inner: Mutex::new(HubInner::default()),
            buffer: buffer.max(1),
            clock,
        }
    }

    /// Add an unauthenticated peer and return its outbox
    ///
    /// The peer is not addressable until [`authenticate`](Self::authenticate).
    pub fn register(&self, conn_id: &str) -> mpsc::Receiver<Packet> {
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut inner = self.lock();
        if let Some(old) = inner.peers.insert(conn_id.to_string(), Peer { tx, user_id: None }) {
            if let Some(user_id) = old.user_id {
                inner.unindex(conn_id, user_id);
            }
        }
        rx
    }

    /// Bind a peer to a user. Returns false for an unknown connection.
    pub fn authenticate(&self, conn_id: &str, user_id: i64) -> bool {
        let mut inner = self.lock();
        let Some(peer) = inner.peers.get_mut(conn_id) else {
            return false;
        };
        let previous = peer.user_id.replace(user_id);

        if let Some(prev) = previous.filter(|prev| *prev != user_id) {
            inner.unindex(conn_id, prev);
        }
        inner
            .by_user
            .entry(user_id)
            .or_default()
            .insert(conn_id.to_string());
        true
    }

    /// Remove a peer from both indices
    pub fn unregister(&self, conn_id: &str) -> bool {
        let mut inner = self.lock();
        let Some(peer) = inner.peers.remove(conn_id) else {
            return false;
        };
        if let Some(user_id) = peer.user_id {
            inner.unindex(conn_id, user_id);
        }
        true
    }

    /// Push a packet to every authenticated peer of `user_id`
    ///
    /// Never blocks: a full outbox drops the packet for that peer only, and
    /// a closed outbox removes the peer. Returns the number of peers that
    /// accepted the packet.
    pub fn send_to_user(&self, user_id: i64, packet: &Packet) -> usize {
        self.send_to_user_except(user_id, packet, None)
    }

    pub(crate) fn send_to_user_except(
        &self,
        user_id: i64,
        packet: &Packet,
        except: Option<&str>,
    ) -> usize {
        let targets: Vec<(String, mpsc::Sender<Packet>)> = {
            let inner = self.lock();
            let Some(conns) = inner.by_user.get(&user_id) else {
                return 0;
            };
            conns
                .iter()
                .filter(|id| Some(id.as_str()) != except)
                .filter_map(|id| inner.peers.get(id).map(|p| (id.clone(), p.tx.clone())))
                .collect()
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (conn_id, tx) in targets {
            match tx.try_send(packet.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(conn_id = %conn_id, user_id, kind = %packet.kind, "peer outbox full, dropping push");
                }
                Err(TrySendError::Closed(_)) => closed.push(conn_id),
            }
        }

        for conn_id in closed {
            debug!(conn_id = %conn_id, "removing closed peer");
            self.unregister(&conn_id);
        }
        delivered
    }

    /// Push a `progress` packet to the user's online devices
    ///
    /// Having no connected peer is not an error.
    pub fn broadcast_progress(
        &self,
        user_id: i64,
        entity_id: i64,
        position: f64,
        sub_position_id: Option<i64>,
    ) -> Result<usize, BroadcastError> {
        let packet = Packet::new(
            PacketType::Progress,
            &ProgressPayload {
                user_id,
                entity_id,
                position,
                sub_position_id,
                updated_at: self.clock.utc_now(),
            },
        )?;
        let delivered = self.send_to_user(user_id, &packet);
        debug!(user_id, entity_id, delivered, "progress broadcast");
        Ok(delivered)
    }

    /// Connected peers, authenticated or not
    pub fn peer_count(&self) -> usize {
        self.lock().peers.len()
    }

    /// Distinct authenticated users
    pub fn user_count(&self) -> usize {
        self.lock().by_user.len()
    }

    pub fn user_of(&self, conn_id: &str) -> Option<i64> {
        self.lock().peers.get(conn_id).and_then(|p| p.user_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;

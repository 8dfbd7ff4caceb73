// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of notification clients
//!
//! Each client is keyed by `address:userID` and indexed three ways: by key,
//! by user, and by every subscribed topic. Subscribers to all topics sit in
//! a separate set. Every mutation updates all indices under one lock.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use pw_core::Clock;
use thiserror::Error;
use tracing::info;

/// Registration refused because the registry is at capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("registry full ({max_clients} clients)")]
pub struct RegistryFull {
    pub max_clients: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Inserted,
    Refreshed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationClient {
    pub address: SocketAddr,
    pub user_id: i64,
    pub topic_ids: HashSet<i64>,
    pub all_topics: bool,
    pub device_id: Option<String>,
    pub registered_at: Instant,
    pub last_seen_at: Instant,
}

impl NotificationClient {
    pub fn key(&self) -> String {
        client_key(self.address, self.user_id)
    }
}

fn client_key(address: SocketAddr, user_id: i64) -> String {
    format!("{address}:{user_id}")
}

#[derive(Default)]
struct Indices {
    clients: HashMap<String, NotificationClient>,
    by_user: HashMap<i64, HashSet<String>>,
    by_topic: HashMap<i64, HashSet<String>>,
    all_topics: HashSet<String>,
}

impl Indices {
    fn index(&mut self, key: &str, client: &NotificationClient) {
        self.by_user
            .entry(client.user_id)
            .or_default()
            .insert(key.to_string());
        for topic in &client.topic_ids {
            self.by_topic
                .entry(*topic)
                .or_default()
                .insert(key.to_string());
        }
        if client.all_topics {
            self.all_topics.insert(key.to_string());
        }
    }

    fn unindex(&mut self, key: &str, client: &NotificationClient) {
        remove_from(&mut self.by_user, client.user_id, key);
        for topic in &client.topic_ids {
            remove_from(&mut self.by_topic, *topic, key);
        }
        self.all_topics.remove(key);
    }

    fn remove(&mut self, key: &str) -> Option<NotificationClient> {
        let client = self.clients.remove(key)?;
        self.unindex(key, &client);
        Some(client)
    }

    fn addresses<'a>(&self, keys: impl Iterator<Item = &'a String>) -> Vec<SocketAddr> {
        keys.filter_map(|key| self.clients.get(key).map(|c| c.address))
            .collect()
    }
}

fn remove_from(index: &mut HashMap<i64, HashSet<String>>, id: i64, key: &str) {
    if let Some(keys) = index.get_mut(&id) {
        keys.remove(key);
        if keys.is_empty() {
            index.remove(&id);
        }
    }
}

pub struct ClientRegistry<C: Clock> {
    inner: Mutex<Indices>,
    max_clients: usize,
    stale_after: Duration,
    clock: C,
}

impl<C: Clock> ClientRegistry<C> {
    pub fn new(max_clients: usize, stale_after: Duration, clock: C) -> Self {
        Self {
            inner: Mutex::new(Indices::default()),
            max_clients,
            stale_after,
            clock,
        }
    }

    /// Insert a client or refresh an existing one
    ///
    /// A refresh replaces the subscriptions and bumps `last_seen_at`; it is
    /// always allowed. A new key is refused once `max_clients` is reached.
    pub fn register(
        &self,
        address: SocketAddr,
        user_id: i64,
        topic_ids: impl IntoIterator<Item = i64>,
        all_topics: bool,
        device_id: Option<String>,
    ) -> Result<Registration, RegistryFull> {
        let key = client_key(address, user_id);
        let now = self.clock.now();
        let mut inner = self.lock();

        let (registered_at, outcome) = match inner.remove(&key) {
            Some(existing) => (existing.registered_at, Registration::Refreshed),
            None if inner.clients.len() >= self.max_clients => {
                return Err(RegistryFull {
                    max_clients: self.max_clients,
                })
            }
            None => (now, Registration::Inserted),
        };

        let client = NotificationClient {
            address,
            user_id,
            topic_ids: topic_ids.into_iter().collect(),
            all_topics,
            device_id,
            registered_at,
            last_seen_at: now,
        };
        inner.index(&key, &client);
        inner.clients.insert(key, client);
        Ok(outcome)
    }

    /// Remove the registration of `user_id` at `address`
    pub fn unregister(&self, address: SocketAddr, user_id: i64) -> bool {
        self.lock().remove(&client_key(address, user_id)).is_some()
    }

    /// Remove every registration from `address`, whatever the user
    pub fn unregister_address(&self, address: SocketAddr) -> usize {
        let mut inner = self.lock();
        let keys: Vec<String> = inner
            .clients
            .iter()
            .filter(|(_, c)| c.address == address)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            inner.remove(key);
        }
        keys.len()
    }

    /// Addresses interested in `topic_id`: topic subscribers plus
    /// all-topics subscribers, each registration at most once
    pub fn topic_recipients(&self, topic_id: i64) -> Vec<SocketAddr> {
        let inner = self.lock();
        let mut keys: HashSet<&String> = inner.all_topics.iter().collect();
        if let Some(subscribed) = inner.by_topic.get(&topic_id) {
            keys.extend(subscribed.iter());
        }
        inner.addresses(keys.into_iter())
    }

    /// Every registered address of `user_id`
    pub fn user_recipients(&self, user_id: i64) -> Vec<SocketAddr> {
        let inner = self.lock();
        match inner.by_user.get(&user_id) {
            Some(keys) => inner.addresses(keys.iter()),
            None => Vec::new(),
        }
    }

    /// Evict clients not seen within the staleness window, returning their keys
    pub fn sweep(&self, now: Instant) -> Vec<String> {
        let mut inner = self.lock();
        let stale: Vec<String> = inner
            .clients
            .iter()
            .filter(|(_, c)| now.saturating_duration_since(c.last_seen_at) > self.stale_after)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            inner.remove(key);
        }
        if !stale.is_empty() {
            info!(evicted = stale.len(), remaining = inner.clients.len(), "swept stale clients");
        }
        stale
    }

    pub fn get(&self, address: SocketAddr, user_id: i64) -> Option<NotificationClient> {
        self.lock().clients.get(&client_key(address, user_id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Indices> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

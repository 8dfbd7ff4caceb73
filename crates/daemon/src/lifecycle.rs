// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pw_adapters::{
    AuthAdapter, DatastoreAdapter, HttpAuthAdapter, HttpMutationAdapter, MutationAdapter,
    TcpProbeAdapter, TracedAuthAdapter, TracedDatastoreAdapter, TracedMutationAdapter,
};
use pw_core::{Config, SystemClock, UuidIdGen};
use pw_engine::{
    HealthSettings, HealthSupervisor, ReconnectHandler, WriteAheadQueue, WriteProcessor,
};
use thiserror::Error;
use tokio::net::{TcpListener, UdpSocket, UnixListener};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::broadcast::{BroadcastError, BroadcastHub, BroadcastServer, BroadcastSettings};
use crate::notify::{ClientRegistry, NotifyError, NotifyServer, NotifySettings};
use crate::supervisor::supervise;

/// Upper bound on waiting for background tasks at shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Per-request timeout for replayed mutations
const MUTATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Daemon with the production adapters (wrapped with tracing)
pub type Daemon = DaemonState<
    TracedMutationAdapter<HttpMutationAdapter>,
    TracedDatastoreAdapter<TcpProbeAdapter>,
    TracedAuthAdapter<HttpAuthAdapter>,
>;

/// The collaborators the daemon calls out to
pub struct Adapters<M, D, A> {
    pub mutations: M,
    pub datastore: D,
    pub auth: A,
}

impl Adapters<
    TracedMutationAdapter<HttpMutationAdapter>,
    TracedDatastoreAdapter<TcpProbeAdapter>,
    TracedAuthAdapter<HttpAuthAdapter>,
> {
    /// HTTP mutation/auth endpoints and a TCP datastore probe from config
    pub fn from_config(config: &Config) -> Self {
        let upstream = &config.upstream;
        Self {
            mutations: TracedMutationAdapter::new(HttpMutationAdapter::new(
                upstream.mutation_url.clone(),
                MUTATION_TIMEOUT,
            )),
            datastore: TracedDatastoreAdapter::new(TcpProbeAdapter::new(
                upstream.datastore_addr.clone(),
                config.health.ping_timeout,
            )),
            auth: TracedAuthAdapter::new(HttpAuthAdapter::new(
                upstream.auth_url.clone(),
                config.broadcast.auth_timeout,
            )),
        }
    }
}

/// Daemon state during operation
pub struct DaemonState<M, D, A>
where
    M: MutationAdapter,
    D: DatastoreAdapter,
    A: AuthAdapter,
{
    pub config: Config,
    /// Control socket listener
    pub listener: UnixListener,
    pub queue: Arc<WriteAheadQueue<SystemClock>>,
    pub health: Arc<HealthSupervisor<D, SystemClock>>,
    pub processor: Arc<WriteProcessor<M, SystemClock>>,
    pub hub: Arc<BroadcastHub>,
    pub notify: Arc<NotifyServer<A, UdpSocket, SystemClock>>,
    /// Bound addresses (differ from config when it asks for port 0)
    pub broadcast_addr: SocketAddr,
    pub notify_addr: SocketAddr,
    /// Cancels every background loop; also fired by a `Shutdown` request
    pub cancel: CancellationToken,
    pub start_time: Instant,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<M, D, A> DaemonState<M, D, A>
where
    M: MutationAdapter,
    D: DatastoreAdapter,
    A: AuthAdapter,
{
    pub fn request_shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn shutdown_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(&self) {
        info!("shutting down daemon");

        self.cancel.cancel();
        self.health.stop();
        self.processor.stop();

        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *tasks)
        };
        let joined = tokio::time::timeout(SHUTDOWN_GRACE, async {
            for task in tasks {
                let _ = task.await;
            }
        })
        .await;
        if joined.is_err() {
            warn!("background tasks did not stop in time");
        }

        let pending = self.queue.len();
        if pending > 0 {
            warn!(pending, "exiting with queued operations not applied");
        }

        let socket_path = &self.config.daemon.control_socket;
        if socket_path.exists() {
            if let Err(e) = std::fs::remove_file(socket_path) {
                warn!(path = %socket_path.display(), error = %e, "failed to remove socket file");
            }
        }

        info!("daemon shutdown complete");
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to bind control socket at {0}: {1}")]
    BindFailed(PathBuf, #[source] std::io::Error),

    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("config error: {0}")]
    Config(#[from] pw_core::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon with the production adapters
pub async fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    startup_with(config, Adapters::from_config(config)).await
}

/// Start the daemon with the given adapters
///
/// Every listener is bound before any background task is spawned, so a
/// failed startup leaves nothing running.
pub async fn startup_with<M, D, A>(
    config: &Config,
    adapters: Adapters<M, D, A>,
) -> Result<DaemonState<M, D, A>, LifecycleError>
where
    M: MutationAdapter,
    D: DatastoreAdapter,
    A: AuthAdapter,
{
    let Adapters {
        mutations,
        datastore,
        auth,
    } = adapters;
    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    // 1. Bind everything first so a taken port fails fast
    let tcp = BroadcastServer::<A, UuidIdGen>::bind(config.broadcast.listen_addr).await?;
    let broadcast_addr = tcp.local_addr()?;
    let udp = NotifyServer::<A, UdpSocket, SystemClock>::bind(config.notify.listen_addr).await?;
    let udp = Arc::new(udp);
    let notify_addr = udp.local_addr()?;

    // Control socket last: clients only see it once the ports are taken
    let socket_path = &config.daemon.control_socket;
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let listener = UnixListener::bind(socket_path)
        .map_err(|e| LifecycleError::BindFailed(socket_path.clone(), e))?;

    // 2. Write path
    let queue = Arc::new(WriteAheadQueue::new(
        config.queue.max_size,
        config.queue.max_retries,
        SystemClock,
    ));
    let health = Arc::new(HealthSupervisor::new(
        datastore,
        SystemClock,
        HealthSettings::from(&config.health),
    ));
    let processor = Arc::new(
        WriteProcessor::new(Arc::clone(&queue), mutations, config.queue.flush_timeout)
            .with_health(health.handle()),
    );
    health.set_on_reconnect(Arc::clone(&processor) as Arc<dyn ReconnectHandler>);
    health.start();
    tasks.push(processor.start_processing(config.queue.drain_interval));

    // 3. Broadcast server under restart supervision
    let hub = Arc::new(BroadcastHub::new(config.broadcast.peer_buffer, SystemClock));
    let broadcast = Arc::new(BroadcastServer::new(
        Arc::clone(&hub),
        auth.clone(),
        UuidIdGen,
        BroadcastSettings::from(&config.broadcast),
    ));
    tasks.push(spawn_broadcast(
        broadcast,
        tcp,
        broadcast_addr,
        config.broadcast.restart_backoff,
        cancel.clone(),
    ));

    // 4. Notification server, its supervisor and the stale sweep
    let registry = ClientRegistry::new(
        config.notify.max_clients,
        config.notify.stale_after,
        SystemClock,
    );
    let notify = Arc::new(NotifyServer::new(
        registry,
        auth,
        Arc::clone(&udp),
        NotifySettings::from(&config.notify),
    ));
    tasks.push(spawn_notify(
        Arc::clone(&notify),
        udp,
        config.notify.restart_backoff,
        cancel.clone(),
    ));
    tasks.push(tokio::spawn(Arc::clone(&notify).sweep_loop(cancel.clone())));

    info!(
        %broadcast_addr,
        %notify_addr,
        control_socket = %socket_path.display(),
        "daemon started"
    );

    Ok(DaemonState {
        config: config.clone(),
        listener,
        queue,
        health,
        processor,
        hub,
        notify,
        broadcast_addr,
        notify_addr,
        cancel,
        start_time: Instant::now(),
        tasks: Mutex::new(tasks),
    })
}

/// Run the accept loop, rebinding the same address after a failure
fn spawn_broadcast<A: AuthAdapter>(
    server: Arc<BroadcastServer<A, UuidIdGen>>,
    listener: TcpListener,
    addr: SocketAddr,
    backoff: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut bound = Some(listener);
    let loop_cancel = cancel.clone();
    tokio::spawn(async move {
        supervise("broadcast", backoff, cancel, move || {
            let listener = bound.take();
            let server = Arc::clone(&server);
            let cancel = loop_cancel.clone();
            async move {
                let listener = match listener {
                    Some(listener) => listener,
                    None => BroadcastServer::<A, UuidIdGen>::bind(addr).await?,
                };
                server.serve(listener, cancel).await
            }
        })
        .await;
    })
}

fn spawn_notify<A: AuthAdapter>(
    server: Arc<NotifyServer<A, UdpSocket, SystemClock>>,
    socket: Arc<UdpSocket>,
    backoff: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let loop_cancel = cancel.clone();
    tokio::spawn(async move {
        supervise("notify", backoff, cancel, move || {
            Arc::clone(&server).serve(Arc::clone(&socket), loop_cancel.clone())
        })
        .await;
    })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

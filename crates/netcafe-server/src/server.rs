//! Server wiring: binds the sockets, spawns the long-running tasks, and owns
//! shutdown.
//!
//! Three always-running tasks plus one worker per connection (the workers are
//! owned by the accept loop):
//!
//! ```text
//! Server::start(config)
//!  ├─ bind TCP listener          -- fatal on failure
//!  ├─ bind UDP beacon socket     -- fatal on failure
//!  ├─ spawn accept_loop          -- owns connection workers
//!  └─ spawn beacon_loop
//! ```
//!
//! Startup either succeeds — the server is listening and broadcasting — or
//! fails with a clear reason. After a successful start, individual client
//! misbehavior never propagates past that client's worker.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use thiserror::Error;

use crate::beacon;
use crate::commands::CommandApi;
use crate::config::ServerConfig;
use crate::dispatch::DispatchRegistry;
use crate::listener;
use crate::store::{StatusEvent, StatusStore};

/// How long shutdown waits for the accept loop and beacon to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for server startup.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A listen or beacon socket could not be bound. Fatal: start aborts.
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A configured address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// The running server.
pub struct Server;

impl Server {
    /// Binds the sockets, wires the store/registry/commands together, and
    /// spawns the accept and beacon tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if either socket cannot be bound or an address
    /// in the config does not parse. No tasks are left running on failure.
    pub async fn start(config: ServerConfig) -> Result<ServerHandle, ServerError> {
        let (store, events) = StatusStore::new();
        let store = Arc::new(store);
        let registry = Arc::new(DispatchRegistry::with_default_handlers(Arc::clone(&store)));
        let commands = CommandApi::new(Arc::clone(&store), config.identity.clone());

        let listen_addr = parse_addr(&config.bind_address, config.server_port)?;
        let tcp = TcpListener::bind(listen_addr)
            .await
            .map_err(|source| ServerError::BindFailed { addr: listen_addr, source })?;
        let local_addr = tcp.local_addr().map_err(|source| ServerError::BindFailed {
            addr: listen_addr,
            source,
        })?;

        // The beacon sends from an ephemeral port; only the destination is
        // configured.
        let beacon_bind = parse_addr(&config.bind_address, 0)?;
        let udp = UdpSocket::bind(beacon_bind)
            .await
            .map_err(|source| ServerError::BindFailed { addr: beacon_bind, source })?;
        if let Err(e) = udp.set_broadcast(true) {
            warn!("could not enable broadcast on beacon socket: {e}");
        }
        let beacon_dest = parse_addr(&config.broadcast_address, config.broadcast_port)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(listener::accept_loop(
            tcp,
            Arc::clone(&store),
            Arc::clone(&registry),
            config.connection_timeout(),
            config.max_connections,
            shutdown_rx.clone(),
        ));
        let beacon_task = tokio::spawn(beacon::beacon_loop(
            udp,
            config.identity.clone(),
            beacon_dest,
            config.broadcast_interval(),
            shutdown_rx,
        ));

        info!(
            "server listening on {local_addr}, broadcasting to {beacon_dest} every {}s",
            config.broadcast_interval_secs
        );

        Ok(ServerHandle {
            local_addr,
            store,
            commands,
            events: Some(events),
            shutdown_tx,
            tasks: vec![accept_task, beacon_task],
        })
    }
}

fn parse_addr(host: &str, port: u16) -> Result<SocketAddr, ServerError> {
    format!("{host}:{port}")
        .parse()
        .map_err(|_| ServerError::InvalidAddress(format!("{host}:{port}")))
}

/// Handle to a running server: the read surface for UI/reporting layers, the
/// command surface for business logic, and shutdown.
pub struct ServerHandle {
    local_addr: SocketAddr,
    store: Arc<StatusStore>,
    commands: CommandApi,
    events: Option<mpsc::UnboundedReceiver<StatusEvent>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Actual bound address of the TCP listener (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The shared status store, for `get`/`list_all` readers.
    pub fn store(&self) -> &Arc<StatusStore> {
        &self.store
    }

    /// The command API for this server.
    pub fn commands(&self) -> &CommandApi {
        &self.commands
    }

    /// Takes the status-change event receiver. Yields `None` after the first
    /// call.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<StatusEvent>> {
        self.events.take()
    }

    /// Signals all tasks to stop and waits for them, bounded by
    /// [`SHUTDOWN_TIMEOUT`]. Tasks that miss the deadline are aborted.
    pub async fn shutdown(self) {
        info!("server shutting down");
        // Every task holds a watch receiver; flipping the value unblocks all
        // in-flight accepts and reads.
        let _ = self.shutdown_tx.send(true);

        for task in self.tasks {
            match timeout(SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_panic() => warn!("task panicked during shutdown: {e}"),
                Ok(Err(_)) => {}
                Err(_) => warn!("task missed the shutdown deadline"),
            }
        }
        info!("server stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

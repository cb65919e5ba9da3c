//! Relay server: accept loop and routing policy
//!
//! Each accepted connection gets its own thread running the session read
//! loop. Decoded messages are routed through the shared [`Hub`]:
//!
//! | Message | From | Action |
//! |---------|------|--------|
//! | `NODE_ADDED:n` | any session | bind `n` to the session (announced to others) |
//! | `SENSOR:n:...` | any session | bind `n` if free, then broadcast to others |
//! | `ACTUATOR:n:...` | the session bound to `n` | state report, broadcast to others |
//! | `ACTUATOR:n:...` | any other session | command, directed send to node `n` |
//! | `NODE_REMOVED:n` | the session bound to `n` | unbind `n` (announced to others) |
//!
//! There is no connection limit; one thread per connection is the scaling
//! ceiling of this design.

use crate::error::{Error, Result};
use crate::streaming::hub::{BindOutcome, Hub};
use crate::streaming::messages::Message;
use crate::streaming::session::{Session, SessionId};
use crate::transport::Link;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Accept loop poll interval while no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Routing policy on top of a hub
pub struct Relay {
    hub: Arc<Hub>,
}

impl Relay {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Route one message received on session `origin`
    pub fn route(&self, origin: SessionId, msg: Message) {
        match &msg {
            Message::NodeAdded { node_id } => {
                self.claim(*node_id, origin);
            }
            Message::SensorUpdate { node_id, .. } => {
                if self.claim(*node_id, origin) {
                    self.broadcast(&msg, origin);
                }
            }
            Message::ActuatorUpdate { node_id, .. } => {
                if self.hub.owner_of(*node_id) == Some(origin) {
                    self.broadcast(&msg, origin);
                } else {
                    match self.hub.send_to(*node_id, &msg) {
                        Ok(true) => {}
                        Ok(false) => log::warn!(
                            "Session {}: command for node {} dropped, node not connected",
                            origin,
                            node_id
                        ),
                        Err(e) => log::warn!("Session {}: cannot route command: {}", origin, e),
                    }
                }
            }
            Message::NodeRemoved { node_id } => {
                self.hub.unbind_node(*node_id, origin);
            }
        }
    }

    /// Serve one accepted connection until it closes
    pub fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let (session, reader) = Session::new(stream)?;
        let id = session.id();
        let peer = session.peer();

        if !self.hub.register(id, Arc::clone(&session) as Arc<dyn Link>) {
            log::warn!("Client {:?} dropped during node replay (session {})", peer, id);
            return Ok(());
        }
        log::info!("Client connected: {:?} (session {})", peer, id);

        let outcome = session.serve(reader, |msg| self.route(id, msg));

        self.hub.deregister(id);
        log::info!("Client disconnected: {:?} (session {})", peer, id);
        outcome
    }

    /// Bind the node to the session; `false` if another session owns it
    fn claim(&self, node_id: u32, origin: SessionId) -> bool {
        match self.hub.bind_node(node_id, origin) {
            BindOutcome::Bound | BindOutcome::AlreadyBound => true,
            BindOutcome::Conflict(owner) => {
                log::warn!(
                    "Session {}: ignoring data for node {} owned by session {}",
                    origin,
                    node_id,
                    owner
                );
                false
            }
            BindOutcome::UnknownSession => false,
        }
    }

    fn broadcast(&self, msg: &Message, origin: SessionId) {
        if let Err(e) = self.hub.broadcast(msg, Some(origin)) {
            log::warn!("Session {}: cannot relay {}: {}", origin, msg.tag(), e);
        }
    }
}

/// TCP front end of a [`Relay`]
///
/// Each connection gets its own thread, but every fan-out write runs on the
/// sender's thread while the hub lock is held and sockets have no write
/// timeout. A peer that stops reading therefore blocks delivery to all
/// sessions once its socket buffer fills.
pub struct RelayServer {
    listener: TcpListener,
    relay: Arc<Relay>,
    running: Arc<AtomicBool>,
}

impl RelayServer {
    /// Bind the listening socket
    ///
    /// Failing to bind is the one fatal relay error.
    pub fn bind(address: &str, running: Arc<AtomicBool>) -> Result<Self> {
        let listener = TcpListener::bind(address).map_err(|source| Error::Bind {
            address: address.to_string(),
            source,
        })?;
        if let Err(e) = listener.set_nonblocking(true) {
            log::warn!("Failed to set nonblocking mode: {}", e);
        }

        Ok(Self {
            listener,
            relay: Arc::new(Relay::new(Arc::new(Hub::new()))),
            running,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn relay(&self) -> Arc<Relay> {
        Arc::clone(&self.relay)
    }

    /// Accept connections until the running flag is cleared
    ///
    /// On exit every remaining session is closed, which ends their threads.
    pub fn run(&self) -> Result<()> {
        log::info!("Relay listening on {}", self.local_addr()?);

        while self.running.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        log::error!("Failed to set blocking mode for {}: {}", addr, e);
                        continue;
                    }

                    let relay = Arc::clone(&self.relay);
                    let spawned = thread::Builder::new()
                        .name(format!("relay-{}", addr))
                        .spawn(move || {
                            if let Err(e) = relay.handle_connection(stream) {
                                log::error!("Connection {} ended with error: {}", addr, e);
                            }
                        });
                    if let Err(e) = spawned {
                        log::error!("Failed to spawn thread for {}: {}", addr, e);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    log::error!("Accept error: {}", e);
                }
            }
        }

        log::info!("Relay shutting down, closing {} sessions", self.relay.hub().session_count());
        self.relay.hub().close_all();
        Ok(())
    }

    /// Run the accept loop on a background thread
    pub fn spawn(self) -> Result<RelayHandle> {
        let local_addr = self.local_addr()?;
        let running = Arc::clone(&self.running);
        let relay = self.relay();
        let thread = thread::Builder::new()
            .name("relay-accept".to_string())
            .spawn(move || self.run())?;

        Ok(RelayHandle {
            local_addr,
            running,
            relay,
            thread: Some(thread),
        })
    }
}

/// Handle to a relay running on a background thread
pub struct RelayHandle {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    relay: Arc<Relay>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl RelayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn hub(&self) -> &Arc<Hub> {
        self.relay.hub()
    }

    /// Stop accepting, close all sessions and wait for the accept loop
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Relaxed);
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| Error::Other("relay accept thread panicked".to_string()))?,
            None => Ok(()),
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Relay shutdown failed: {}", e);
        }
    }
}

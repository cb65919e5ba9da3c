//! Node agent: connects one node to the relay
//!
//! # State machine
//!
//! ```text
//! Disconnected --start--> Connected --threads up--> Streaming --stop / EOF--> Stopped
//! ```
//!
//! On connect the agent announces itself with `NODE_ADDED` and runs two
//! threads:
//!
//! - **sampler**: on every tick perturbs the sensors, sends one `SENSOR` line
//!   and, if the node has actuators, one `ACTUATOR` state line
//! - **reader**: applies `ACTUATOR` commands addressed to this node and
//!   reports the new states right away
//!
//! Either thread ending (peer closed, send failed, [`NodeAgent::stop`])
//! brings the other one down. Delivery is best effort.

use super::device::Node;
use super::noise::NoiseGenerator;
use crate::core::types::{ActuatorId, NodeId};
use crate::error::{Error, Result};
use crate::streaming::messages::Message;
use crate::streaming::session::{Session, SessionReader};
use crate::transport::Link;
use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use parking_lot::Mutex;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default sampling interval
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Lifecycle of a [`NodeAgent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Disconnected,
    Connected,
    Streaming,
    /// Terminal
    Stopped,
}

struct Simulated {
    node: Node,
    noise: NoiseGenerator,
}

struct Shared {
    node_id: NodeId,
    sim: Mutex<Simulated>,
    state: Mutex<AgentState>,
    session: Mutex<Option<Arc<Session>>>,
}

impl Shared {
    fn set_state(&self, next: AgentState) {
        let mut state = self.state.lock();
        if *state != AgentState::Stopped && *state != next {
            log::debug!("Node {}: {:?} -> {:?}", self.node_id, *state, next);
            *state = next;
        }
    }

    fn stop(&self) {
        *self.state.lock() = AgentState::Stopped;
        if let Some(session) = self.session.lock().as_ref() {
            session.close();
        }
    }
}

/// Connects a simulated node to the relay
pub struct NodeAgent {
    shared: Arc<Shared>,
    interval: Duration,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
    sampler: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl NodeAgent {
    pub fn new(node: Node, noise: NoiseGenerator, interval: Duration) -> Self {
        // One slot is enough: either side only needs to wake the sampler once
        let (stop_tx, stop_rx) = bounded(1);
        Self {
            shared: Arc::new(Shared {
                node_id: node.id(),
                sim: Mutex::new(Simulated { node, noise }),
                state: Mutex::new(AgentState::Disconnected),
                session: Mutex::new(None),
            }),
            interval,
            stop_tx,
            stop_rx,
            sampler: None,
            reader: None,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.shared.node_id
    }

    pub fn state(&self) -> AgentState {
        *self.shared.state.lock()
    }

    /// Current state of one of the node's actuators
    pub fn actuator_state(&self, id: ActuatorId) -> Option<bool> {
        self.shared.sim.lock().node.actuator(id).map(|a| a.is_on())
    }

    /// Connect to the relay and start streaming
    pub fn connect<A: ToSocketAddrs>(&mut self, addr: A) -> Result<()> {
        self.ensure_disconnected()?;
        let stream = TcpStream::connect(addr)?;
        self.start(stream)
    }

    /// Start streaming over an already connected socket
    pub fn start(&mut self, stream: TcpStream) -> Result<()> {
        self.ensure_disconnected()?;
        let (session, reader) = Session::new(stream)?;
        *self.shared.session.lock() = Some(Arc::clone(&session));
        self.shared.set_state(AgentState::Connected);
        log::info!("Node {} connected to {:?}", self.node_id(), session.peer());

        if let Err(e) = session.send(&Message::NodeAdded {
            node_id: self.node_id(),
        }) {
            self.shared.stop();
            return Err(e);
        }

        let spawned = match self.spawn_reader(Arc::clone(&session), reader) {
            Ok(()) => self.spawn_sampler(session),
            Err(e) => Err(e),
        };
        if let Err(e) = spawned {
            self.stop();
            return Err(e);
        }

        self.shared.set_state(AgentState::Streaming);
        Ok(())
    }

    /// Perturb the sensors and publish one sample now
    pub fn sample(&self) -> Result<()> {
        let session = self.shared.session.lock().clone().ok_or(Error::Closed)?;
        publish_sample(&self.shared, &session)
    }

    /// Stop streaming, close the connection and join both threads
    pub fn stop(&mut self) {
        if self.state() != AgentState::Stopped {
            log::info!("Node {} stopping", self.node_id());
        }
        self.shared.stop();
        let _ = self.stop_tx.try_send(());
        self.join_threads();
    }

    /// Block until the connection ends on its own
    pub fn wait(&mut self) {
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                log::error!("Node {}: reader thread panicked", self.node_id());
            }
        }
        self.join_threads();
    }

    fn ensure_disconnected(&self) -> Result<()> {
        match self.state() {
            AgentState::Disconnected => Ok(()),
            state => Err(Error::Other(format!(
                "node {} agent cannot start from {:?}",
                self.node_id(),
                state
            ))),
        }
    }

    fn spawn_reader(&mut self, session: Arc<Session>, reader: SessionReader) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let stop_tx = self.stop_tx.clone();
        let handle = thread::Builder::new()
            .name(format!("node-{}-reader", self.node_id()))
            .spawn(move || {
                let outcome = session.serve(reader, |msg| handle_inbound(&shared, &session, msg));
                if let Err(e) = outcome {
                    log::error!("Node {}: connection failed: {}", shared.node_id, e);
                }
                shared.stop();
                let _ = stop_tx.try_send(());
                log::info!("Node {} disconnected", shared.node_id);
            })?;
        self.reader = Some(handle);
        Ok(())
    }

    fn spawn_sampler(&mut self, session: Arc<Session>) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let stop_rx = self.stop_rx.clone();
        let interval = self.interval;
        let handle = thread::Builder::new()
            .name(format!("node-{}-sampler", self.node_id()))
            .spawn(move || run_sampler(&shared, &session, interval, &stop_rx))?;
        self.sampler = Some(handle);
        Ok(())
    }

    fn join_threads(&mut self) {
        for handle in [self.sampler.take(), self.reader.take()].into_iter().flatten() {
            if handle.join().is_err() {
                log::error!("Node {}: worker thread panicked", self.node_id());
            }
        }
    }
}

impl Drop for NodeAgent {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_sampler(shared: &Shared, session: &Session, interval: Duration, stop_rx: &Receiver<()>) {
    let ticker = tick(interval);

    loop {
        if let Err(e) = publish_sample(shared, session) {
            log::warn!("Node {}: stopping sampler: {}", shared.node_id, e);
            shared.stop();
            break;
        }

        select! {
            recv(ticker) -> _ => {}
            recv(stop_rx) -> _ => break,
        }
    }

    log::debug!("Node {}: sampler exited", shared.node_id);
}

fn publish_sample(shared: &Shared, session: &Session) -> Result<()> {
    let (sensors, actuators) = {
        let mut guard = shared.sim.lock();
        let Simulated { node, noise } = &mut *guard;
        (node.sample(noise), node.actuator_report())
    };

    for msg in sensors.iter().chain(actuators.iter()) {
        session.send(msg)?;
    }
    Ok(())
}

fn handle_inbound(shared: &Shared, session: &Session, msg: Message) {
    let Message::ActuatorUpdate { node_id, actuators } = msg else {
        log::trace!("Node {}: ignoring {} frame", shared.node_id, msg.tag());
        return;
    };
    if node_id != shared.node_id {
        log::trace!("Node {}: ignoring command for node {}", shared.node_id, node_id);
        return;
    }

    let report = {
        let mut sim = shared.sim.lock();
        if sim.node.apply_commands(&actuators) == 0 {
            return;
        }
        sim.node.actuator_report()
    };

    if let Some(report) = report {
        if let Err(e) = session.send(&report) {
            log::warn!("Node {}: cannot report actuator state: {}", shared.node_id, e);
        }
    }
}

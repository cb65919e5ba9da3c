//! Broadcast hub: the relay's registry of live sessions
//!
//! The hub owns the authoritative set of connected sessions and the mapping
//! from node id to the session that node is connected through. Every
//! mutation and every fan-out runs under one registry lock, so a broadcast
//! always iterates a consistent set and never writes to a session that has
//! already been deregistered.
//!
//! # Delivery Rules
//!
//! | Operation | Recipients | On send failure |
//! |-----------|------------|-----------------|
//! | [`Hub::broadcast`] | every session except the origin | session evicted, others still served |
//! | [`Hub::send_to`] | the session bound to the node | session evicted, reported as a miss |
//! | node bound | every session except the owner (`NODE_ADDED`) | session evicted |
//! | node unbound / owner evicted | every remaining session (`NODE_REMOVED`) | session evicted |
//!
//! Writes happen while the lock is held. A peer that stops reading will
//! eventually block its writer and stall the relay; there is no write
//! timeout.

use crate::core::types::NodeId;
use crate::error::Result;
use crate::streaming::messages::Message;
use crate::streaming::session::SessionId;
use crate::streaming::wire;
use crate::transport::Link;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of associating a node id with a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// Node was unknown and is now bound to the session
    Bound,
    /// Node was already bound to this same session
    AlreadyBound,
    /// Node is bound to another session, which keeps it
    Conflict(SessionId),
    /// Session is not registered
    UnknownSession,
}

#[derive(Default)]
struct Registry {
    sessions: BTreeMap<SessionId, Arc<dyn Link>>,
    nodes: BTreeMap<NodeId, SessionId>,
}

/// Thread-safe session registry with fan-out and directed delivery
#[derive(Default)]
pub struct Hub {
    registry: Mutex<Registry>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session
    ///
    /// The new session is immediately told about every node currently bound.
    /// Returns `false` (and changes nothing) if the id is already registered.
    /// Also returns `false` when that replay fails: the session is then
    /// closed and removed again before the lock is released.
    pub fn register(&self, id: SessionId, link: Arc<dyn Link>) -> bool {
        let mut reg = self.registry.lock();
        if reg.sessions.contains_key(&id) {
            log::debug!("Session {} already registered", id);
            return false;
        }

        let known: Vec<NodeId> = reg.nodes.keys().copied().collect();
        reg.sessions.insert(id, Arc::clone(&link));
        log::info!(
            "Session {} registered ({} sessions, {} nodes)",
            id,
            reg.sessions.len(),
            known.len()
        );

        for node_id in known {
            let line = node_event_line(&Message::NodeAdded { node_id });
            if let Err(e) = link.send_line(&line) {
                log::warn!("Session {}: failed to replay node {}: {}", id, node_id, e);
                Self::evict(&mut reg, vec![id]);
                return false;
            }
        }
        true
    }

    /// Remove and close a session
    ///
    /// Nodes bound to it are unbound and announced as removed. Safe to call
    /// repeatedly; returns `true` only when something was removed.
    pub fn deregister(&self, id: SessionId) -> bool {
        let mut reg = self.registry.lock();
        if !reg.sessions.contains_key(&id) {
            return false;
        }
        Self::evict(&mut reg, vec![id]);
        true
    }

    /// Close every session, e.g. on relay shutdown
    pub fn close_all(&self) {
        let mut reg = self.registry.lock();
        let ids: Vec<SessionId> = reg.sessions.keys().copied().collect();
        Self::evict(&mut reg, ids);
    }

    /// Encode `msg` once and send it to every session except `origin`
    ///
    /// Returns the number of sessions that accepted the frame.
    pub fn broadcast(&self, msg: &Message, origin: Option<SessionId>) -> Result<usize> {
        let line = wire::encode(msg)?;
        let mut reg = self.registry.lock();
        Ok(Self::fan_out(&mut reg, &line, origin))
    }

    /// Deliver `msg` to the session bound to `node_id`
    ///
    /// Returns `Ok(false)` when the node has no live session; the message is
    /// dropped, not queued.
    pub fn send_to(&self, node_id: NodeId, msg: &Message) -> Result<bool> {
        let line = wire::encode(msg)?;
        let mut reg = self.registry.lock();

        let target = reg
            .nodes
            .get(&node_id)
            .and_then(|sid| reg.sessions.get(sid).map(|link| (*sid, Arc::clone(link))));
        let Some((sid, link)) = target else {
            log::warn!("No session for node {}, dropping {}", node_id, line);
            return Ok(false);
        };

        match link.send_line(&line) {
            Ok(()) => {
                log::debug!("Routed to node {} via session {}: {}", node_id, sid, line);
                Ok(true)
            }
            Err(e) => {
                log::warn!("Node {} unreachable on session {}: {}", node_id, sid, e);
                Self::evict(&mut reg, vec![sid]);
                Ok(false)
            }
        }
    }

    /// Associate `node_id` with the session it is connected through
    ///
    /// The first claim wins. A new binding is announced to every other
    /// session with `NODE_ADDED`.
    pub fn bind_node(&self, node_id: NodeId, session: SessionId) -> BindOutcome {
        let mut reg = self.registry.lock();
        if !reg.sessions.contains_key(&session) {
            return BindOutcome::UnknownSession;
        }

        match reg.nodes.get(&node_id).copied() {
            Some(owner) if owner == session => BindOutcome::AlreadyBound,
            Some(owner) => {
                log::warn!(
                    "Session {} claims node {}, already bound to session {}",
                    session,
                    node_id,
                    owner
                );
                BindOutcome::Conflict(owner)
            }
            None => {
                reg.nodes.insert(node_id, session);
                log::info!("Node {} bound to session {}", node_id, session);
                let line = node_event_line(&Message::NodeAdded { node_id });
                Self::fan_out(&mut reg, &line, Some(session));
                BindOutcome::Bound
            }
        }
    }

    /// Explicitly retire a node; only its own session may do so
    pub fn unbind_node(&self, node_id: NodeId, session: SessionId) -> bool {
        let mut reg = self.registry.lock();
        if reg.nodes.get(&node_id) != Some(&session) {
            log::warn!(
                "Session {} tried to remove node {} it does not own",
                session,
                node_id
            );
            return false;
        }

        reg.nodes.remove(&node_id);
        log::info!("Node {} removed by session {}", node_id, session);
        let line = node_event_line(&Message::NodeRemoved { node_id });
        Self::fan_out(&mut reg, &line, Some(session));
        true
    }

    /// Session a node is bound to
    pub fn owner_of(&self, node_id: NodeId) -> Option<SessionId> {
        self.registry.lock().nodes.get(&node_id).copied()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.registry.lock().sessions.contains_key(&id)
    }

    pub fn session_count(&self) -> usize {
        self.registry.lock().sessions.len()
    }

    /// Ids of all bound nodes, ascending
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.registry.lock().nodes.keys().copied().collect()
    }

    fn fan_out(reg: &mut Registry, line: &str, origin: Option<SessionId>) -> usize {
        let mut delivered = 0;
        let mut failed = Vec::new();

        for (&id, link) in &reg.sessions {
            if Some(id) == origin {
                continue;
            }
            match link.send_line(line) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    log::warn!("Session {}: send failed, scheduling removal: {}", id, e);
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            Self::evict(reg, failed);
        }
        delivered
    }

    /// Remove sessions, close them and announce their orphaned nodes
    ///
    /// Announcing may fail on further sessions; those are evicted in turn.
    fn evict(reg: &mut Registry, ids: Vec<SessionId>) {
        let mut pending = ids;

        while let Some(id) = pending.pop() {
            let Some(link) = reg.sessions.remove(&id) else {
                continue;
            };
            link.close();

            let orphaned: Vec<NodeId> = reg
                .nodes
                .iter()
                .filter(|&(_, &owner)| owner == id)
                .map(|(&node_id, _)| node_id)
                .collect();

            for node_id in &orphaned {
                reg.nodes.remove(node_id);
                let line = node_event_line(&Message::NodeRemoved { node_id: *node_id });
                for (&other, link) in &reg.sessions {
                    if let Err(e) = link.send_line(&line) {
                        log::warn!("Session {}: send failed, scheduling removal: {}", other, e);
                        pending.push(other);
                    }
                }
            }

            log::info!(
                "Session {} deregistered (released nodes {:?}, {} sessions left)",
                id,
                orphaned,
                reg.sessions.len()
            );
        }
    }
}

/// `NODE_ADDED` / `NODE_REMOVED` frames carry only an integer and always encode
fn node_event_line(msg: &Message) -> String {
    format!("{}:{}", msg.tag(), msg.node_id())
}

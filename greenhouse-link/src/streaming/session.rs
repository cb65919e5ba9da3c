//! Connection session wrapping one TCP socket
//!
//! A [`Session`] is the shared, write side of a connection: any thread may
//! call [`Session::send`] and whole lines are written under one lock. The
//! read side is a separate [`SessionReader`] owned by exactly one thread,
//! which turns incoming lines into [`Message`]s.
//!
//! # Connection Lifecycle
//!
//! ```text
//! 1. Socket accepted (relay) or connected (node / control panel)
//! 2. Session::new splits it into Session + SessionReader
//! 3. Reader thread runs Session::serve until EOF or I/O error
//! 4. Session::close shuts the socket down (first call only)
//! 5. Owner deregisters the session from the hub
//! ```
//!
//! There is no read or write timeout. A half-open peer is noticed only when
//! a write fails or the OS reports a reset.

use crate::error::{Error, Result};
use crate::streaming::messages::Message;
use crate::streaming::wire;
use crate::transport::Link;
use parking_lot::Mutex;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Session identifier, unique within a process
pub type SessionId = u64;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh session id
pub fn next_session_id() -> SessionId {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Initial capacity for the line buffer (typical frame size)
const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Write side of one connection
pub struct Session {
    id: SessionId,
    peer: Option<SocketAddr>,
    writer: Mutex<TcpStream>,
    /// Handle used only for shutdown, so close never waits on the writer lock
    control: TcpStream,
    closed: AtomicBool,
}

/// Read side of one connection
pub struct SessionReader {
    session_id: SessionId,
    reader: BufReader<TcpStream>,
    buffer: Vec<u8>,
}

impl Session {
    /// Wrap an already connected stream
    pub fn new(stream: TcpStream) -> Result<(Arc<Session>, SessionReader)> {
        let id = next_session_id();
        let peer = stream.peer_addr().ok();
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("Session {}: failed to set TCP_NODELAY: {}", id, e);
        }

        let reader = SessionReader {
            session_id: id,
            reader: BufReader::new(stream.try_clone()?),
            buffer: Vec::with_capacity(INITIAL_BUFFER_CAPACITY),
        };
        let session = Session {
            id,
            peer,
            writer: Mutex::new(stream.try_clone()?),
            control: stream,
            closed: AtomicBool::new(false),
        };

        log::debug!("Session {} opened ({:?})", id, peer);
        Ok((Arc::new(session), reader))
    }

    /// Connect to a relay and wrap the connection
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<(Arc<Session>, SessionReader)> {
        let stream = TcpStream::connect(addr)?;
        Self::new(stream)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Encode and send one message
    pub fn send(&self, msg: &Message) -> Result<()> {
        let line = wire::encode(msg)?;
        self.send_line(&line)
    }

    /// Run the read loop until the peer goes away
    ///
    /// Every decoded message is handed to `on_message` in arrival order. The
    /// session is closed when the loop ends, whatever the reason. A peer
    /// closing or resetting the connection is a normal end and returns `Ok`.
    pub fn serve<F>(&self, mut reader: SessionReader, mut on_message: F) -> Result<()>
    where
        F: FnMut(Message),
    {
        let outcome = loop {
            match reader.next_message() {
                Ok(Some(msg)) => on_message(msg),
                Ok(None) => {
                    log::info!("Session {}: peer closed the connection", self.id);
                    break Ok(());
                }
                Err(_) if self.is_closed() => {
                    log::debug!("Session {}: read ended after local close", self.id);
                    break Ok(());
                }
                Err(Error::Io(e))
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset
                            | ErrorKind::ConnectionAborted
                            | ErrorKind::UnexpectedEof
                    ) =>
                {
                    log::info!("Session {}: connection lost: {}", self.id, e);
                    break Ok(());
                }
                Err(e) => {
                    log::error!("Session {}: read failed: {}", self.id, e);
                    break Err(e);
                }
            }
        };

        self.close();
        outcome
    }
}

impl Link for Session {
    fn send_line(&self, line: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let mut frame = String::with_capacity(line.len() + 1);
        frame.push_str(line);
        frame.push('\n');

        let mut writer = self.writer.lock();
        writer.write_all(frame.as_bytes())?;
        writer.flush()?;
        log::trace!("Session {} <- {}", self.id, line);
        Ok(())
    }

    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Err(e) = self.control.shutdown(Shutdown::Both) {
            // Already reset by the peer
            log::debug!("Session {}: shutdown: {}", self.id, e);
        }
        log::debug!("Session {} closed", self.id);
        true
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl SessionReader {
    /// Read until the next well-formed frame
    ///
    /// Blank lines, invalid UTF-8 and frames the codec rejects are logged and
    /// skipped. Returns `Ok(None)` at end of stream.
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            self.buffer.clear();
            let n = self.reader.read_until(b'\n', &mut self.buffer)?;
            if n == 0 {
                return Ok(None);
            }

            let line = match std::str::from_utf8(&self.buffer) {
                Ok(line) => line.trim_end_matches(['\r', '\n']),
                Err(e) => {
                    log::warn!("Session {}: dropping non UTF-8 line: {}", self.session_id, e);
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            log::trace!("Session {} -> {}", self.session_id, line);
            match wire::decode(line) {
                Ok(msg) => return Ok(Some(msg)),
                Err(e) => {
                    log::warn!("Session {}: dropping frame {:?}: {}", self.session_id, line, e);
                }
            }
        }
    }
}

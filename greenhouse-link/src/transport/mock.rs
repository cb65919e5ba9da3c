//! Mock link for testing

use super::Link;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-memory link recording every line it is asked to send
#[derive(Clone, Default)]
pub struct MockLink {
    inner: Arc<MockLinkInner>,
}

#[derive(Default)]
struct MockLinkInner {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
    fail_sends: AtomicBool,
    sends_after_close: AtomicUsize,
}

impl MockLink {
    /// Create a new mock link
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a link whose sends always fail, like a peer that reset
    pub fn failing() -> Self {
        let link = Self::new();
        link.set_failing(true);
        link
    }

    /// Make subsequent sends fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.inner.fail_sends.store(failing, Ordering::SeqCst);
    }

    /// Get all lines sent so far
    pub fn sent(&self) -> Vec<String> {
        self.inner.sent.lock().clone()
    }

    /// Clear recorded lines
    pub fn clear_sent(&self) {
        self.inner.sent.lock().clear();
    }

    /// Number of send attempts made after the link was closed
    pub fn sends_after_close(&self) -> usize {
        self.inner.sends_after_close.load(Ordering::SeqCst)
    }
}

impl Link for MockLink {
    fn send_line(&self, line: &str) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            self.inner.sends_after_close.fetch_add(1, Ordering::SeqCst);
            return Err(Error::Closed);
        }
        if self.inner.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "mock link reset",
            )));
        }
        self.inner.sent.lock().push(line.to_string());
        Ok(())
    }

    fn close(&self) -> bool {
        !self.inner.closed.swap(true, Ordering::SeqCst)
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

//! Transport layer for line-oriented peers

use crate::error::Result;

pub mod mock;
pub use mock::MockLink;

/// Outbound half of a connected peer, as seen by the hub
///
/// Implementations must serialize concurrent `send_line` calls so that
/// lines from different publishers never interleave.
pub trait Link: Send + Sync {
    /// Write one frame followed by the line terminator
    fn send_line(&self, line: &str) -> Result<()>;

    /// Release the underlying connection
    ///
    /// Returns `true` only for the call that actually closed it.
    fn close(&self) -> bool;

    /// Whether the link has been closed
    fn is_closed(&self) -> bool;
}

//! Line protocol, connection sessions and the relay hub

pub mod hub;
pub mod messages;
pub mod relay;
pub mod session;
pub mod wire;

pub use hub::{BindOutcome, Hub};
pub use messages::Message;
pub use relay::{Relay, RelayHandle, RelayServer};
pub use session::{Session, SessionId, SessionReader};

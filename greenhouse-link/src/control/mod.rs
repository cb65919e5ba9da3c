//! Headless control panel: node cache, observers and the relay channel

pub mod channel;
pub mod logic;

pub use channel::ControlChannel;
pub use logic::{CommunicationChannel, ControlLogic};

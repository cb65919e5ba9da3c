//! TCP channel between a control panel and the relay

use super::logic::{CommunicationChannel, ControlLogic};
use crate::error::Result;
use crate::streaming::session::Session;
use crate::transport::Link;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Connection feeding relayed events into a [`ControlLogic`]
///
/// A reader thread delivers every decoded message to
/// [`ControlLogic::handle_message`] and calls
/// [`ControlLogic::channel_closed`] once the relay goes away.
pub struct ControlChannel {
    session: Arc<Session>,
    reader: Option<JoinHandle<()>>,
}

impl ControlChannel {
    /// Connect to the relay and attach the channel to `logic`
    pub fn open<A: ToSocketAddrs>(addr: A, logic: Arc<ControlLogic>) -> Result<Self> {
        let (session, reader) = Session::connect(addr)?;
        log::info!("Control panel connected to {:?}", session.peer());
        logic.set_channel(Arc::clone(&session) as Arc<dyn CommunicationChannel>);

        let serving = Arc::clone(&session);
        let handle = thread::Builder::new()
            .name("control-reader".to_string())
            .spawn(move || {
                if let Err(e) = serving.serve(reader, |msg| logic.handle_message(msg)) {
                    log::error!("Control channel failed: {}", e);
                }
                logic.channel_closed();
            });

        match handle {
            Ok(handle) => Ok(Self {
                session,
                reader: Some(handle),
            }),
            Err(e) => {
                session.close();
                Err(e.into())
            }
        }
    }

    pub fn is_open(&self) -> bool {
        !self.session.is_closed()
    }

    /// Close the connection and wait for the reader thread
    pub fn close(&mut self) {
        self.session.close();
        self.wait();
    }

    /// Block until the relay closes the connection
    pub fn wait(&mut self) {
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                log::error!("Control reader thread panicked");
            }
        }
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        self.close();
    }
}

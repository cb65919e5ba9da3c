//! Shared setup: relay on an ephemeral port and raw line clients

use greenhouse_link::streaming::{RelayHandle, RelayServer};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

pub fn start_relay() -> RelayHandle {
    let _ = env_logger::builder().is_test(true).try_init();
    let running = Arc::new(AtomicBool::new(true));
    RelayServer::bind("127.0.0.1:0", running)
        .and_then(RelayServer::spawn)
        .expect("relay should start")
}

/// Poll `cond` until it holds or the timeout expires
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(5));
    }
}

/// Plain TCP peer speaking the line protocol by hand
pub struct LineClient {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl LineClient {
    pub fn connect(relay: &RelayHandle) -> Self {
        let writer = TcpStream::connect(relay.local_addr()).unwrap();
        writer.set_read_timeout(Some(TIMEOUT)).unwrap();
        let reader = BufReader::new(writer.try_clone().unwrap());
        Self { writer, reader }
    }

    pub fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).unwrap();
        self.writer.write_all(b"\n").unwrap();
    }

    pub fn recv(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        line.trim_end().to_string()
    }

    /// Whether the relay closed the connection (a reset counts as closed)
    pub fn at_eof(&mut self) -> bool {
        let mut line = String::new();
        matches!(self.reader.read_line(&mut line), Ok(0) | Err(_))
    }

    /// Assert nothing arrives within a short grace period
    pub fn expect_silence(&mut self) {
        self.writer
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => panic!("connection closed"),
            Ok(_) => panic!("unexpected line {:?}", line),
            Err(e) => assert!(matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            )),
        }
        self.writer.set_read_timeout(Some(TIMEOUT)).unwrap();
    }
}

//! In-process connection with scripted input.
//!
//! `MemoryConnection` replays queued inbound chunks, one chunk per read, and
//! records everything written to it. It is used by the crate's tests and is
//! handy for exercising application handlers without sockets.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::constants::ERR_CONNECTION_CLOSED;
use crate::transport::Connection;

#[derive(Debug, Default)]
struct State {
    inbound: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    read_failure: Option<io::ErrorKind>,
    write_failure: Option<io::ErrorKind>,
}

#[derive(Debug)]
pub struct MemoryConnection {
    state: Mutex<State>,
    reads: AtomicUsize,
    alive: AtomicBool,
    host: String,
    port: u16,
}

impl MemoryConnection {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            state: Mutex::new(State::default()),
            reads: AtomicUsize::new(0),
            alive: AtomicBool::new(true),
            host: host.into(),
            port,
        }
    }

    /// Queue bytes to be returned by a later read.
    pub fn push_inbound(&self, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut state) = self.lock() {
            state.inbound.push_back(bytes.into());
        }
    }

    /// Make the next read fail with `kind`.
    pub fn fail_next_read(&self, kind: io::ErrorKind) {
        if let Ok(mut state) = self.lock() {
            state.read_failure = Some(kind);
        }
    }

    /// Make every write fail with `kind`.
    pub fn fail_writes(&self, kind: io::ErrorKind) {
        if let Ok(mut state) = self.lock() {
            state.write_failure = Some(kind);
        }
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    /// Number of read calls made so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Acquire)
    }

    /// Buffers passed to successful writes, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().map(|s| s.written.clone()).unwrap_or_default()
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| io::Error::other("memory connection state poisoned"))
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::AcqRel);
        let mut state = self.lock()?;

        if let Some(kind) = state.read_failure.take() {
            return Err(io::Error::from(kind));
        }

        let Some(mut chunk) = state.inbound.pop_front() else {
            self.alive.store(false, Ordering::Release);
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                ERR_CONNECTION_CLOSED,
            ));
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            state.inbound.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    async fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock()?;
        if let Some(kind) = state.write_failure {
            return Err(io::Error::from(kind));
        }
        state.written.push(buf.to_vec());
        Ok(buf.len())
    }

    fn alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn remote_host(&self) -> String {
        self.host.clone()
    }

    fn remote_port(&self) -> u16 {
        self.port
    }
}

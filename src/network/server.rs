//! Mock gateway server
//!
//! Accepts connections and dispatches them to worker threads. Used to test
//! senders without talking to the real gateway.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use parking_lot::Mutex;
use rustls::{ServerConfig, ServerConnection, StreamOwned};

use super::{tls, Connection, Identity};
use crate::error::{ApnsError, Result};
use crate::protocol::{Notification, Status, MAX_LEGACY_PAYLOAD_SIZE};

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Rules deciding which notifications the mock gateway rejects
#[derive(Debug, Clone)]
pub struct GatewayRules {
    /// Reject tokens of any other length with InvalidTokenSize
    pub expected_token_len: Option<usize>,

    /// Payload ceiling for simple and enhanced notifications
    pub max_legacy_payload_size: usize,

    /// Payload ceiling for framed notifications
    pub max_framed_payload_size: usize,

    /// Tokens answered with InvalidToken
    pub rejected_tokens: HashSet<Vec<u8>>,
}

impl Default for GatewayRules {
    fn default() -> Self {
        Self {
            expected_token_len: None,
            max_legacy_payload_size: MAX_LEGACY_PAYLOAD_SIZE,
            max_framed_payload_size: 2048,
            rejected_tokens: HashSet::new(),
        }
    }
}

impl GatewayRules {
    pub fn expected_token_len(mut self, len: usize) -> Self {
        self.expected_token_len = Some(len);
        self
    }

    pub fn reject_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.rejected_tokens.insert(token.into());
        self
    }

    /// The status to answer with, or `None` to accept silently
    pub fn check(&self, notification: &Notification) -> Option<Status> {
        let token = notification.token();
        let payload = notification.payload();

        let max_payload = match notification {
            Notification::Framed(_) => self.max_framed_payload_size,
            _ => self.max_legacy_payload_size,
        };

        if token.is_empty() {
            Some(Status::MissingToken)
        } else if payload.is_empty() {
            Some(Status::MissingPayload)
        } else if payload.len() > max_payload {
            Some(Status::InvalidPayloadSize)
        } else if self.expected_token_len.is_some_and(|len| len != token.len()) {
            Some(Status::InvalidTokenSize)
        } else if self.rejected_tokens.contains(token) {
            Some(Status::InvalidToken)
        } else {
            None
        }
    }
}

/// Everything a worker needs to serve a client
#[derive(Clone)]
struct WorkerContext {
    rules: Arc<GatewayRules>,
    tls: Option<Arc<ServerConfig>>,
    received: Arc<Mutex<Vec<Notification>>>,
    idle_timeout: Option<Duration>,
}

/// Mock push gateway
pub struct MockGateway {
    listener: TcpListener,
    context: WorkerContext,
    workers: usize,
    shutdown: Arc<AtomicBool>,
}

impl MockGateway {
    /// Bind to `addr` (use port 0 for an ephemeral port)
    pub fn bind(addr: &str, rules: GatewayRules) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            context: WorkerContext {
                rules: Arc::new(rules),
                tls: None,
                received: Arc::new(Mutex::new(Vec::new())),
                idle_timeout: Some(Duration::from_secs(30)),
            },
            workers: 4,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Require TLS, presenting `identity` as the server certificate
    pub fn with_identity(mut self, identity: &Identity) -> Result<Self> {
        self.context.tls = Some(tls::server_config(identity)?);
        Ok(self)
    }

    /// Number of connections served concurrently
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Drop clients that stay silent this long. `None` waits forever.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.context.idle_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Start the server (blocking until [`GatewayHandle::shutdown`])
    pub fn run(&self) -> Result<()> {
        self.listener.set_nonblocking(true)?;

        let (sender, receiver) = channel::unbounded::<TcpStream>();
        for id in 0..self.workers {
            let receiver = receiver.clone();
            let context = self.context.clone();
            thread::Builder::new()
                .name(format!("gateway-worker-{}", id))
                .spawn(move || worker_loop(receiver, context))?;
        }

        tracing::info!(
            "Mock gateway listening on {} ({})",
            self.local_addr()?,
            if self.context.tls.is_some() { "tls" } else { "plain tcp" }
        );

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    tracing::debug!("Accepted connection from {}", peer);
                    stream.set_nonblocking(false)?;
                    sender
                        .send(stream)
                        .map_err(|_| ApnsError::Transport("worker pool is gone".to_string()))?;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!("Mock gateway stopped");
        Ok(())
    }

    /// Run on a background thread
    pub fn spawn(self) -> Result<GatewayHandle> {
        let addr = self.local_addr()?;
        let shutdown = Arc::clone(&self.shutdown);
        let received = Arc::clone(&self.context.received);
        let thread = thread::Builder::new()
            .name("gateway-acceptor".to_string())
            .spawn(move || self.run())?;

        Ok(GatewayHandle {
            addr,
            shutdown,
            received,
            thread: Some(thread),
        })
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Handle to a gateway running on a background thread
pub struct GatewayHandle {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    received: Arc<Mutex<Vec<Notification>>>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl GatewayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Snapshot of every notification read so far
    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }

    /// Stop accepting connections and wait for the acceptor to exit
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::Relaxed);
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| ApnsError::Transport("gateway acceptor panicked".to_string()))?,
            None => Ok(()),
        }
    }
}

impl Drop for GatewayHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::trace!("Gateway stopped with error: {}", e);
        }
    }
}

fn worker_loop(receiver: Receiver<TcpStream>, context: WorkerContext) {
    for stream in receiver.iter() {
        if let Err(e) = serve(stream, &context) {
            tracing::warn!("Client connection ended with error: {}", e);
        }
    }
}

fn serve(stream: TcpStream, context: &WorkerContext) -> Result<()> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    stream.set_read_timeout(context.idle_timeout)?;

    match &context.tls {
        None => Connection::new(
            stream,
            peer_addr,
            Arc::clone(&context.rules),
            Arc::clone(&context.received),
        )
        .handle(),
        Some(config) => {
            let conn = ServerConnection::new(Arc::clone(config))
                .map_err(|e| ApnsError::Transport(format!("TLS setup failed: {}", e)))?;
            let mut connection = Connection::new(
                StreamOwned::new(conn, stream),
                peer_addr,
                Arc::clone(&context.rules),
                Arc::clone(&context.received),
            );
            let result = connection.handle();
            let peer_addr = connection.peer_addr().to_string();

            // Let the client see a clean end of stream after the last record
            let mut tls = connection.into_inner();
            tls.conn.send_close_notify();
            if let Err(e) = tls.conn.complete_io(&mut tls.sock) {
                tracing::trace!("close_notify to {} not delivered: {}", peer_addr, e);
            }
            result
        }
    }
}

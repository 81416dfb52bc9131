//! Gateway transport
//!
//! Builds one authenticated, ordered byte stream per call.
//!
//! ## Connection steps
//! 1. Resolve the destination's host:port (override, else the gateway table)
//! 2. TCP connect
//! 3. Nagle's algorithm on/off per `coalesce_writes`
//! 4. No identity: return the plain TCP stream (mock servers only)
//! 5. Otherwise run the TLS handshake before returning
//!
//! ## Reading and writing concurrently
//! The gateway reports failures asynchronously, so a sender needs a reader
//! running alongside its writer. [`GatewayStream::split`] yields the two
//! halves. Plain TCP halves are socket clones. TLS halves share the session
//! behind a mutex; the reader holds it for at most [`TLS_READ_POLL`] at a
//! time so writes are never starved.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, StreamOwned};

use super::{tls, Identity};
use crate::config::{Config, Destination, GatewayTable};
use crate::error::{ApnsError, Result};

/// Longest time the TLS reader half holds the session per attempt
pub const TLS_READ_POLL: Duration = Duration::from_millis(20);

type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// A connected gateway stream
#[derive(Debug)]
pub enum GatewayStream {
    /// Unauthenticated TCP, for talking to mock servers
    Plain(TcpStream),

    /// TLS session presenting the provider certificate
    Tls(Box<TlsStream>),
}

impl GatewayStream {
    /// The underlying TCP socket
    pub fn tcp(&self) -> &TcpStream {
        match self {
            GatewayStream::Plain(sock) => sock,
            GatewayStream::Tls(tls) => &tls.sock,
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, GatewayStream::Tls(_))
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.tcp().peer_addr()?)
    }

    /// Bound blocking reads. `None` blocks forever.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.tcp().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Bound blocking writes. `None` blocks forever.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.tcp().set_write_timeout(timeout)?;
        Ok(())
    }

    /// Whether Nagle's algorithm is disabled
    pub fn nodelay(&self) -> Result<bool> {
        Ok(self.tcp().nodelay()?)
    }

    /// Close the socket. Unblocks a read or write in progress elsewhere.
    pub fn shutdown(&self) -> Result<()> {
        self.tcp().shutdown(Shutdown::Both)?;
        Ok(())
    }

    /// Split into a writer half and a reader half that can be driven from
    /// different threads.
    ///
    /// The reader keeps the stream's read timeout as its deadline.
    pub fn split(self) -> Result<(GatewayWriter, GatewayReader)> {
        let deadline = self.tcp().read_timeout()?;
        let control = self.tcp().try_clone()?;

        let (write_half, read_half) = match self {
            GatewayStream::Plain(sock) => {
                let reader = sock.try_clone()?;
                (Half::Plain(sock), Half::Plain(reader))
            }
            GatewayStream::Tls(tls) => {
                tls.sock.set_read_timeout(Some(TLS_READ_POLL))?;
                let shared = Arc::new(Mutex::new(*tls));
                (Half::Tls(Arc::clone(&shared)), Half::Tls(shared))
            }
        };

        let writer = GatewayWriter {
            half: write_half,
            control: control.try_clone()?,
        };
        let reader = GatewayReader {
            half: read_half,
            control,
            deadline,
        };
        Ok((writer, reader))
    }
}

impl Read for GatewayStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            GatewayStream::Plain(sock) => sock.read(buf),
            GatewayStream::Tls(tls) => tls.read(buf),
        }
    }
}

impl Write for GatewayStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            GatewayStream::Plain(sock) => sock.write(buf),
            GatewayStream::Tls(tls) => tls.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            GatewayStream::Plain(sock) => sock.flush(),
            GatewayStream::Tls(tls) => tls.flush(),
        }
    }
}

enum Half {
    Plain(TcpStream),
    Tls(Arc<Mutex<TlsStream>>),
}

/// Writing half of a split [`GatewayStream`]
pub struct GatewayWriter {
    half: Half,
    control: TcpStream,
}

impl GatewayWriter {
    /// Close the connection in both directions, waking the reader
    pub fn shutdown(&self) -> Result<()> {
        self.control.shutdown(Shutdown::Both)?;
        Ok(())
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.control.peer_addr()?)
    }
}

impl Write for GatewayWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.half {
            Half::Plain(sock) => sock.write(buf),
            Half::Tls(shared) => shared.lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.half {
            Half::Plain(sock) => sock.flush(),
            Half::Tls(shared) => shared.lock().flush(),
        }
    }
}

/// Reading half of a split [`GatewayStream`]
pub struct GatewayReader {
    half: Half,
    control: TcpStream,
    deadline: Option<Duration>,
}

impl GatewayReader {
    /// Close the connection in both directions
    pub fn shutdown(&self) -> Result<()> {
        self.control.shutdown(Shutdown::Both)?;
        Ok(())
    }
}

impl Read for GatewayReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let deadline = self.deadline;
        match &mut self.half {
            Half::Plain(sock) => sock.read(buf),
            Half::Tls(shared) => {
                let started = Instant::now();
                loop {
                    let mut stream = shared.lock();
                    match stream.read(buf) {
                        Err(e) if is_timeout(&e) => {
                            // Hand the session to a waiting writer before retrying
                            MutexGuard::unlock_fair(stream);
                            if deadline.is_some_and(|limit| started.elapsed() >= limit) {
                                return Err(e);
                            }
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

/// Opens connections to the push and feedback gateways
pub struct TransportFactory {
    config: Config,
    table: GatewayTable,
    tls: Option<Arc<ClientConfig>>,
}

impl TransportFactory {
    /// Create a factory. Without an identity every connection is plain TCP.
    pub fn new(config: Config, identity: Option<&Identity>) -> Result<Self> {
        let tls = identity
            .map(|identity| tls::client_config(identity, config.verify_peer))
            .transpose()?;

        Ok(Self {
            config,
            table: GatewayTable::default(),
            tls,
        })
    }

    /// Replace the built-in gateway addresses
    pub fn with_table(mut self, table: GatewayTable) -> Self {
        self.table = table;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The host:port a destination resolves to
    pub fn resolve(&self, destination: Destination) -> &str {
        self.config
            .address_override(destination)
            .unwrap_or_else(|| self.table.resolve(self.config.environment, destination))
    }

    /// Connect to the push gateway
    pub fn connect_push(&self) -> Result<GatewayStream> {
        self.connect(Destination::Push)
    }

    /// Connect to the feedback service
    pub fn connect_feedback(&self) -> Result<GatewayStream> {
        self.connect(Destination::Feedback)
    }

    pub fn connect(&self, destination: Destination) -> Result<GatewayStream> {
        let addr = self.resolve(destination).to_string();
        tracing::debug!(
            "Connecting to {} gateway ({}) at {}",
            destination,
            self.config.environment,
            addr
        );
        self.connect_addr(&addr)
    }

    /// Connect to an explicit host:port
    pub fn connect_addr(&self, addr: &str) -> Result<GatewayStream> {
        let sock = self.open_tcp(addr)?;

        let Some(tls_config) = &self.tls else {
            tracing::debug!("No identity configured, using plain TCP to {}", addr);
            return Ok(GatewayStream::Plain(sock));
        };

        let server_name = ServerName::try_from(host_of(addr).to_string())
            .map_err(|e| ApnsError::Transport(format!("Invalid server name in {}: {}", addr, e)))?;
        let conn = ClientConnection::new(Arc::clone(tls_config), server_name)
            .map_err(|e| ApnsError::Transport(format!("TLS setup failed for {}: {}", addr, e)))?;

        let mut stream = StreamOwned::new(conn, sock);
        handshake(&mut stream)
            .map_err(|e| ApnsError::Transport(format!("TLS handshake with {} failed: {}", addr, e)))?;

        tracing::debug!(
            "TLS session established with {} ({:?})",
            addr,
            stream.conn.protocol_version()
        );
        Ok(GatewayStream::Tls(Box::new(stream)))
    }

    fn open_tcp(&self, addr: &str) -> Result<TcpStream> {
        let candidates: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|e| ApnsError::Transport(format!("Failed to resolve {}: {}", addr, e)))?
            .collect();

        if candidates.is_empty() {
            return Err(ApnsError::Transport(format!("No addresses found for {}", addr)));
        }

        let mut last_error = None;
        let mut connected = None;
        for candidate in &candidates {
            let attempt = match millis(self.config.connect_timeout_ms) {
                Some(timeout) => TcpStream::connect_timeout(candidate, timeout),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(sock) => {
                    connected = Some(sock);
                    break;
                }
                Err(e) => {
                    tracing::trace!("Connect to {} failed: {}", candidate, e);
                    last_error = Some(e);
                }
            }
        }

        let sock = connected.ok_or_else(|| {
            ApnsError::Transport(format!(
                "Failed to connect to {}: {}",
                addr,
                last_error.map(|e| e.to_string()).unwrap_or_default()
            ))
        })?;

        sock.set_nodelay(!self.config.coalesce_writes)
            .map_err(|e| ApnsError::Transport(format!("Failed to configure socket: {}", e)))?;
        sock.set_read_timeout(millis(self.config.read_timeout_ms))?;
        sock.set_write_timeout(millis(self.config.write_timeout_ms))?;

        Ok(sock)
    }
}

/// Drive the handshake to completion, including the final flight
fn handshake(stream: &mut TlsStream) -> io::Result<()> {
    while stream.conn.is_handshaking() {
        stream.conn.complete_io(&mut stream.sock)?;
    }
    while stream.conn.wants_write() {
        stream.conn.write_tls(&mut stream.sock)?;
    }
    Ok(())
}

/// Host part of a host:port string, without IPv6 brackets
fn host_of(addr: &str) -> &str {
    let host = addr.rsplit_once(':').map(|(host, _)| host).unwrap_or(addr);
    host.trim_start_matches('[').trim_end_matches(']')
}

/// Unix reports an expired read timeout as WouldBlock, Windows as TimedOut
fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

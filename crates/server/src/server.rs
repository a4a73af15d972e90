//! The line-streaming server and its stop handle.

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::producer::LineProducer;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, error, info, info_span, warn, Instrument};

const DELIMITERS: &[char] = &['\n', '\r'];

/// Lifecycle state of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Bound and waiting for the single client.
    Listening,
    /// Streaming lines to the connected client.
    Connected,
    /// Terminal. The listening socket is closed.
    Stopped,
}

/// How a call to [`LineStreamingServer::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Stopped before any client connected.
    StoppedBeforeConnect,
    /// Stopped while a client was connected.
    Stopped,
    /// The client went away (a write failed).
    ClientDisconnected,
    /// Accepting the client failed for a reason other than a stop.
    AcceptFailed,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of lines fully written to the client.
    pub lines_sent: u64,
    /// Why the run ended.
    pub outcome: SessionOutcome,
}

/// State shared between the server and its stop handles.
#[derive(Debug)]
struct Shared {
    port: u16,
    stopped: AtomicBool,
    wakeup: Notify,
    /// Present until `run` takes it, or until a stop closes it first.
    listener: Mutex<Option<TcpListener>>,
    state: Mutex<ServerState>,
}

impl Shared {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Resolves once the stop flag is set.
    async fn wait_stopped(&self) {
        let notified = self.wakeup.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent stop cannot slip between.
        notified.as_mut().enable();
        if self.is_stopped() {
            return;
        }
        notified.await;
    }

    fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            debug!(port = self.port, "Server already stopped");
            return;
        }
        self.wakeup.notify_waiters();

        // Dropping the listener closes it. If `run` already owns it, the wakeup
        // above makes `run` drop it instead.
        if let Some(listener) = self.listener.lock().take() {
            drop(listener);
        }
        *self.state.lock() = ServerState::Stopped;

        info!(port = self.port, "Server stopped");
    }
}

/// A cloneable handle used to stop a [`LineStreamingServer`] from any task or
/// thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    /// Stop the server.
    ///
    /// Sets the stop flag and closes the listening socket, which also aborts a
    /// pending accept. If a client is connected, the send loop ends before its
    /// next line, or abandons a write blocked on a client that stopped reading. Calling this more than once has no further effect. Never
    /// fails.
    pub fn stop(&self) {
        self.shared.shutdown();
    }

    /// Whether [`stop`](Self::stop) was called or the run loop has ended.
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.shared.state.lock()
    }

    /// The port the server is bound to.
    pub fn port(&self) -> u16 {
        self.shared.port
    }
}

/// A TCP server that streams generated lines to a single client.
///
/// # Lifecycle
///
/// ```text
/// bind ──> Listening ──accept──> Connected ──> Stopped
///              │                                 ^
///              └───────────── stop ──────────────┘
/// ```
///
/// [`run`](Self::run) consumes the server, so a server runs at most once and
/// never restarts.
///
/// # Example
///
/// ```ignore
/// use linestream_server::{LineStreamingServer, ServerConfig};
///
/// let server = LineStreamingServer::bind(ServerConfig::new(9999, 500), || "tick".to_string()).await?;
/// let handle = server.stop_handle();
/// let task = tokio::spawn(server.run());
///
/// // Later, from anywhere
/// handle.stop();
/// let summary = task.await?;
/// ```
pub struct LineStreamingServer<P> {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    delay: Duration,
    producer: P,
}

impl<P: LineProducer> LineStreamingServer<P> {
    /// Bind the listening socket.
    ///
    /// This is the only fallible operation: it fails with
    /// [`ServerError::Bind`] when the address cannot be bound.
    pub async fn bind(config: ServerConfig, producer: P) -> Result<Self> {
        let address = config.address();
        let bind_error = |source: std::io::Error| ServerError::Bind {
            address: address.clone(),
            source,
        };

        let listener = TcpListener::bind(&address).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        info!(
            address = %local_addr,
            delay_ms = config.delay_ms,
            "Server started"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                port: local_addr.port(),
                stopped: AtomicBool::new(false),
                wakeup: Notify::new(),
                listener: Mutex::new(Some(listener)),
                state: Mutex::new(ServerState::Listening),
            }),
            local_addr,
            delay: config.delay(),
            producer,
        })
    }

    /// The address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get a handle that can stop this server.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: self.shared.clone(),
        }
    }

    /// Accept one client and stream lines to it until stopped or disconnected.
    ///
    /// Runtime failures are logged and end the session; this never returns an
    /// error. Both the client connection and the listening socket are closed
    /// when it returns.
    pub async fn run(mut self) -> RunSummary {
        let span = info_span!("server", port = self.shared.port);
        let summary = self.serve().instrument(span).await;

        // Ending the session stops the server. The state is forced because an
        // accept can complete after a concurrent stop already set it.
        self.shared.shutdown();
        *self.shared.state.lock() = ServerState::Stopped;

        info!(
            port = self.shared.port,
            lines_sent = summary.lines_sent,
            outcome = ?summary.outcome,
            "Session closed"
        );
        summary
    }

    async fn serve(&mut self) -> RunSummary {
        let Some(listener) = self.shared.listener.lock().take() else {
            debug!("Stopped before run");
            return RunSummary {
                lines_sent: 0,
                outcome: SessionOutcome::StoppedBeforeConnect,
            };
        };

        info!("Waiting for client");

        let accepted = tokio::select! {
            biased;
            _ = self.shared.wait_stopped() => None,
            result = listener.accept() => Some(result),
        };

        let (stream, peer) = match accepted {
            None => {
                info!("Stopped while waiting for client");
                return RunSummary {
                    lines_sent: 0,
                    outcome: SessionOutcome::StoppedBeforeConnect,
                };
            }
            Some(Err(e)) => {
                error!(error = %ServerError::Accept(e), "Error while accepting client");
                return RunSummary {
                    lines_sent: 0,
                    outcome: SessionOutcome::AcceptFailed,
                };
            }
            Some(Ok(accepted)) => accepted,
        };

        info!(peer = %peer, "Client connected");
        {
            let mut state = self.shared.state.lock();
            if *state == ServerState::Listening {
                *state = ServerState::Connected;
            }
        }

        let summary = self.stream_lines(stream, peer).await;
        drop(listener);
        summary
    }

    async fn stream_lines(&mut self, mut stream: TcpStream, peer: SocketAddr) -> RunSummary {
        let mut lines_sent = 0u64;

        let outcome = loop {
            if self.shared.is_stopped() {
                break SessionOutcome::Stopped;
            }

            let line = sanitize_line(self.producer.build_line());
            info!(line = %line, "Sending line");

            let mut data = line.into_bytes();
            data.push(b'\n');
            // A stalled client can block the write once the send buffer is full.
            let written = tokio::select! {
                biased;
                _ = self.shared.wait_stopped() => break SessionOutcome::Stopped,
                result = stream.write_all(&data) => result,
            };
            if let Err(e) = written {
                warn!(peer = %peer, error = %ServerError::Write(e), "Client connection lost");
                break SessionOutcome::ClientDisconnected;
            }
            lines_sent += 1;

            tokio::select! {
                biased;
                _ = self.shared.wait_stopped() => break SessionOutcome::Stopped,
                _ = tokio::time::sleep(self.delay) => {}
            }
        };

        if let Err(e) = stream.shutdown().await {
            debug!(peer = %peer, error = %e, "Error while closing client connection");
        }

        RunSummary {
            lines_sent,
            outcome,
        }
    }
}

impl<P> Drop for LineStreamingServer<P> {
    fn drop(&mut self) {
        // Close the listener of a server that never ran.
        self.shared.listener.lock().take();
    }
}

/// Replace embedded delimiters so one produced line stays one wire line.
fn sanitize_line(line: String) -> String {
    if !line.contains(DELIMITERS) {
        return line;
    }
    warn!("Line producer returned an embedded delimiter, replacing it with spaces");
    line.replace(DELIMITERS, " ")
}

//! TCP Server
//!
//! Accepts connections and runs each on its own thread.

use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::RecvTimeoutError;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use crate::protocol::{write_response, Response};

use super::Connection;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// How often the supervisor rechecks the shutdown flag
const SUPERVISOR_POLL: Duration = Duration::from_millis(100);

/// TCP server for kvlog
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// Bind to the configured listen address
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until shutdown is requested (blocking)
    pub fn run(&self) -> Result<()> {
        tracing::info!("Listening on {}", self.local_addr()?);
        let supervisor = self.spawn_supervisor()?;

        while !self.shutdown.load(Ordering::Acquire) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = self.dispatch(stream) {
                        tracing::warn!("Failed to start connection from {}: {}", addr, e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => tracing::warn!("Accept failed: {}", e),
            }
        }

        let _ = supervisor.join();
        tracing::info!("Server stopped accepting connections");
        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Flag that stops the server when set, for use from another thread
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    fn dispatch(&self, stream: TcpStream) -> Result<()> {
        stream.set_nonblocking(false)?;

        if self.active_connections.load(Ordering::Acquire) >= self.config.max_connections {
            tracing::warn!("Connection limit ({}) reached", self.config.max_connections);
            let mut stream = stream;
            write_response(&mut stream, &Response::error("too many connections"))?;
            return Ok(());
        }

        let mut connection = Connection::new(stream, Arc::clone(&self.engine))?;
        connection.set_timeouts(self.config.read_timeout_ms, self.config.write_timeout_ms)?;

        let active = Arc::clone(&self.active_connections);
        active.fetch_add(1, Ordering::AcqRel);

        let spawned = thread::Builder::new()
            .name("kvlog-conn".to_string())
            .spawn(move || {
                if let Err(e) = connection.handle() {
                    tracing::debug!("Connection {} closed with error: {}", connection.peer_addr(), e);
                }
                active.fetch_sub(1, Ordering::AcqRel);
            });

        if let Err(e) = spawned {
            self.active_connections.fetch_sub(1, Ordering::AcqRel);
            return Err(e.into());
        }
        Ok(())
    }

    /// Watch the logger's error channel; once it reports, writes are refused
    fn spawn_supervisor(&self) -> io::Result<JoinHandle<()>> {
        let errors = self.engine.errors();
        let shutdown = Arc::clone(&self.shutdown);

        thread::Builder::new()
            .name("kvlog-supervisor".to_string())
            .spawn(move || {
                while !shutdown.load(Ordering::Acquire) {
                    match errors.recv_timeout(SUPERVISOR_POLL) {
                        Ok(err) => {
                            tracing::error!("Transaction log halted, refusing writes: {}", err)
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
            })
    }
}

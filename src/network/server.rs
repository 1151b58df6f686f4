//! TCP Server
//!
//! Accepts connections and hands each one to its own thread.

use std::io::{BufWriter, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::select;

use crate::config::NetworkConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::protocol::{write_response, Response};
use crate::shutdown::Shutdown;

use super::{Connection, ConnectionLimiter};

/// How often a blocked accept loop looks at the shutdown token
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accept connections until `shutdown` fires
///
/// The listener is switched to non-blocking mode; accepted streams are
/// handed to `on_connection` in blocking mode.
pub fn accept_loop<F>(listener: &TcpListener, shutdown: &Shutdown, mut on_connection: F) -> Result<()>
where
    F: FnMut(TcpStream, SocketAddr),
{
    listener.set_nonblocking(true)?;

    loop {
        if shutdown.is_triggered() {
            return Ok(());
        }

        match listener.accept() {
            Ok((stream, addr)) => {
                stream.set_nonblocking(false)?;
                on_connection(stream, addr);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                select! {
                    recv(shutdown.signal()) -> _ => return Ok(()),
                    default(ACCEPT_POLL_INTERVAL) => {}
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "can't accept connection");
            }
        }
    }
}

/// TCP server for TideKV client queries
pub struct Server {
    config: NetworkConfig,
    engine: Arc<Engine>,
    listener: TcpListener,
    limiter: ConnectionLimiter,
    shutdown: Shutdown,
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: NetworkConfig, engine: Arc<Engine>, shutdown: Shutdown) -> Result<Self> {
        let listener = TcpListener::bind(&config.address)?;
        let limiter = ConnectionLimiter::new(config.max_connections);

        tracing::info!(address = %listener.local_addr()?, "listening for clients");

        Ok(Self {
            config,
            engine,
            listener,
            limiter,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until shutdown (blocking), then wait for open connections
    pub fn run(&self) -> Result<()> {
        let mut workers: Vec<JoinHandle<()>> = Vec::new();

        accept_loop(&self.listener, &self.shutdown, |stream, addr| {
            workers.retain(|w| !w.is_finished());

            let Some(permit) = self.limiter.try_acquire() else {
                tracing::warn!(peer = %addr, "connection limit reached, rejecting");
                reject(stream);
                return;
            };

            let engine = Arc::clone(&self.engine);
            let config = self.config.clone();
            let shutdown = self.shutdown.clone();

            let spawned = thread::Builder::new()
                .name(format!("conn-{}", addr))
                .spawn(move || {
                    let _permit = permit;
                    match Connection::new(stream, engine, &config, shutdown) {
                        Ok(mut conn) => {
                            if let Err(e) = conn.handle() {
                                tracing::warn!(peer = %addr, error = %e, "connection failed");
                            }
                        }
                        Err(e) => tracing::warn!(peer = %addr, error = %e, "can't set up connection"),
                    }
                });

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => tracing::error!(error = %e, "can't spawn connection thread"),
            }
        })?;

        tracing::info!(open = workers.len(), "server stopping, draining connections");
        for worker in workers {
            let _ = worker.join();
        }
        Ok(())
    }
}

fn reject(stream: TcpStream) {
    let mut writer = BufWriter::new(stream);
    let _ = write_response(&mut writer, &Response::error("too many connections"));
    let _ = writer.flush();
}

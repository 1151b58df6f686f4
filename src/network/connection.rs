//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::NetworkConfig;
use crate::engine::Engine;
use crate::error::{Result, TideError};
use crate::protocol::{decode_command, write_response, Command, Response};
use crate::shutdown::Shutdown;

/// Read timeout slice; between slices the connection checks for shutdown
const READ_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the storage engine
    engine: Arc<Engine>,

    /// Peer address for logging
    peer_addr: String,

    max_message_size: usize,
    idle_timeout: Duration,
    shutdown: Shutdown,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and configures timeouts
    pub fn new(stream: TcpStream, engine: Arc<Engine>, config: &NetworkConfig, shutdown: Shutdown) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(READ_POLL_INTERVAL))?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            engine,
            peer_addr,
            max_message_size: config.max_message_size,
            idle_timeout: config.idle_timeout,
            shutdown,
        })
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads queries in a loop and sends responses. Returns when the client
    /// disconnects, goes idle for too long, or the server shuts down.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let line = match self.read_line()? {
                Some(line) => line,
                None => return Ok(()),
            };

            let response = match decode_command(&line) {
                Ok(command) => {
                    tracing::trace!("Received command from {}: {:?}", self.peer_addr, command);
                    self.execute_command(command)
                }
                Err(e) => Response::from_outcome(Err(e)),
            };

            if let Err(e) = self.send_response(response) {
                if let TideError::Io(ref io_err) = e {
                    match io_err.kind() {
                        ErrorKind::ConnectionAborted
                        | ErrorKind::ConnectionReset
                        | ErrorKind::BrokenPipe => {
                            tracing::debug!(
                                "Client {} disconnected before response could be sent: {}",
                                self.peer_addr, e
                            );
                            return Ok(());
                        }
                        _ => {}
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Read the next query line
    ///
    /// `None` means the connection should close quietly.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf: Vec<u8> = Vec::new();
        let started = Instant::now();

        loop {
            // Allow one byte past the limit so oversized lines are detectable.
            let remaining = (self.max_message_size + 1).saturating_sub(buf.len()) as u64;
            let read = self.reader.by_ref().take(remaining).read_until(b'\n', &mut buf);
            match read {
                Ok(0) if buf.is_empty() => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(None);
                }
                Ok(_) if buf.ends_with(b"\n") => break,
                Ok(_) if buf.len() > self.max_message_size => {
                    tracing::warn!("Query from {} exceeds {} bytes", self.peer_addr, self.max_message_size);
                    let _ = self.send_response(Response::error("message too large"));
                    return Ok(None);
                }
                Ok(_) => {
                    // EOF in the middle of a line
                    tracing::debug!("Client {} disconnected mid-query", self.peer_addr);
                    return Ok(None);
                }
                Err(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    if self.shutdown.is_triggered() {
                        return Ok(None);
                    }
                    if buf.is_empty() && started.elapsed() >= self.idle_timeout {
                        tracing::debug!("Closing idle connection {}", self.peer_addr);
                        return Ok(None);
                    }
                }
                Err(ref e) if matches!(e.kind(), ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted) => {
                    tracing::debug!("Connection reset by client {}", self.peer_addr);
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }

        String::from_utf8(buf)
            .map(Some)
            .map_err(|_| TideError::Protocol("query is not valid UTF-8".to_string()))
    }

    fn execute_command(&self, command: Command) -> Response {
        Response::from_outcome(self.engine.execute(command))
    }

    /// Send a response to the client
    fn send_response(&mut self, response: Response) -> Result<()> {
        write_response(&mut self.writer, &response)
    }
}

//! Replication master
//!
//! Answers "segment after X" requests from slaves with whole sealed segments.

use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crate::error::{Result, TideError};
use crate::network::{accept_loop, ConnectionLimiter};
use crate::shutdown::Shutdown;
use crate::wal::segment::next_segment;
use crate::wal::ActiveSegment;

use super::message::{read_frame, write_frame, SegmentRequest, SegmentResponse};

/// Replicas served at once
const MAX_REPLICA_CONNECTIONS: usize = 5;

/// Requests are tiny; anything larger is garbage
const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Serves WAL segments to slaves
pub struct Master {
    directory: PathBuf,
    active: ActiveSegment,
    listener: TcpListener,
}

impl Master {
    /// Bind the replication listener
    pub fn bind(address: &str, directory: &Path, active: ActiveSegment) -> Result<Self> {
        let listener = TcpListener::bind(address)?;
        tracing::info!(address = %listener.local_addr()?, "replication master listening");

        Ok(Self {
            directory: directory.to_path_buf(),
            active,
            listener,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept replicas until `shutdown` fires (blocking)
    pub fn start(self, shutdown: &Shutdown) -> Result<()> {
        let limiter = ConnectionLimiter::new(MAX_REPLICA_CONNECTIONS);
        let this = Arc::new(self);

        accept_loop(&this.listener, shutdown, |stream, addr| {
            let Some(permit) = limiter.try_acquire() else {
                tracing::warn!(replica = %addr, "too many replicas, rejecting");
                return;
            };

            let master = Arc::clone(&this);
            let spawned = thread::Builder::new()
                .name(format!("replica-{}", addr))
                .spawn(move || {
                    let _permit = permit;
                    if let Err(e) = master.serve(stream) {
                        tracing::warn!(replica = %addr, error = %e, "replica connection failed");
                    }
                });
            if let Err(e) = spawned {
                tracing::error!(error = %e, "can't spawn replica thread");
            }
        })?;

        tracing::debug!("replication master stopped");
        Ok(())
    }

    /// One replica connection: request in, response out, until EOF
    fn serve(&self, stream: TcpStream) -> Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = BufWriter::new(stream);

        loop {
            let request: SegmentRequest = match read_frame(&mut reader, MAX_REQUEST_SIZE) {
                Ok(request) => request,
                Err(TideError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e),
            };

            tracing::debug!(last_name = %request.last_name, "replication request");
            let response = self.handle_request(&request);
            write_frame(&mut writer, &response)?;
        }
    }

    /// Resolve the segment that follows the slave's cursor
    ///
    /// The segment still open for writing is never shipped: it is still
    /// growing and the slave would never see its tail.
    pub fn handle_request(&self, request: &SegmentRequest) -> SegmentResponse {
        let last_name = request.last_name.as_str();

        let segment = match next_segment(&self.directory, last_name) {
            Ok(segment) => segment,
            Err(e) => {
                tracing::error!(error = %e, "failed to get next segment");
                return SegmentResponse::unchanged(last_name);
            }
        };

        if segment.is_empty() || segment == last_name || self.active.is_active(&segment) {
            return SegmentResponse::unchanged(last_name);
        }

        match fs::read(self.directory.join(&segment)) {
            Ok(data) => SegmentResponse {
                name: segment,
                data: Some(data),
            },
            Err(e) => {
                tracing::error!(segment = %segment, error = %e, "failed to read segment");
                SegmentResponse::unchanged(last_name)
            }
        }
    }
}

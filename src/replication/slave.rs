//! Replication slave
//!
//! Polls the master for the segment after its cursor, stores it locally and
//! forwards its batches to the engine.

use std::fs::{self, OpenOptions};
use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam::channel::{tick, Sender};
use crossbeam::select;

use crate::config::ReplicationConfig;
use crate::error::{Result, TideError};
use crate::shutdown::Shutdown;
use crate::wal::segment::last_segment;
use crate::wal::{decode_batches, Entry};

use super::message::{read_frame, write_frame, SegmentRequest, SegmentResponse};

/// Bound on connect and on each socket read/write
const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Pulls WAL segments from the master
pub struct Slave {
    master_address: String,
    sync_interval: Duration,
    max_message_size: usize,
    directory: PathBuf,
    last_segment: String,
    stream: Sender<Vec<Entry>>,
    connection: Option<TcpStream>,
}

impl Slave {
    /// The cursor starts at the newest segment already on disk
    pub fn new(config: &ReplicationConfig, directory: &Path, stream: Sender<Vec<Entry>>) -> Result<Self> {
        fs::create_dir_all(directory)?;
        let last_segment = last_segment(directory)?;

        Ok(Self {
            master_address: config.master_address.clone(),
            sync_interval: config.sync_interval,
            max_message_size: config.max_message_size,
            directory: directory.to_path_buf(),
            last_segment,
            stream,
            connection: None,
        })
    }

    /// Sync on every interval tick until `shutdown` fires (blocking)
    pub fn start(mut self, shutdown: &Shutdown) {
        let ticker = tick(self.sync_interval);

        loop {
            select! {
                recv(ticker) -> _ => {
                    if let Err(e) = self.sync() {
                        tracing::error!(
                            master = %self.master_address,
                            cursor = %self.last_segment,
                            error = %e,
                            "replication sync failed"
                        );
                        // Reconnect next round; the stream may be mid-frame.
                        self.connection = None;
                    }
                }
                recv(shutdown.signal()) -> _ => {
                    tracing::debug!("replication slave stopped");
                    return;
                }
            }
        }
    }

    /// One request/response round
    ///
    /// The cursor only advances after the segment is stored and its batches
    /// are handed to the engine.
    pub fn sync(&mut self) -> Result<()> {
        let request = SegmentRequest {
            last_name: self.last_segment.clone(),
        };
        tracing::trace!(last_name = %request.last_name, "replication request");

        let response = self.send(&request)?;

        let Some(data) = response.data else {
            return Ok(());
        };

        if response.name.is_empty() || response.name.contains(['/', '\\']) {
            return Err(TideError::Replication(format!(
                "master sent an invalid segment name {:?}",
                response.name
            )));
        }

        // Validate before anything touches the disk: a stored segment must
        // replay cleanly on the next start.
        let batches = decode_batches(&data)?;
        for entry in batches.iter().flatten() {
            entry.operation()?;
        }

        self.save_segment(&response.name, &data)?;
        for batch in batches {
            self.stream
                .send(batch)
                .map_err(|_| TideError::Replication("engine stopped consuming".to_string()))?;
        }

        tracing::debug!(segment = %response.name, bytes = data.len(), "replicated segment");
        self.last_segment = response.name;
        Ok(())
    }

    /// Name of the last segment fully received
    pub fn last_segment(&self) -> &str {
        &self.last_segment
    }

    fn send(&mut self, request: &SegmentRequest) -> Result<SegmentResponse> {
        if self.connection.is_none() {
            self.connection = Some(self.connect()?);
        }
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| TideError::Replication("not connected".to_string()))?;

        write_frame(connection, request)?;
        let mut reader = BufReader::new(&*connection);
        read_frame(&mut reader, self.max_message_size)
    }

    fn connect(&self) -> Result<TcpStream> {
        let addr = self
            .master_address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                TideError::Replication(format!("can't resolve {}", self.master_address))
            })?;

        let stream = TcpStream::connect_timeout(&addr, IO_TIMEOUT)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        stream.set_nodelay(true)?;

        tracing::info!(master = %self.master_address, "connected to replication master");
        Ok(stream)
    }

    fn save_segment(&self, name: &str, data: &[u8]) -> Result<()> {
        let mut segment = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.directory.join(name))?;

        segment.write_all(data)?;
        segment.sync_all()?;
        Ok(())
    }
}

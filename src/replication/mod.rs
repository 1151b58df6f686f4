//! Replication Module
//!
//! Asynchronous log-shipping: a master serves sealed WAL segments, slaves
//! poll for the segment after the last one they hold and replay it.
//!
//! ## Flow
//! ```text
//!   slave                                  master
//!     │ ── SegmentRequest{last_name} ──────▶ │  next_segment(dir, last_name)
//!     │ ◀───── SegmentResponse{name, data} ── │
//!     │  append dir/name, fsync
//!     │  batches ──▶ engine apply thread
//! ```

pub mod message;

mod master;
mod slave;

use std::fs;
use std::io;
use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam::channel::Sender;

use crate::config::{ReplicaRole, ReplicationConfig};
use crate::error::Result;
use crate::shutdown::Shutdown;
use crate::wal::{ActiveSegment, Entry};

pub use master::Master;
pub use message::{SegmentRequest, SegmentResponse};
pub use slave::Slave;

/// Replication side of a node
pub enum Replication {
    Master(Master),
    Slave(Slave),
    None,
}

impl Replication {
    /// Build the role described by `config`
    ///
    /// A slave forwards replicated batches on `stream`.
    pub fn from_config(
        config: Option<&ReplicationConfig>,
        wal_directory: &Path,
        active: ActiveSegment,
        stream: Sender<Vec<Entry>>,
    ) -> Result<Self> {
        let Some(config) = config else {
            return Ok(Replication::None);
        };

        fs::create_dir_all(wal_directory)?;
        match config.replica_type {
            ReplicaRole::Master => Ok(Replication::Master(Master::bind(
                &config.master_address,
                wal_directory,
                active,
            )?)),
            ReplicaRole::Slave => Ok(Replication::Slave(Slave::new(config, wal_directory, stream)?)),
        }
    }

    pub fn is_master(&self) -> bool {
        matches!(self, Replication::Master(_))
    }

    pub fn is_slave(&self) -> bool {
        matches!(self, Replication::Slave(_))
    }

    pub fn role(&self) -> Option<ReplicaRole> {
        match self {
            Replication::Master(_) => Some(ReplicaRole::Master),
            Replication::Slave(_) => Some(ReplicaRole::Slave),
            Replication::None => None,
        }
    }

    /// Spawn the master accept loop or the slave sync loop
    pub fn start(self, shutdown: Shutdown) -> io::Result<Option<JoinHandle<()>>> {
        match self {
            Replication::Master(master) => thread::Builder::new()
                .name("replication-master".to_string())
                .spawn(move || {
                    if let Err(e) = master.start(&shutdown) {
                        tracing::error!(error = %e, "replication master failed");
                    }
                })
                .map(Some),
            Replication::Slave(slave) => thread::Builder::new()
                .name("replication-slave".to_string())
                .spawn(move || slave.start(&shutdown))
                .map(Some),
            Replication::None => Ok(None),
        }
    }
}

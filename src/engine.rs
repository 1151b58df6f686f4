//! Engine Module
//!
//! The storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Rebuild the table from the WAL on startup
//! - Make every local mutation durable before it becomes visible
//! - Reject mutations on read-only replicas
//! - Own the background threads (WAL watcher, compactor, replication)

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver};
use parking_lot::Mutex;

use crate::config::{Config, EngineType, ReplicaRole};
use crate::error::{Result, TideError};
use crate::memtable::{MemTable, Table};
use crate::protocol::Command;
use crate::replication::Replication;
use crate::shutdown::Shutdown;
use crate::wal::{ActiveSegment, Compactor, Entry, SegmentReader, SegmentWriter, Wal};

/// Replicated batches queued between the slave and the apply thread
const REPLICATION_QUEUE_SIZE: usize = 16;

/// The main storage engine
///
/// ## Write Path
///
/// `set`/`del` stage an entry in the WAL buffer and block until the watcher
/// has written and fsynced its batch. The watcher applies each written batch
/// to the table in log order before releasing its callers, so the table
/// always matches a replay and a failed write leaves no trace. Reads go to
/// the table alone.
///
/// ## Roles
///
/// A standalone node or a master accepts writes. A slave is read-only: its
/// table only changes through batches pulled from the master.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// In-memory key → value state
    table: Arc<dyn Table>,

    /// `None` when the WAL is disabled or the node is a slave
    wal: Option<Wal>,

    /// Segment currently open for appends
    active: ActiveSegment,

    role: Option<ReplicaRole>,

    /// Where the replication master listens, once bound
    replication_addr: Option<SocketAddr>,

    shutdown: Shutdown,

    /// Background threads, joined by [`Engine::join`]
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Open the engine and start its background threads
    ///
    /// On startup:
    /// 1. Replay every WAL segment into the table (any error is fatal)
    /// 2. Start the WAL watcher (writable nodes)
    /// 3. Start the compactor, if enabled
    /// 4. Start the replication master or slave, if configured
    pub fn start(config: Config, shutdown: Shutdown) -> Result<Arc<Self>> {
        config.validate()?;

        let table = open_table(config.engine.engine_type);
        let active = ActiveSegment::new();
        let role = config.replication.as_ref().map(|r| r.replica_type);
        let writable = config.is_writable();
        let wal_dir = config.wal.data_directory.clone();
        let mut workers = Vec::new();

        // Step 1: Recovery
        if config.wal.enabled {
            fs::create_dir_all(&wal_dir)?;
            recover(&wal_dir, table.as_ref())?;
        }

        // Step 2: WAL watcher
        let wal = if config.wal.enabled && writable {
            let committed = Arc::clone(&table);
            let writer = SegmentWriter::new(&wal_dir, config.wal.max_segment_size, active.clone())?
                .on_commit(move |entries| {
                    if let Err(e) = committed.apply(entries) {
                        tracing::error!(error = %e, "can't apply committed batch");
                    }
                });
            let wal = Wal::new(config.wal.flushing_batch_size);
            workers.push(wal.start(writer, config.wal.flushing_batch_timeout, shutdown.clone())?);
            Some(wal)
        } else {
            None
        };

        // Step 3: Compactor
        if config.wal.enabled && config.wal.compaction {
            if role.is_some() {
                tracing::warn!(
                    "compaction merges segments replicas may not have pulled yet; \
                     a replica positioned on a merged segment skips the entries \
                     of the segment folded into it"
                );
            }

            let compactor = Compactor::new(&wal_dir, config.wal.compaction_interval, active.clone());
            let token = shutdown.clone();
            workers.push(
                thread::Builder::new()
                    .name("wal-compactor".to_string())
                    .spawn(move || compactor.start(&token))?,
            );
        }

        // Step 4: Replication
        let (apply_tx, apply_rx) = bounded(REPLICATION_QUEUE_SIZE);
        let replication = Replication::from_config(
            config.replication.as_ref(),
            &wal_dir,
            active.clone(),
            apply_tx,
        )?;

        let replication_addr = match &replication {
            Replication::Master(master) => Some(master.local_addr()?),
            _ => None,
        };

        if replication.is_slave() {
            let table = Arc::clone(&table);
            workers.push(
                thread::Builder::new()
                    .name("replication-apply".to_string())
                    .spawn(move || apply_replicated(&apply_rx, table.as_ref()))?,
            );
        }

        if let Some(handle) = replication.start(shutdown.clone())? {
            workers.push(handle);
        }

        tracing::info!(
            role = ?role,
            wal = config.wal.enabled,
            keys = table.len(),
            "engine started"
        );

        Ok(Arc::new(Self {
            config,
            table,
            wal,
            active,
            role,
            replication_addr,
            shutdown,
            workers: Mutex::new(workers),
        }))
    }

    /// Execute a command
    ///
    /// Returns the value for GET and `None` for mutations.
    pub fn execute(&self, command: Command) -> Result<Option<String>> {
        match command {
            Command::Get { key } => self.get(&key).map(Some),
            Command::Set { key, value } => {
                self.set(&key, &value)?;
                Ok(None)
            }
            Command::Del { key } => {
                self.del(&key)?;
                Ok(None)
            }
        }
    }

    /// Set a key, durably
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.write(Entry::set(key, value))
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Result<String> {
        self.table.get(key).ok_or(TideError::KeyNotFound)
    }

    /// Delete a key, durably. Deleting a missing key is not an error.
    pub fn del(&self, key: &str) -> Result<()> {
        self.write(Entry::del(key))
    }

    fn write(&self, entry: Entry) -> Result<()> {
        if !self.is_writable() {
            return Err(TideError::ReadOnlyReplica);
        }
        match &self.wal {
            // The watcher applies the batch once it is on disk.
            Some(wal) => wal.append(entry),
            None => self.table.apply(std::slice::from_ref(&entry)),
        }
    }

    /// Signal every background thread to stop
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Wait for the background threads; call after shutdown
    ///
    /// The WAL watcher flushes whatever is still buffered before it exits.
    pub fn join(&self) {
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                tracing::error!(thread = %name, "background thread panicked");
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn table(&self) -> &dyn Table {
        self.table.as_ref()
    }

    pub fn active_segment(&self) -> &ActiveSegment {
        &self.active
    }

    pub fn role(&self) -> Option<ReplicaRole> {
        self.role
    }

    /// True when this node accepts local mutations
    pub fn is_writable(&self) -> bool {
        self.role.map_or(true, |role| role == ReplicaRole::Master)
    }

    /// Bound address of the replication listener (masters only)
    pub fn replication_addr(&self) -> Option<SocketAddr> {
        self.replication_addr
    }

    pub fn wal_directory(&self) -> &Path {
        &self.config.wal.data_directory
    }
}

fn open_table(engine_type: EngineType) -> Arc<dyn Table> {
    match engine_type {
        EngineType::InMemory => Arc::new(MemTable::new()),
    }
}

/// Replay every segment of `directory` into `table`
fn recover(directory: &Path, table: &dyn Table) -> Result<()> {
    let reader = SegmentReader::new(directory);
    let mut batches = 0usize;
    let mut entries = 0usize;

    for batch in reader.read() {
        let batch = batch?;
        table.apply(&batch)?;
        batches += 1;
        entries += batch.len();
    }

    if batches > 0 {
        tracing::info!(batches, entries, "WAL recovery complete");
    }
    Ok(())
}

/// Apply replicated batches until the slave hangs up
fn apply_replicated(batches: &Receiver<Vec<Entry>>, table: &dyn Table) {
    for batch in batches.iter() {
        if let Err(e) = table.apply(&batch) {
            tracing::error!(error = %e, "can't apply replicated batch");
        }
    }
    tracing::debug!("replication apply stopped");
}

//! # TideKV
//!
//! An in-memory key-value store with:
//! - A segmented Write-Ahead Log (WAL) with group commit for durability
//! - Background compaction of old segments
//! - Asynchronous master/slave log-shipping replication
//! - A TCP line protocol (`SET`, `GET`, `DEL`)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                             │
//! │                  (Multiple Clients)                         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Command
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                │
//! └──────────┬───────────────────────────────────┬──────────────┘
//!            │ push + wait                       │ set / get / del
//!            ▼                                   ▼
//!   ┌─────────────────┐                   ┌─────────────┐
//!   │  WAL Buffer     │                   │  MemTable   │
//!   └────────┬────────┘                   │  (RwLock)   │
//!            │ Watcher (size / timeout)   └──────▲──────┘
//!            ▼                                   │ apply
//!   ┌─────────────────┐   Master ─── frames ──▶ Slave
//!   │ wal-<ts>.log …  │◀── Compactor
//!   └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod shutdown;

pub mod wal;
pub mod memtable;
pub mod replication;
pub mod network;
pub mod protocol;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{TideError, Result};
pub use config::Config;
pub use engine::Engine;
pub use shutdown::Shutdown;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TideKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

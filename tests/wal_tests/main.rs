//! WAL Tests
//!
//! Framing, segment naming, the batch buffer, the writer/watcher pair,
//! replay and compaction.

mod watcher_tests;

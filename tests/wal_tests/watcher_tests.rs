//! Tests for the batch watcher (group commit)

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tempfile::TempDir;
use tidekv::shutdown::Shutdown;
use tidekv::wal::segment::list_segments;
use tidekv::wal::{decode_batches, ActiveSegment, Buffer, Entry, Flusher, SegmentWriter, Wal};
use tidekv::TideError;

// =============================================================================
// Helper Functions
// =============================================================================

/// Flusher that records each drained batch
#[derive(Clone, Default)]
struct RecordingFlusher {
    batches: Arc<Mutex<Vec<Vec<Entry>>>>,
}

impl Flusher for RecordingFlusher {
    fn flush(&mut self, buffer: &Buffer) {
        let pending = buffer.pop_all();
        if pending.is_empty() {
            return;
        }
        self.batches
            .lock()
            .push(pending.iter().map(|p| p.entry.clone()).collect());
        for p in pending {
            p.complete(Ok(()));
        }
    }
}

const LONG_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Trigger Tests
// =============================================================================

#[test]
fn test_timeout_flush() {
    let shutdown = Shutdown::new();
    let wal = Wal::new(100);
    let flusher = RecordingFlusher::default();
    let handle = wal
        .start(flusher.clone(), Duration::from_millis(20), shutdown.clone())
        .unwrap();

    wal.set("a", "1").unwrap();
    assert_eq!(flusher.batches.lock().len(), 1);

    shutdown.trigger();
    handle.join().unwrap();
}

#[test]
fn test_oversize_flushes_before_timeout() {
    let shutdown = Shutdown::new();
    let wal = Wal::new(2);
    let flusher = RecordingFlusher::default();
    let handle = wal.start(flusher.clone(), LONG_TIMEOUT, shutdown.clone()).unwrap();

    let started = Instant::now();
    let a = wal.buffer().push(Entry::set("a", "1"));
    let b = wal.buffer().push(Entry::set("b", "2"));
    a.wait().unwrap();
    b.wait().unwrap();

    assert!(started.elapsed() < LONG_TIMEOUT);
    assert_eq!(flusher.batches.lock().concat().len(), 2);

    shutdown.trigger();
    handle.join().unwrap();
}

#[test]
fn test_concurrent_appends_are_grouped() {
    let shutdown = Shutdown::new();
    let wal = Arc::new(Wal::new(1000));
    let flusher = RecordingFlusher::default();
    let handle = wal
        .start(flusher.clone(), Duration::from_millis(50), shutdown.clone())
        .unwrap();

    let writers: Vec<_> = (0..8)
        .map(|i| {
            let wal = wal.clone();
            thread::spawn(move || wal.set(&format!("k{}", i), "v").unwrap())
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let batches = flusher.batches.lock().clone();
    assert_eq!(batches.concat().len(), 8);
    assert!(batches.len() <= 8);

    shutdown.trigger();
    handle.join().unwrap();
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_shutdown_performs_terminal_flush() {
    let temp_dir = TempDir::new().unwrap();
    let shutdown = Shutdown::new();
    let wal = Wal::new(100);
    let writer = SegmentWriter::new(temp_dir.path(), 1024 * 1024, ActiveSegment::new()).unwrap();
    let handle = wal.start(writer, LONG_TIMEOUT, shutdown.clone()).unwrap();

    let completions: Vec<_> = (0..3)
        .map(|i| wal.buffer().push(Entry::set(format!("k{}", i), "v")))
        .collect();

    shutdown.trigger();
    handle.join().unwrap();

    for completion in completions {
        assert!(completion.wait().is_ok());
    }

    let segments = list_segments(temp_dir.path()).unwrap();
    assert_eq!(segments.len(), 1);
    let batches = decode_batches(&std::fs::read(temp_dir.path().join(&segments[0])).unwrap()).unwrap();
    assert_eq!(batches.concat().len(), 3);
}

#[test]
fn test_append_after_shutdown_is_rejected() {
    let shutdown = Shutdown::new();
    let wal = Wal::new(100);
    let handle = wal
        .start(RecordingFlusher::default(), LONG_TIMEOUT, shutdown.clone())
        .unwrap();

    shutdown.trigger();
    handle.join().unwrap();

    assert!(matches!(wal.set("a", "1"), Err(TideError::ShuttingDown)));
}

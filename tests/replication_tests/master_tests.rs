//! Tests for the replication master's segment resolution

use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use tidekv::replication::{Master, SegmentRequest};
use tidekv::wal::segment::segment_name;
use tidekv::wal::{decode_batches, encode_batch, ActiveSegment, Compactor, Entry};

// =============================================================================
// Helper Functions
// =============================================================================

fn write_segment(dir: &Path, timestamp: u64, key: &str) -> (String, Vec<u8>) {
    let name = segment_name(timestamp);
    let data = encode_batch(&[Entry::set(key, "v")]).unwrap().to_vec();
    fs::write(dir.join(&name), &data).unwrap();
    (name, data)
}

fn request(last_name: &str) -> SegmentRequest {
    SegmentRequest {
        last_name: last_name.to_string(),
    }
}

fn bind(dir: &Path, active: &ActiveSegment) -> Master {
    Master::bind("127.0.0.1:0", dir, active.clone()).unwrap()
}

// =============================================================================
// Resolution Tests
// =============================================================================

#[test]
fn test_empty_directory_ships_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let master = bind(temp_dir.path(), &ActiveSegment::new());

    let response = master.handle_request(&request(""));
    assert_eq!(response.name, "");
    assert_eq!(response.data, None);
}

#[test]
fn test_walks_sealed_segments_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let (a, a_data) = write_segment(dir, 100, "a");
    let (b, b_data) = write_segment(dir, 200, "b");
    let master = bind(dir, &ActiveSegment::new());

    let first = master.handle_request(&request(""));
    assert_eq!(first.name, a);
    assert_eq!(first.data, Some(a_data));

    let second = master.handle_request(&request(&a));
    assert_eq!(second.name, b);
    assert_eq!(second.data, Some(b_data));
}

#[test]
fn test_tip_ships_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let (a, _) = write_segment(temp_dir.path(), 100, "a");
    let master = bind(temp_dir.path(), &ActiveSegment::new());

    let response = master.handle_request(&request(&a));
    assert_eq!(response.name, a);
    assert_eq!(response.data, None);
}

#[test]
fn test_active_segment_is_held_back() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let (a, _) = write_segment(dir, 100, "a");
    let (b, _) = write_segment(dir, 200, "b");

    let active = ActiveSegment::new();
    *active.lock() = Some(b.clone());
    let master = bind(dir, &active);

    let response = master.handle_request(&request(&a));
    assert_eq!(response.name, a);
    assert_eq!(response.data, None);

    // Once rotated out it is shipped.
    *active.lock() = Some(segment_name(300));
    let response = master.handle_request(&request(&a));
    assert_eq!(response.name, b);
    assert!(response.data.is_some());
}

#[test]
fn test_empty_segment_is_shipped_as_empty_data() {
    let temp_dir = TempDir::new().unwrap();
    let name = segment_name(100);
    fs::write(temp_dir.path().join(&name), b"").unwrap();
    let master = bind(temp_dir.path(), &ActiveSegment::new());

    let response = master.handle_request(&request(""));
    assert_eq!(response.name, name);
    assert_eq!(response.data, Some(Vec::new()));
}

#[test]
fn test_compaction_folds_segment_behind_replica_cursor() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let (a, _) = write_segment(dir, 100, "a");
    write_segment(dir, 200, "b");
    let (c, c_data) = write_segment(dir, 300, "c");

    let compactor = Compactor::new(dir, Duration::from_secs(60), ActiveSegment::new());
    assert_eq!(compactor.run().unwrap(), Some(a.clone()));

    // A replica already holding the old `a` is handed `c` next; the `b`
    // entries now live only inside the merged `a`.
    let master = bind(dir, &ActiveSegment::new());
    let response = master.handle_request(&request(&a));
    assert_eq!(response.name, c);
    assert_eq!(response.data, Some(c_data));

    let merged = decode_batches(&fs::read(dir.join(&a)).unwrap()).unwrap();
    assert_eq!(merged, vec![vec![Entry::set("a", "v"), Entry::set("b", "v")]]);
}

#[test]
fn test_bad_cursor_ships_nothing() {
    let temp_dir = TempDir::new().unwrap();
    write_segment(temp_dir.path(), 100, "a");
    let master = bind(temp_dir.path(), &ActiveSegment::new());

    let response = master.handle_request(&request("not-a-segment"));
    assert_eq!(response.name, "not-a-segment");
    assert_eq!(response.data, None);
}

// =============================================================================
// Role Tests
// =============================================================================

#[test]
fn test_replication_from_config() {
    use crossbeam::channel::unbounded;
    use tidekv::config::{ReplicaRole, ReplicationConfig};
    use tidekv::replication::Replication;

    let temp_dir = TempDir::new().unwrap();
    let (tx, _rx) = unbounded();

    let none = Replication::from_config(None, temp_dir.path(), ActiveSegment::new(), tx.clone()).unwrap();
    assert_eq!(none.role(), None);

    let master_config = ReplicationConfig::new(ReplicaRole::Master, "127.0.0.1:0");
    let master =
        Replication::from_config(Some(&master_config), temp_dir.path(), ActiveSegment::new(), tx.clone())
            .unwrap();
    assert!(master.is_master());
    assert_eq!(master.role(), Some(ReplicaRole::Master));

    let slave_config = ReplicationConfig::new(ReplicaRole::Slave, "127.0.0.1:1");
    let slave =
        Replication::from_config(Some(&slave_config), temp_dir.path(), ActiveSegment::new(), tx).unwrap();
    assert!(slave.is_slave());
    assert!(!slave.is_master());
}

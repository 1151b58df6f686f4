//! Tests for configuration loading and validation

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use tidekv::config::{parse_size, Config, EngineType, LogOutput, ReplicaRole};
use tidekv::TideError;

const FULL_CONFIG: &str = r#"
[engine]
type = "in_memory"

[network]
address = "0.0.0.0:4000"
max_connections = 10
max_message_size = "8KB"
idle_timeout = "2m"

[logging]
level = "debug"
output = "stderr"

[wal]
enabled = true
flushing_batch_size = 50
flushing_batch_timeout = "20ms"
max_segment_size = "1MB"
data_directory = "/var/lib/tidekv/wal"
compaction = true
compaction_interval = "30s"

[replication]
replica_type = "slave"
master_address = "10.0.0.1:3232"
sync_interval = "500ms"
"#;

// =============================================================================
// Size Parsing Tests
// =============================================================================

#[test]
fn test_parse_size_units() {
    assert_eq!(parse_size("20").unwrap(), 20);
    assert_eq!(parse_size("20B").unwrap(), 20);
    assert_eq!(parse_size("20b").unwrap(), 20);
    assert_eq!(parse_size("20KB").unwrap(), 20 << 10);
    assert_eq!(parse_size("20kb").unwrap(), 20 << 10);
    assert_eq!(parse_size("20MB").unwrap(), 20 << 20);
    assert_eq!(parse_size("1Gb").unwrap(), 1 << 30);
}

#[test]
fn test_parse_size_rejects_garbage() {
    assert!(parse_size("-20").is_err());
    assert!(parse_size("abc").is_err());
    assert!(parse_size("20TB").is_err());
    assert!(parse_size("").is_err());
    assert!(parse_size("KB").is_err());
}

// =============================================================================
// Loading Tests
// =============================================================================

#[test]
fn test_defaults() {
    let config = Config::default();

    assert_eq!(config.engine.engine_type, EngineType::InMemory);
    assert_eq!(config.network.address, "127.0.0.1:3223");
    assert_eq!(config.network.max_connections, 100);
    assert_eq!(config.network.max_message_size, 4096);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.output, LogOutput::Stdout);
    assert!(config.wal.enabled);
    assert_eq!(config.wal.flushing_batch_size, 100);
    assert_eq!(config.wal.flushing_batch_timeout, Duration::from_millis(10));
    assert!(!config.wal.compaction);
    assert!(config.replication.is_none());
    assert!(config.is_writable());
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_file_means_defaults() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config.network.address, Config::default().network.address);
}

#[test]
fn test_full_file() {
    let config = Config::from_toml(FULL_CONFIG).unwrap();

    assert_eq!(config.network.address, "0.0.0.0:4000");
    assert_eq!(config.network.max_connections, 10);
    assert_eq!(config.network.max_message_size, 8 * 1024);
    assert_eq!(config.network.idle_timeout, Duration::from_secs(120));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.output, LogOutput::Stderr);
    assert_eq!(config.wal.flushing_batch_size, 50);
    assert_eq!(config.wal.flushing_batch_timeout, Duration::from_millis(20));
    assert_eq!(config.wal.max_segment_size, 1 << 20);
    assert_eq!(config.wal.data_directory, PathBuf::from("/var/lib/tidekv/wal"));
    assert!(config.wal.compaction);
    assert_eq!(config.wal.compaction_interval, Duration::from_secs(30));

    let replication = config.replication.as_ref().unwrap();
    assert_eq!(replication.replica_type, ReplicaRole::Slave);
    assert_eq!(replication.master_address, "10.0.0.1:3232");
    assert_eq!(replication.sync_interval, Duration::from_millis(500));
    assert_eq!(replication.max_message_size, 10 << 20);
    assert!(!config.is_writable());
}

#[test]
fn test_numeric_sizes_are_bytes() {
    let config = Config::from_toml("[wal]\nmax_segment_size = 2048\n").unwrap();
    assert_eq!(config.wal.max_segment_size, 2048);
}

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tidekv.toml");
    fs::write(&path, FULL_CONFIG).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.network.max_connections, 10);
}

#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = Config::load(&temp_dir.path().join("missing.toml"));
    assert!(matches!(result, Err(TideError::Config(_))));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_rejects_bad_values() {
    for text in [
        "[network]\nmax_connections = 0\n",
        "[wal]\nflushing_batch_size = 0\n",
        "[wal]\nmax_segment_size = \"10XB\"\n",
        "[engine]\ntype = \"on_disk\"\n",
        "[logging]\noutput = \"syslog\"\n",
        "[replication]\nreplica_type = \"leader\"\n",
    ] {
        assert!(
            matches!(Config::from_toml(text), Err(TideError::Config(_))),
            "accepted: {}",
            text
        );
    }
}

#[test]
fn test_replication_requires_wal() {
    let text = "[wal]\nenabled = false\n[replication]\nreplica_type = \"master\"\n";
    assert!(matches!(Config::from_toml(text), Err(TideError::Config(_))));
}

#[test]
fn test_segment_must_fit_in_replication_frame() {
    let text = "[wal]\nmax_segment_size = \"20MB\"\n[replication]\nreplica_type = \"master\"\n";
    assert!(matches!(Config::from_toml(text), Err(TideError::Config(_))));
}

#[test]
fn test_replica_role_decides_writability() {
    let master = Config::from_toml("[replication]\nreplica_type = \"master\"\n").unwrap();
    assert!(master.is_writable());

    let slave = Config::from_toml("[replication]\nreplica_type = \"slave\"\n").unwrap();
    assert!(!slave.is_writable());
    assert_eq!(
        slave.replication.as_ref().unwrap().master_address,
        "127.0.0.1:3232"
    );
}

// =============================================================================
// Builder Tests
// =============================================================================

#[test]
fn test_builder() {
    let config = Config::builder()
        .data_dir("/tmp/tidekv")
        .flushing_batch_size(7)
        .flushing_batch_timeout(Duration::from_millis(3))
        .max_segment_size(4096)
        .compaction(Duration::from_secs(1))
        .listen_addr("127.0.0.1:0")
        .max_connections(3)
        .replication(ReplicaRole::Slave, "127.0.0.1:9999")
        .sync_interval(Duration::from_millis(25))
        .build();

    assert_eq!(config.wal.data_directory, PathBuf::from("/tmp/tidekv"));
    assert_eq!(config.wal.flushing_batch_size, 7);
    assert_eq!(config.wal.max_segment_size, 4096);
    assert!(config.wal.compaction);
    assert_eq!(config.network.max_connections, 3);

    let replication = config.replication.as_ref().unwrap();
    assert_eq!(replication.master_address, "127.0.0.1:9999");
    assert_eq!(replication.sync_interval, Duration::from_millis(25));
    assert!(config.validate().is_ok());
}

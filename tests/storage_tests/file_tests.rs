//! Tests for FileEngine
//!
//! These tests verify:
//! - Log creation and persistence across restarts
//! - Commit durability (uncommitted writes do not survive a restart)
//! - Version and magic checks, torn tail truncation
//! - Compaction of obsolete records
//! - Erase-and-retry recovery through the manager

use std::fs::{self, OpenOptions};
use std::io::Write;

use flashslot::storage::{OpenMode, StorageEngine, FORMAT_VERSION, MAGIC};
use flashslot::{Config, EngineError, FileEngine, HandleConfig, SlotError, SlotManager};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_config(temp_dir: &TempDir) -> Config {
    Config::builder().data_dir(temp_dir.path()).build()
}

fn open_engine(config: &Config) -> FileEngine {
    let engine = FileEngine::open(config).unwrap();
    engine.init().unwrap();
    engine
}

fn write_committed(engine: &FileEngine, namespace: &str, key: &str, value: &str) {
    let mut session = engine.open_session(namespace, OpenMode::ReadWrite).unwrap();
    session.set_string(key, value).unwrap();
    session.commit().unwrap();
}

fn read_value(engine: &FileEngine, namespace: &str, key: &str) -> Option<String> {
    let session = engine.open_session(namespace, OpenMode::ReadWrite).unwrap();
    let size = match session.get_string_size(key) {
        Ok(size) => size,
        Err(EngineError::NotFound) => return None,
        Err(e) => panic!("unexpected error: {}", e),
    };
    let mut buf = vec![0u8; size];
    let n = session.get_string(key, &mut buf).unwrap();
    Some(String::from_utf8(buf[..n].to_vec()).unwrap())
}

// =============================================================================
// Open / Init Tests
// =============================================================================

#[test]
fn test_open_creates_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("slots");
    let config = Config::builder().data_dir(&data_dir).build();

    let engine = FileEngine::open(&config).unwrap();

    assert!(data_dir.exists());
    assert!(!engine.is_initialized());
    assert!(!engine.path().exists());
}

#[test]
fn test_init_writes_header() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup_config(&temp_dir);

    let engine = open_engine(&config);

    let bytes = fs::read(engine.path()).unwrap();
    assert_eq!(&bytes[0..4], MAGIC);
    assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), FORMAT_VERSION);
    assert_eq!(bytes.len(), 6);
    assert_eq!(engine.path(), temp_dir.path().join("nvs.fsl"));
}

#[test]
fn test_operations_before_init() {
    let temp_dir = TempDir::new().unwrap();
    let engine = FileEngine::open(&setup_config(&temp_dir)).unwrap();

    assert!(matches!(
        engine.open_session("storage", OpenMode::ReadWrite),
        Err(EngineError::NotInitialized)
    ));
    assert!(matches!(engine.stats("nvs"), Err(EngineError::NotInitialized)));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_committed_writes_survive_restart() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup_config(&temp_dir);

    {
        let engine = open_engine(&config);
        write_committed(&engine, "storage", "key-1", "example_value");
        write_committed(&engine, "cfg", "mode", "fast");
    }

    let engine = open_engine(&config);
    assert_eq!(read_value(&engine, "storage", "key-1"), Some("example_value".to_string()));
    assert_eq!(read_value(&engine, "cfg", "mode"), Some("fast".to_string()));
}

#[test]
fn test_committed_erase_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup_config(&temp_dir);

    {
        let engine = open_engine(&config);
        write_committed(&engine, "storage", "key-1", "v");
        let mut session = engine.open_session("storage", OpenMode::ReadWrite).unwrap();
        session.erase_key("key-1").unwrap();
        session.commit().unwrap();
    }

    let engine = open_engine(&config);
    assert_eq!(read_value(&engine, "storage", "key-1"), None);
}

#[test]
fn test_uncommitted_writes_visible_but_not_durable() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup_config(&temp_dir);

    {
        let engine = open_engine(&config);
        {
            let mut session = engine.open_session("storage", OpenMode::ReadWrite).unwrap();
            session.set_string("key-1", "pending").unwrap();
        }
        assert_eq!(read_value(&engine, "storage", "key-1"), Some("pending".to_string()));
    }

    let engine = open_engine(&config);
    assert_eq!(read_value(&engine, "storage", "key-1"), None);
}

#[test]
fn test_read_only_session_rules() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_engine(&setup_config(&temp_dir));

    assert!(matches!(
        engine.open_session("storage", OpenMode::ReadOnly),
        Err(EngineError::NotFound)
    ));

    write_committed(&engine, "storage", "k", "v");
    let mut session = engine.open_session("storage", OpenMode::ReadOnly).unwrap();
    assert!(matches!(session.set_string("k", "w"), Err(EngineError::ReadOnly)));
}

#[test]
fn test_entry_limit() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().data_dir(temp_dir.path()).max_entries(1).build();
    let engine = open_engine(&config);

    write_committed(&engine, "storage", "a", "1");
    let mut session = engine.open_session("storage", OpenMode::ReadWrite).unwrap();

    assert!(matches!(session.set_string("b", "2"), Err(EngineError::NotEnoughSpace)));
}

// =============================================================================
// Format Check Tests
// =============================================================================

#[test]
fn test_newer_version_reported() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup_config(&temp_dir);
    let engine = FileEngine::open(&config).unwrap();

    let mut header = MAGIC.to_vec();
    header.extend_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
    fs::write(engine.path(), &header).unwrap();

    let result = engine.init();

    assert!(matches!(
        result,
        Err(EngineError::NewVersionFound { found }) if found == FORMAT_VERSION + 1
    ));
    assert!(!engine.is_initialized());
}

#[test]
fn test_bad_magic_reported() {
    let temp_dir = TempDir::new().unwrap();
    let engine = FileEngine::open(&setup_config(&temp_dir)).unwrap();
    fs::write(engine.path(), b"NOPE\x01\x00").unwrap();

    assert!(matches!(engine.init(), Err(EngineError::Corrupted(_))));
}

#[test]
fn test_torn_tail_truncated() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup_config(&temp_dir);

    let intact_len = {
        let engine = open_engine(&config);
        write_committed(&engine, "storage", "key-1", "kept");
        fs::metadata(engine.path()).unwrap().len()
    };

    // Simulate a crash halfway through appending a record
    {
        let path = temp_dir.path().join("nvs.fsl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[40, 0, 0, 0, 1, 2, 3, 4, 9, 9]).unwrap();
    }

    let engine = open_engine(&config);
    assert_eq!(read_value(&engine, "storage", "key-1"), Some("kept".to_string()));
    assert_eq!(fs::metadata(engine.path()).unwrap().len(), intact_len);
}

#[test]
fn test_commit_after_partial_append_is_durable() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup_config(&temp_dir);

    {
        let engine = open_engine(&config);
        write_committed(&engine, "storage", "a", "one");
        let committed_len = fs::metadata(engine.path()).unwrap().len();

        // Leave half a frame behind, as a failed append would
        {
            let mut file = OpenOptions::new().append(true).open(engine.path()).unwrap();
            file.write_all(&[0x20, 0, 0, 0, 0xAA]).unwrap();
        }

        write_committed(&engine, "storage", "b", "two");
        assert!(fs::metadata(engine.path()).unwrap().len() > committed_len);
    }

    let engine = open_engine(&config);
    assert_eq!(read_value(&engine, "storage", "a"), Some("one".to_string()));
    assert_eq!(read_value(&engine, "storage", "b"), Some("two".to_string()));
}

#[test]
fn test_commit_reports_shrunken_log() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_engine(&setup_config(&temp_dir));
    write_committed(&engine, "storage", "a", "one");

    OpenOptions::new()
        .write(true)
        .open(engine.path())
        .unwrap()
        .set_len(6)
        .unwrap();

    let mut session = engine.open_session("storage", OpenMode::ReadWrite).unwrap();
    session.set_string("b", "two").unwrap();
    assert!(matches!(session.commit(), Err(EngineError::Corrupted(_))));
}

#[test]
fn test_torn_header_rewritten() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup_config(&temp_dir);
    let engine = FileEngine::open(&config).unwrap();
    fs::write(engine.path(), b"FSL").unwrap();

    engine.init().unwrap();

    let bytes = fs::read(engine.path()).unwrap();
    assert_eq!(&bytes[0..4], MAGIC);
    assert_eq!(bytes.len(), 6);

    write_committed(&engine, "storage", "k", "v");
    assert_eq!(read_value(&engine, "storage", "k"), Some("v".to_string()));
}

#[test]
fn test_manager_recovers_torn_header() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup_config(&temp_dir);
    let engine = FileEngine::open(&config).unwrap();
    let mut header = MAGIC.to_vec();
    header.push(FORMAT_VERSION.to_le_bytes()[0]);
    fs::write(engine.path(), &header).unwrap();

    let manager = SlotManager::new(engine, config);
    let mut handle = manager.create(HandleConfig::new("storage", "key-1", 64)).unwrap();

    manager.write(&handle, "fresh").unwrap();
    assert_eq!(manager.read(&mut handle).unwrap(), "fresh");
}

#[test]
fn test_short_foreign_file_reported() {
    let temp_dir = TempDir::new().unwrap();
    let engine = FileEngine::open(&setup_config(&temp_dir)).unwrap();
    fs::write(engine.path(), b"XY").unwrap();

    assert!(matches!(engine.init(), Err(EngineError::Corrupted(_))));
}

#[test]
fn test_corrupt_record_stops_replay() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup_config(&temp_dir);

    {
        let engine = open_engine(&config);
        write_committed(&engine, "storage", "a", "first");
        write_committed(&engine, "storage", "b", "second");
    }

    // Flip the last payload byte of the second record
    let path = temp_dir.path().join("nvs.fsl");
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let engine = open_engine(&config);
    assert_eq!(read_value(&engine, "storage", "a"), Some("first".to_string()));
    assert_eq!(read_value(&engine, "storage", "b"), None);
}

// =============================================================================
// Compaction Tests
// =============================================================================

#[test]
fn test_obsolete_records_compacted_on_init() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup_config(&temp_dir);

    let grown_len = {
        let engine = open_engine(&config);
        for i in 0..20 {
            write_committed(&engine, "storage", "counter", &i.to_string());
        }
        fs::metadata(engine.path()).unwrap().len()
    };

    let engine = open_engine(&config);
    let compacted_len = fs::metadata(engine.path()).unwrap().len();

    assert!(compacted_len < grown_len);
    assert_eq!(read_value(&engine, "storage", "counter"), Some("19".to_string()));
    assert!(!temp_dir.path().join("nvs.fsl.tmp").exists());
}

// =============================================================================
// Erase / Recovery Tests
// =============================================================================

#[test]
fn test_erase_removes_log() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_engine(&setup_config(&temp_dir));
    write_committed(&engine, "storage", "k", "v");

    engine.erase().unwrap();

    assert!(!engine.path().exists());
    assert!(!engine.is_initialized());

    engine.init().unwrap();
    assert_eq!(read_value(&engine, "storage", "k"), None);
}

#[test]
fn test_manager_recovers_newer_version_partition() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup_config(&temp_dir);
    let engine = FileEngine::open(&config).unwrap();

    let mut header = MAGIC.to_vec();
    header.extend_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
    fs::write(engine.path(), &header).unwrap();

    let manager = SlotManager::new(engine, config);
    let mut handle = manager.create(HandleConfig::new("storage", "key-1", 64)).unwrap();

    manager.write(&handle, "fresh").unwrap();
    assert_eq!(manager.read(&mut handle).unwrap(), "fresh");

    let bytes = fs::read(manager.engine().path()).unwrap();
    assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), FORMAT_VERSION);
}

#[test]
fn test_manager_recovers_overfull_partition() {
    let temp_dir = TempDir::new().unwrap();

    {
        let engine = open_engine(&setup_config(&temp_dir));
        for i in 0..5 {
            write_committed(&engine, "storage", &format!("k{}", i), "v");
        }
    }

    // Reopen with a smaller partition: no free pages until erased
    let config = Config::builder().data_dir(temp_dir.path()).max_entries(3).build();
    let engine = FileEngine::open(&config).unwrap();
    assert!(matches!(engine.init(), Err(EngineError::NoFreePages)));

    let manager = SlotManager::new(engine, config);
    let handle = manager.create(HandleConfig::new("storage", "key-1", 64)).unwrap();

    assert_eq!(manager.stats().unwrap().used_entries, 0);
    manager.destroy(handle);
}

#[test]
fn test_manager_reports_corrupt_partition() {
    let temp_dir = TempDir::new().unwrap();
    let config = setup_config(&temp_dir);
    let engine = FileEngine::open(&config).unwrap();
    fs::write(engine.path(), b"JUNKJUNK").unwrap();

    let manager = SlotManager::new(engine, config);
    let result = manager.create(HandleConfig::new("storage", "key-1", 64));

    assert!(matches!(
        result,
        Err(SlotError::EngineInitFailed(EngineError::Corrupted(_)))
    ));
}

// =============================================================================
// Enumeration / Stats Tests
// =============================================================================

#[test]
fn test_entries_and_stats() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_engine(&setup_config(&temp_dir));
    write_committed(&engine, "storage", "a", "1");
    write_committed(&engine, "cfg", "b", "2");
    write_committed(&engine, "storage", "c", "3");

    let namespaces: Vec<String> = engine
        .entries("nvs", None, None)
        .unwrap()
        .map(|e| e.unwrap().namespace)
        .collect();
    assert_eq!(namespaces, vec!["storage", "cfg", "storage"]);

    let stats = engine.stats("nvs").unwrap();
    assert_eq!(stats.namespace_count, 2);
    assert_eq!(stats.used_entries, 3);
}

//! Tests for namespace enumeration
//!
//! These tests verify:
//! - De-duplication in first-seen order
//! - The configurable upper bound on listed namespaces
//! - Empty partitions and iterator failures degrade to an empty list
//! - The entry iterator is released on every exit path

use flashslot::storage::FaultPoint;
use flashslot::{Config, EngineError, HandleConfig, MemoryEngine, SlotError, SlotManager};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_manager() -> SlotManager<MemoryEngine> {
    let manager = SlotManager::new(MemoryEngine::new(), Config::default());
    // A handle brings the engine up
    let handle = manager.create(HandleConfig::new("probe", "key", 8)).unwrap();
    manager.destroy(handle);
    manager
}

fn seed(manager: &SlotManager<MemoryEngine>, entries: &[(&str, &str)]) {
    for (namespace, key) in entries {
        manager.engine().insert(namespace, key, "v").unwrap();
    }
}

// =============================================================================
// De-duplication Tests
// =============================================================================

#[test]
fn test_duplicates_listed_once_in_first_seen_order() {
    let manager = setup_manager();
    seed(&manager, &[("storage", "a"), ("storage", "b"), ("cfg", "c")]);

    let namespaces = manager.list_namespaces();

    assert_eq!(namespaces, vec!["storage".to_string(), "cfg".to_string()]);
    assert_eq!(manager.engine().live_iterators(), 0);
}

#[test]
fn test_interleaved_namespaces() {
    let manager = setup_manager();
    seed(
        &manager,
        &[("wifi", "ssid"), ("cfg", "mode"), ("wifi", "pass"), ("boot", "count"), ("cfg", "level")],
    );

    assert_eq!(manager.list_namespaces(), vec!["wifi", "cfg", "boot"]);
}

#[test]
fn test_exact_match_comparison() {
    let manager = setup_manager();
    seed(&manager, &[("cfg", "a"), ("cfg2", "b"), ("Cfg", "c")]);

    assert_eq!(manager.list_namespaces(), vec!["cfg", "cfg2", "Cfg"]);
}

#[test]
fn test_namespaces_from_handle_writes() {
    let manager = SlotManager::new(MemoryEngine::new(), Config::default());
    let a = manager.create(HandleConfig::new("storage", "key-1", 64)).unwrap();
    let b = manager.create(HandleConfig::new("net", "ssid", 64)).unwrap();

    manager.write(&a, "example_value").unwrap();
    manager.write(&b, "home").unwrap();

    assert_eq!(manager.list_namespaces(), vec!["storage", "net"]);
}

// =============================================================================
// Upper Bound Tests
// =============================================================================

#[test]
fn test_default_bound_is_64() {
    let manager = setup_manager();
    for i in 0..100 {
        manager.engine().insert(&format!("ns-{}", i), "k", "v").unwrap();
    }

    let namespaces = manager.try_list_namespaces().unwrap();

    assert_eq!(namespaces.len(), 64);
    assert_eq!(namespaces[0], "ns-0");
    assert_eq!(namespaces[63], "ns-63");
    assert_eq!(manager.engine().live_iterators(), 0);
}

#[test]
fn test_bound_keeps_earliest_namespaces() {
    let manager = setup_manager();
    for i in 0..100 {
        manager.engine().insert(&format!("ns-{}", i), "k", "v").unwrap();
    }
    // Repeat of an early namespace past the bound is still recognised as seen
    manager.engine().insert("ns-0", "k2", "v").unwrap();

    let namespaces = manager.list_namespaces();

    assert_eq!(namespaces.len(), 64);
    assert_eq!(namespaces.iter().filter(|ns| *ns == "ns-0").count(), 1);
}

#[test]
fn test_configurable_bound() {
    let config = Config::builder().max_namespaces(3).build();
    let manager = SlotManager::new(MemoryEngine::from_config(&config), config);
    let handle = manager.create(HandleConfig::new("a", "k", 8)).unwrap();
    manager.write(&handle, "v").unwrap();
    seed(&manager, &[("b", "k"), ("c", "k"), ("d", "k"), ("e", "k")]);

    assert_eq!(manager.list_namespaces(), vec!["a", "b", "c"]);
}

// =============================================================================
// Empty / Failure Tests
// =============================================================================

#[test]
fn test_empty_partition() {
    let manager = setup_manager();

    assert!(manager.list_namespaces().is_empty());
    assert!(manager.try_list_namespaces().unwrap().is_empty());
    assert_eq!(manager.engine().live_iterators(), 0);
}

#[test]
fn test_uninitialized_engine_degrades_to_empty() {
    let manager = SlotManager::new(MemoryEngine::new(), Config::default());

    assert!(manager.list_namespaces().is_empty());
    assert!(matches!(
        manager.try_list_namespaces(),
        Err(SlotError::IteratorFailed(EngineError::NotInitialized))
    ));
}

#[test]
fn test_iterator_open_failure() {
    let manager = setup_manager();
    seed(&manager, &[("storage", "a")]);
    manager
        .engine()
        .fail_next(FaultPoint::Entries, EngineError::Corrupted("page".to_string()));

    assert!(manager.list_namespaces().is_empty());
    assert_eq!(manager.engine().live_iterators(), 0);

    // Fault consumed, next listing works
    assert_eq!(manager.list_namespaces(), vec!["storage"]);
}

#[test]
fn test_iterator_failure_mid_walk_releases_iterator() {
    let manager = setup_manager();
    seed(&manager, &[("storage", "a"), ("cfg", "b")]);
    manager
        .engine()
        .fail_next(FaultPoint::EntryNext, EngineError::Corrupted("entry".to_string()));

    let result = manager.try_list_namespaces();

    assert!(matches!(result, Err(SlotError::IteratorFailed(EngineError::Corrupted(_)))));
    assert_eq!(manager.engine().live_iterators(), 0);
}

#[test]
fn test_iterator_failure_degrades_to_empty() {
    let manager = setup_manager();
    seed(&manager, &[("storage", "a")]);
    manager
        .engine()
        .fail_next(FaultPoint::EntryNext, EngineError::Corrupted("entry".to_string()));

    assert!(manager.list_namespaces().is_empty());
    assert_eq!(manager.engine().live_iterators(), 0);
}

#[test]
fn test_partition_mismatch_degrades_to_empty() {
    let engine = MemoryEngine::new();
    engine.insert("storage", "a", "v").unwrap();
    let config = Config::builder().partition("other").build();
    let manager = SlotManager::new(engine, config);

    assert!(manager.list_namespaces().is_empty());
    assert!(matches!(
        manager.try_list_namespaces(),
        Err(SlotError::IteratorFailed(EngineError::PartitionNotFound(_)))
    ));
}

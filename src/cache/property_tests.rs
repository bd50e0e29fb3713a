//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache's invariants over random operation sequences.

use proptest::prelude::*;
use std::collections::HashSet;
use std::thread::sleep;
use std::time::Duration;

use tokio_test::block_on;

use crate::cache::{estimate_size, CacheStore};
use crate::config::StoreConfig;

// == Test Configuration ==
const TEST_MAX_CACHE_SIZE: u64 = 64 * 1024;

fn test_config(max_cache_size: u64) -> StoreConfig {
    StoreConfig {
        default_ttl: Duration::from_secs(300),
        max_cache_size,
        persistent_storage: false,
        max_retry_count: 3,
        single_flight: false,
    }
}

// == Strategies ==
/// Generates cache keys, some of them inside the `batch_` / `doc_` key spaces
fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9]{1,12}".prop_map(|s| format!("batch_{}", s)),
        "[a-z0-9]{1,12}".prop_map(|s| format!("doc_{}", s)),
        "[a-zA-Z0-9_]{1,24}",
    ]
}

/// Generates cache values
fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,256}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Clear { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Clear { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hits and misses match what each get observed; the footprint matches the map.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let store = CacheStore::<String>::memory_only(&test_config(TEST_MAX_CACHE_SIZE));
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    store.set(key, value, None).unwrap();
                }
                CacheOp::Get { key } => {
                    match block_on(store.get(&key)) {
                        Some(_) => expected_hits += 1,
                        None => expected_misses += 1,
                    }
                }
                CacheOp::Clear { key } => {
                    store.clear(&key);
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.entry_count, store.len(), "Entry count mismatch");
    }

    // A value read back before its TTL elapses is the value that was stored.
    #[test]
    fn prop_roundtrip_storage(key in key_strategy(), value in value_strategy()) {
        let store = CacheStore::<String>::memory_only(&test_config(TEST_MAX_CACHE_SIZE));

        store.set(key.clone(), value.clone(), None).unwrap();

        prop_assert_eq!(block_on(store.get(&key)), Some(value), "Round-trip value mismatch");
    }

    // Storing V1 then V2 under one key leaves exactly V2.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let store = CacheStore::<String>::memory_only(&test_config(TEST_MAX_CACHE_SIZE));

        store.set(key.clone(), value1, None).unwrap();
        store.set(key.clone(), value2.clone(), None).unwrap();

        prop_assert_eq!(block_on(store.get(&key)), Some(value2.clone()));
        prop_assert_eq!(store.len(), 1);
        prop_assert_eq!(store.stats().total_size, estimate_size(&value2).unwrap());
    }

    // After any run of sets the tracked size is within the budget.
    #[test]
    fn prop_size_bound(
        entries in prop::collection::vec((key_strategy(), value_strategy()), 1..200),
        max_cache_size in 300u64..4096
    ) {
        let store = CacheStore::<String>::memory_only(&test_config(max_cache_size));

        for (key, value) in entries {
            store.set(key, value, None).unwrap();
            let stats = store.stats();
            prop_assert!(
                stats.total_size <= max_cache_size,
                "Cache size {} exceeds budget {}",
                stats.total_size,
                max_cache_size
            );
        }
    }

    // Eviction always takes the earliest-inserted keys; survivors are a suffix.
    #[test]
    fn prop_eviction_removes_oldest_first(
        keys in prop::collection::hash_set("[a-z]{4,10}", 3..30),
        max_cache_size in 200u64..2000
    ) {
        let keys: Vec<String> = keys.into_iter().collect();
        let store = CacheStore::<String>::memory_only(&test_config(max_cache_size));

        for key in &keys {
            store.set(key.clone(), "v".repeat(48), None).unwrap();
        }

        let survivors: Vec<bool> = keys.iter().map(|k| store.contains(k)).collect();
        let first_survivor = survivors.iter().position(|alive| *alive).unwrap_or(keys.len());
        prop_assert!(
            survivors[first_survivor..].iter().all(|alive| *alive),
            "A newer entry was evicted before an older one: {:?}",
            survivors
        );
    }

    // clear_by_prefix removes exactly the keys with that prefix.
    #[test]
    fn prop_prefix_invalidation(keys in prop::collection::hash_set(key_strategy(), 1..40)) {
        let store = CacheStore::<String>::memory_only(&test_config(TEST_MAX_CACHE_SIZE));
        for key in &keys {
            store.set(key.clone(), "v".to_string(), None).unwrap();
        }

        let expected_removed = keys.iter().filter(|k| k.starts_with("batch_")).count();
        prop_assert_eq!(store.clear_by_prefix("batch_"), expected_removed);

        for key in &keys {
            prop_assert_eq!(store.contains(key), !key.starts_with("batch_"), "Key {}", key);
        }
    }

    // Cleared keys read back as misses.
    #[test]
    fn prop_clear_removes_entry(key in key_strategy(), value in value_strategy()) {
        let store = CacheStore::<String>::memory_only(&test_config(TEST_MAX_CACHE_SIZE));

        store.set(key.clone(), value, None).unwrap();
        prop_assert!(block_on(store.get(&key)).is_some());

        store.clear(&key);
        prop_assert!(block_on(store.get(&key)).is_none());
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    #[test]
    fn prop_ttl_expiration_behavior(key in key_strategy(), value in value_strategy()) {
        let store = CacheStore::<String>::memory_only(&test_config(TEST_MAX_CACHE_SIZE));

        store.set(key.clone(), value.clone(), Some(Duration::from_millis(50))).unwrap();
        prop_assert_eq!(block_on(store.get(&key)), Some(value));

        sleep(Duration::from_millis(80));

        prop_assert!(block_on(store.get(&key)).is_none(), "Entry should be gone after TTL");
        prop_assert_eq!(store.len(), 0);
    }
}

// == Property Test for Error Response Format ==
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // Every error converts to a JSON body with a string "error" field.
    #[test]
    fn prop_error_response_format(error_msg in "[a-zA-Z0-9 _-]{1,100}", status in 400u16..600) {
        use crate::error::{Error, TransportError};
        use axum::body::to_bytes;
        use axum::response::IntoResponse;

        let error_variants = vec![
            Error::InvalidRequest(error_msg.clone()),
            Error::Internal(error_msg.clone()),
            Error::Transport(TransportError::new(status, error_msg.clone())),
            Error::OfflineUnavailable,
        ];

        for error in error_variants {
            let expected_msg = error.to_string();
            let response = error.into_response();

            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok());
            prop_assert!(
                content_type.map(|ct| ct.contains("application/json")).unwrap_or(false),
                "Response should have JSON content-type"
            );

            let bytes = block_on(to_bytes(response.into_body(), usize::MAX)).unwrap();
            let json: serde_json::Value = serde_json::from_slice(&bytes)
                .expect("Response body should be valid JSON");

            prop_assert_eq!(json["error"].as_str(), Some(expected_msg.as_str()));
        }
    }
}

// == Property Test for Concurrent Operation Correctness ==
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // Concurrent tasks only ever read back complete values that some task wrote.
    #[test]
    fn prop_concurrent_operation_correctness(
        initial_entries in prop::collection::vec((key_strategy(), value_strategy()), 1..20),
        operations in prop::collection::vec(cache_op_strategy(), 10..50)
    ) {
        use std::sync::Arc;

        let rt = tokio::runtime::Runtime::new().unwrap();

        let written: HashSet<String> = initial_entries
            .iter()
            .map(|(_, v)| v.clone())
            .chain(operations.iter().filter_map(|op| match op {
                CacheOp::Set { value, .. } => Some(value.clone()),
                _ => None,
            }))
            .collect();

        rt.block_on(async {
            let store = Arc::new(CacheStore::<String>::memory_only(&test_config(TEST_MAX_CACHE_SIZE)));
            for (key, value) in &initial_entries {
                store.set(key.clone(), value.clone(), None).unwrap();
            }

            let mut handles = vec![];
            for op in operations {
                let store = Arc::clone(&store);
                handles.push(tokio::spawn(async move {
                    match op {
                        CacheOp::Set { key, value } => {
                            store.set(key, value, None).unwrap();
                            None
                        }
                        CacheOp::Get { key } => store.get(&key).await,
                        CacheOp::Clear { key } => {
                            store.clear(&key);
                            None
                        }
                    }
                }));
            }

            for handle in handles {
                if let Some(value) = handle.await.expect("Task should not panic") {
                    prop_assert!(written.contains(&value), "Read a value nobody wrote: {}", value);
                }
            }

            let stats = store.stats();
            prop_assert_eq!(stats.entry_count, store.len());
            prop_assert!(stats.total_size <= TEST_MAX_CACHE_SIZE);
            let hit_rate = stats.hit_rate();
            prop_assert!((0.0..=1.0).contains(&hit_rate), "Hit rate out of range: {}", hit_rate);
            Ok(())
        })?;
    }
}

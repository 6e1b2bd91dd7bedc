//! Lost-update resistance and timeout behavior under concurrent load.

use ad_warden::error::EngineError;
use ad_warden::init::on_start;
use ad_warden::stats::{BlockEvent, CounterAggregator};
use ad_warden::store::{MemoryStore, StateStore, Store};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_no_increment_lost_under_concurrency() {
    let store = Store::new(Arc::new(MemoryStore::new()), Duration::from_secs(5));
    on_start(&store).await.unwrap();
    let aggregator = Arc::new(CounterAggregator::new(store));

    let mut handles = Vec::new();
    for i in 0..100 {
        let aggregator = aggregator.clone();
        handles.push(tokio::spawn(async move {
            aggregator
                .record_block(BlockEvent {
                    url: format!("https://ads.example.com/slot/{i}"),
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stats = aggregator.get_stats().await.unwrap();
    assert_eq!(stats.total_blocked, 100);
    assert_eq!(stats.session_blocked, 100);
    assert_eq!(stats.blocked_by_domain.get("ads.example.com"), Some(&100));
}

#[tokio::test]
async fn test_interleaved_domains_sum_correctly() {
    let store = Store::new(Arc::new(MemoryStore::new()), Duration::from_secs(5));
    on_start(&store).await.unwrap();
    let aggregator = Arc::new(CounterAggregator::new(store));

    let mut handles = Vec::new();
    for i in 0..60 {
        let aggregator = aggregator.clone();
        let domain = if i % 2 == 0 { "a.com" } else { "b.com" };
        handles.push(tokio::spawn(async move {
            aggregator
                .record_block(BlockEvent {
                    url: format!("https://{domain}/{i}"),
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stats = aggregator.get_stats().await.unwrap();
    assert_eq!(stats.total_blocked, 60);
    assert_eq!(stats.blocked_by_domain.get("a.com"), Some(&30));
    assert_eq!(stats.blocked_by_domain.get("b.com"), Some(&30));
}

#[tokio::test]
async fn test_reset_is_ordered_against_records() {
    let store = Store::new(Arc::new(MemoryStore::new()), Duration::from_secs(5));
    on_start(&store).await.unwrap();
    let aggregator = Arc::new(CounterAggregator::new(store));

    for i in 0..10 {
        aggregator
            .record_block(BlockEvent {
                url: format!("https://a.com/{i}"),
            })
            .await
            .unwrap();
    }
    aggregator.reset().await.unwrap();

    let stats = aggregator.get_stats().await.unwrap();
    assert_eq!(stats.total_blocked, 0);
    assert_eq!(stats.session_blocked, 0);
    assert!(stats.blocked_by_domain.is_empty());
}

/// Store whose operations never complete, to exercise the timeout bound.
struct HangingStore;

#[async_trait]
impl StateStore for HangingStore {
    async fn get(&self, _keys: &[&str]) -> Result<HashMap<String, Value>> {
        std::future::pending().await
    }

    async fn set(&self, _entries: HashMap<String, Value>) -> Result<()> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_hanging_store_surfaces_timeout() {
    let store = Store::new(Arc::new(HangingStore), Duration::from_millis(50));
    let aggregator = CounterAggregator::new(store);

    let err = aggregator.get_stats().await.unwrap_err();
    assert!(matches!(err, EngineError::StoreTimeout(_)));
}

#[tokio::test]
async fn test_unreachable_store_fails_startup() {
    struct BrokenStore;

    #[async_trait]
    impl StateStore for BrokenStore {
        async fn get(&self, _keys: &[&str]) -> Result<HashMap<String, Value>> {
            anyhow::bail!("disk gone")
        }

        async fn set(&self, _entries: HashMap<String, Value>) -> Result<()> {
            anyhow::bail!("disk gone")
        }
    }

    let store = Store::new(Arc::new(BrokenStore), Duration::from_millis(50));
    let err = on_start(&store).await.unwrap_err();
    assert!(matches!(err, EngineError::StoreUnavailable(_)));
}

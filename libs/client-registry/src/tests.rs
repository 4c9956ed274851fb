use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use commander_api::{BoxFuture, ClientError, Connector, ErrorKind};

use super::*;

/// Handle с номером попытки подключения, в которой он был создан.
#[derive(Debug)]
struct FakeClient {
    attempt: usize,
}

#[derive(Default)]
struct FakeConnector {
    connects: AtomicUsize,
    closes: AtomicUsize,
    /// Сколько первых попыток завершаются ошибкой.
    fail_first: AtomicUsize,
    delay_ms: AtomicU64,
    discover_fails: bool,
}

impl FakeConnector {
    fn failing(n: usize) -> Self {
        let c = Self::default();
        c.fail_first.store(n, Ordering::SeqCst);
        c
    }

    fn slow(ms: u64) -> Self {
        let c = Self::default();
        c.delay_ms.store(ms, Ordering::SeqCst);
        c
    }
}

impl Connector for FakeConnector {
    type Key = String;
    type Handle = Arc<FakeClient>;

    fn connect<'a>(&'a self, key: &'a String) -> BoxFuture<'a, Result<Arc<FakeClient>, ClientError>> {
        Box::pin(async move {
            let attempt = self.connects.fetch_add(1, Ordering::SeqCst);
            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if attempt < self.fail_first.load(Ordering::SeqCst) {
                return Err(ClientError::connect(format!("{key} is down")));
            }
            Ok(Arc::new(FakeClient { attempt }))
        })
    }

    fn close(&self, _handle: Arc<FakeClient>) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn discover(&self) -> BoxFuture<'_, Result<Vec<String>, ClientError>> {
        Box::pin(async move {
            if self.discover_fails {
                Err(ClientError::connect("directory down"))
            } else {
                Ok(vec!["summit_efd".to_string(), "usdf_efd".to_string()])
            }
        })
    }
}

fn registry(connector: FakeConnector) -> ClientRegistry<FakeConnector> {
    ClientRegistry::new(connector, DEFAULT_CONNECT_TIMEOUT)
}

#[tokio::test]
async fn cached_handle_is_reused_without_reconnect() {
    let reg = registry(FakeConnector::default());
    let key = "summit_efd".to_string();

    let first = reg.get_or_connect(&key).await.unwrap();
    let second = reg.get_or_connect(&key).await.unwrap();
    let third = reg.get_or_connect(&key).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &third));
    assert_eq!(reg.connector().connects.load(Ordering::SeqCst), 1);
    assert!(reg.contains(&key).await);
}

#[tokio::test]
async fn failed_connect_is_not_cached_and_is_retried() {
    let reg = registry(FakeConnector::failing(2));
    let key = "summit_efd".to_string();

    let err = reg.get_or_connect(&key).await.unwrap_err();
    assert!(matches!(err, RegistryError::Connect { ref source, .. } if source.kind() == ErrorKind::Connect));
    assert!(!reg.contains(&key).await);

    assert!(reg.get_or_connect(&key).await.is_err());
    assert!(reg.is_empty().await);

    let handle = reg.get_or_connect(&key).await.unwrap();
    assert_eq!(handle.attempt, 2);
    assert_eq!(reg.connector().connects.load(Ordering::SeqCst), 3);
    assert_eq!(reg.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn connect_past_deadline_reports_timeout_and_caches_nothing() {
    let reg = registry(FakeConnector::slow(10_000));
    let key = "summit_efd".to_string();

    let err = reg.get_or_connect(&key).await.unwrap_err();
    match err {
        RegistryError::Timeout { key: k, timeout } => {
            assert_eq!(k, "summit_efd");
            assert_eq!(timeout, DEFAULT_CONNECT_TIMEOUT);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(reg.is_empty().await);

    // Endpoint recovered: the very next call connects.
    reg.connector().delay_ms.store(0, Ordering::SeqCst);
    reg.get_or_connect(&key).await.unwrap();
    assert_eq!(reg.connector().connects.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_first_connects_keep_one_entry() {
    let reg = registry(FakeConnector::slow(100));
    let key = "summit_efd".to_string();

    let (a, b) = tokio::join!(reg.get_or_connect(&key), reg.get_or_connect(&key));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(reg.connector().connects.load(Ordering::SeqCst), 2);
    assert_eq!(reg.connector().closes.load(Ordering::SeqCst), 1);
    assert_eq!(reg.len().await, 1);
}

#[tokio::test]
async fn failures_for_one_key_do_not_touch_others() {
    let reg = registry(FakeConnector::default());
    let good = "summit_efd".to_string();
    reg.get_or_connect(&good).await.unwrap();

    reg.connector().fail_first.store(usize::MAX, Ordering::SeqCst);
    assert!(reg.get_or_connect(&"base_efd".to_string()).await.is_err());

    // cached key still served without reconnect
    reg.get_or_connect(&good).await.unwrap();
    assert_eq!(reg.connector().connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn reset_closes_entry_and_next_call_reconnects() {
    let reg = registry(FakeConnector::default());
    let key = "summit_efd".to_string();

    let first = reg.get_or_connect(&key).await.unwrap();
    assert!(reg.reset(&key).await);
    assert!(!reg.reset(&key).await);
    assert_eq!(reg.connector().closes.load(Ordering::SeqCst), 1);

    let second = reg.get_or_connect(&key).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn close_all_drains_every_entry() {
    let reg = registry(FakeConnector::default());
    for key in ["a", "b", "c"] {
        reg.get_or_connect(&key.to_string()).await.unwrap();
    }
    let mut keys: Vec<String> = reg.entries().await.into_iter().map(|e| e.key).collect();
    keys.sort();
    assert_eq!(keys, ["a", "b", "c"]);

    reg.close_all().await;
    assert!(reg.is_empty().await);
    assert_eq!(reg.connector().closes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn discovery_failure_leaves_cache_alone() {
    let reg = registry(FakeConnector {
        discover_fails: true,
        ..FakeConnector::default()
    });
    let key = "summit_efd".to_string();
    reg.get_or_connect(&key).await.unwrap();

    assert!(reg.list_available_endpoints().await.is_err());
    assert!(reg.contains(&key).await);

    let ok = registry(FakeConnector::default());
    assert_eq!(
        ok.list_available_endpoints().await.unwrap(),
        ["summit_efd", "usdf_efd"]
    );
}

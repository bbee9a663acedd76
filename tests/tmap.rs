mod common;

use std::time::Duration;

use tmap::TMap;
use tokio::time::sleep;

const MS: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i32),
    Text(&'static str),
    Array([i32; 42]),
}

#[tokio::test(start_paused = true)]
async fn mixed_lifetimes_expire_independently() {
    common::init_tracing();
    let map = TMap::new(Duration::ZERO);

    map.store_for("a", Value::Int(42), 10 * MS);
    assert_eq!(map.watchers(), 1);
    assert_eq!(map.load(&"a"), Some(Value::Int(42)));

    map.store_for("b", Value::Text("second"), 80 * MS);
    assert_eq!(map.watchers(), 2);

    map.store("c", Value::Array([0; 42]));
    assert_eq!(map.watchers(), 2, "persistent pair must not add a watcher");

    map.store_for("a", Value::Text("new A"), 50 * MS);
    assert_eq!(map.watchers(), 2);
    assert_eq!(map.load(&"a"), Some(Value::Text("new A")));

    sleep(30 * MS).await;
    assert_eq!(map.watchers(), 2);
    assert_eq!(map.load(&"a"), Some(Value::Text("new A")));
    assert_eq!(map.load(&"b"), Some(Value::Text("second")));

    sleep(40 * MS).await;
    assert_eq!(map.watchers(), 1);
    assert_eq!(map.load(&"a"), None);
    assert_eq!(map.load(&"b"), Some(Value::Text("second")));

    sleep(30 * MS).await;
    assert_eq!(map.watchers(), 0);
    assert_eq!(map.load(&"a"), None);
    assert_eq!(map.load(&"b"), None);
    assert_eq!(map.load(&"c"), Some(Value::Array([0; 42])));
}

#[tokio::test(start_paused = true)]
async fn entry_expires_after_lifetime() {
    let map = TMap::new(Duration::ZERO);
    map.store_for("k", "v", 10 * MS);
    assert_eq!(map.load(&"k"), Some("v"));

    sleep(11 * MS).await;
    assert_eq!(map.load(&"k"), None);
    assert_eq!(map.watchers(), 0);
}

#[tokio::test(start_paused = true)]
async fn replace_keeps_newer_value_past_old_lifetime() {
    let map = TMap::new(Duration::ZERO);
    map.store_for("k", "v1", 10 * MS);
    map.store_for("k", "v2", 40 * MS);
    assert_eq!(map.watchers(), 1);

    sleep(20 * MS).await;
    assert_eq!(map.load(&"k"), Some("v2"));
    assert_eq!(map.watchers(), 1);

    sleep(30 * MS).await;
    assert_eq!(map.load(&"k"), None);
}

#[tokio::test(start_paused = true)]
async fn replace_with_persistent_value_cancels_expiry() {
    let map = TMap::new(Duration::ZERO);
    map.store_for("k", "temporary", 10 * MS);
    map.store("k", "forever");
    assert_eq!(map.watchers(), 0);

    sleep(50 * MS).await;
    assert_eq!(map.load(&"k"), Some("forever"));
}

#[tokio::test]
async fn delete_clears_entry_and_watcher() {
    let map = TMap::new(Duration::ZERO);
    map.store_for("delete me", "as soon as possible", 10 * MS);
    assert_eq!(map.watchers(), 1);

    assert!(map.has_watcher(&"delete me"));

    map.delete(&"delete me");
    assert!(!map.has_watcher(&"delete me"));
    assert_eq!(map.watchers(), 0);
    assert_eq!(map.load(&"delete me"), None);

    map.delete(&"never stored");
}

#[tokio::test]
async fn range_visits_until_halted() {
    let map = TMap::new(Duration::ZERO);
    for i in 0..5 {
        map.store(i, i * 10);
    }

    let mut total = 0;
    map.range(|_, v| {
        total += v;
        true
    });
    assert_eq!(total, 100);

    let mut visited = 0;
    map.range(|_, _| {
        visited += 1;
        false
    });
    assert_eq!(visited, 1);
}

#[tokio::test]
async fn dropping_the_map_stops_watchers() {
    let map = TMap::new(Duration::from_secs(3600));
    map.store("k", 1);
    let observer = map.clone();
    drop(map);
    assert_eq!(observer.watchers(), 1);
    drop(observer);
    // Watchers see their stop senders dropped and exit; nothing to assert
    // beyond the runtime shutting down cleanly.
    tokio::task::yield_now().await;
}

#[test]
fn store_after_runtime_shutdown_leaves_no_watcher() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let map = runtime.block_on(async { TMap::new(Duration::ZERO) });
    drop(runtime);

    map.store_for("k", 1, Duration::from_secs(60));
    assert_eq!(map.load(&"k"), None);
    assert_eq!(map.watchers(), 0);

    map.store("persistent", 2);
    assert_eq!(map.load(&"persistent"), Some(2));
}

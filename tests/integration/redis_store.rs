//! RedisStore against a live server
//!
//! Run with `REDIS_URL=redis://localhost:6379 cargo test -- --ignored`.
//! Every test works on its own due key and removes it afterwards.

use heartbeat::config::RedisConfig;
use heartbeat::monitors::Monitor;
use heartbeat::store::{DueEntry, DueQueue, RedisStore, SNAPSHOT_TTL, SnapshotCache};
use heartbeat::util::{get_redis_url, unix_now};
use pretty_assertions::assert_eq;
use redis::AsyncCommands;
use uuid::Uuid;

struct Live {
    store: RedisStore,
    conn: redis::aio::MultiplexedConnection,
}

impl Live {
    async fn connect() -> Self {
        let config = RedisConfig {
            url: get_redis_url().unwrap_or_else(|| RedisConfig::default().url),
            due_key: format!("heartbeat:test:{}", Uuid::new_v4()),
            ..RedisConfig::default()
        };

        let store = RedisStore::connect(&config).await.unwrap();
        let conn = redis::Client::open(config.url.as_str())
            .unwrap()
            .get_multiplexed_async_connection()
            .await
            .unwrap();

        Self { store, conn }
    }

    async fn cleanup(mut self) {
        let _: () = self.conn.del(self.store.due_key()).await.unwrap();
    }
}

#[tokio::test]
#[ignore = "needs a Redis server at REDIS_URL"]
async fn test_pop_due_orders_by_score_then_member() {
    let live = Live::connect().await;
    let store = &live.store;

    store
        .schedule_batch(&[
            DueEntry::new("c", 20),
            DueEntry::new("b", 10),
            DueEntry::new("a", 10),
        ])
        .await
        .unwrap();

    assert_eq!(
        store.pop_due(2).await.unwrap(),
        vec![DueEntry::new("a", 10), DueEntry::new("b", 10)]
    );
    assert_eq!(store.pop_due(10).await.unwrap(), vec![DueEntry::new("c", 20)]);
    assert!(store.pop_due(10).await.unwrap().is_empty());
    assert!(store.pop_due(0).await.unwrap().is_empty());

    live.cleanup().await;
}

#[tokio::test]
#[ignore = "needs a Redis server at REDIS_URL"]
async fn test_schedule_overwrites_and_unschedule_removes() {
    let live = Live::connect().await;
    let store = &live.store;

    store.schedule("monitor", 100).await.unwrap();
    store.schedule("monitor", 250).await.unwrap();
    store.schedule("other", 300).await.unwrap();
    store.unschedule("other").await.unwrap();

    assert_eq!(store.pop_due(10).await.unwrap(), vec![DueEntry::new("monitor", 250)]);

    live.cleanup().await;
}

#[tokio::test]
#[ignore = "needs a Redis server at REDIS_URL"]
async fn test_reinsert_keeps_scores() {
    let live = Live::connect().await;
    let store = &live.store;
    let now = unix_now();

    let entries = (0..5)
        .map(|offset| DueEntry::new(Uuid::new_v4().to_string(), now + offset * 30))
        .collect::<Vec<_>>();
    store.schedule_batch(&entries).await.unwrap();

    let popped = store.pop_due(entries.len()).await.unwrap();
    assert_eq!(popped, entries);

    // scores survive a reinsert unchanged
    store.schedule_batch(&popped).await.unwrap();
    assert_eq!(store.pop_due(entries.len()).await.unwrap(), entries);

    live.cleanup().await;
}

#[tokio::test]
#[ignore = "needs a Redis server at REDIS_URL"]
async fn test_snapshot_and_incident_marker_expire() {
    let mut live = Live::connect().await;
    let monitor = Monitor::new("https://example.com", 60).with_alert_email("ops@example.com");
    let (monitor_key, incident_key) = (format!("monitor:{}", monitor.id), format!("incident:{}", monitor.id));

    live.store.set_monitor(&monitor).await.unwrap();
    assert_eq!(live.store.get_monitor(monitor.id).await, Some(monitor.clone()));

    let ttl: i64 = live.conn.ttl(&monitor_key).await.unwrap();
    assert!(ttl > 0 && ttl <= SNAPSHOT_TTL.as_secs() as i64);

    live.store.mark_incident(monitor.id, 17).await.unwrap();
    let marker: Option<i64> = live.conn.get(&incident_key).await.unwrap();
    assert_eq!(marker, Some(17));
    let ttl: i64 = live.conn.ttl(&incident_key).await.unwrap();
    assert!(ttl > 0);

    live.store.clear_incident(monitor.id).await.unwrap();
    let marker: Option<i64> = live.conn.get(&incident_key).await.unwrap();
    assert_eq!(marker, None);

    live.store.del_monitor(monitor.id).await.unwrap();
    assert_eq!(live.store.get_monitor(monitor.id).await, None);

    live.cleanup().await;
}

#[tokio::test]
#[ignore = "needs a Redis server at REDIS_URL"]
async fn test_undecodable_snapshot_is_a_miss() {
    let mut live = Live::connect().await;
    let id = Uuid::new_v4();
    let key = format!("monitor:{id}");

    let _: () = live.conn.set_ex(&key, "{not json", 60).await.unwrap();
    assert_eq!(live.store.get_monitor(id).await, None);

    let _: () = live.conn.del(&key).await.unwrap();
    live.cleanup().await;
}

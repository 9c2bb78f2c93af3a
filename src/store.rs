// tracking id -> delivery metadata, kept for the life of the process

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::models::TrackingRecord;

#[async_trait]
pub trait TrackingStore: Send + Sync {
    // Insert or overwrite the record under its tracking id.
    async fn put(&self, record: TrackingRecord) -> Result<(), StoreError>;

    // Unknown ids are Ok(None), not an error.
    async fn get(&self, tracking_id: &str) -> Result<Option<TrackingRecord>, StoreError>;

    // Set opened_at if the record exists and has not been opened yet.
    // Returns the updated record only to the call that performed the
    // transition. Unknown ids and already-opened records yield Ok(None).
    async fn mark_opened(
        &self,
        tracking_id: &str,
        opened_at: i64,
    ) -> Result<Option<TrackingRecord>, StoreError>;

    async fn list(&self) -> Result<Vec<TrackingRecord>, StoreError>;

    // number of records, without copying them
    async fn count(&self) -> Result<usize, StoreError>;
}

#[derive(Default)]
pub struct MemoryTrackingStore {
    records: DashMap<String, TrackingRecord>,
}

impl MemoryTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TrackingStore for MemoryTrackingStore {
    async fn put(&self, record: TrackingRecord) -> Result<(), StoreError> {
        self.records.insert(record.tracking_id.clone(), record);
        Ok(())
    }

    async fn get(&self, tracking_id: &str) -> Result<Option<TrackingRecord>, StoreError> {
        Ok(self.records.get(tracking_id).map(|r| r.value().clone()))
    }

    async fn mark_opened(
        &self,
        tracking_id: &str,
        opened_at: i64,
    ) -> Result<Option<TrackingRecord>, StoreError> {
        // get_mut holds the shard write lock, making check-and-set atomic
        let Some(mut record) = self.records.get_mut(tracking_id) else {
            return Ok(None);
        };
        if record.opened_at.is_some() {
            return Ok(None);
        }
        record.opened_at = Some(opened_at);
        Ok(Some(record.value().clone()))
    }

    async fn list(&self) -> Result<Vec<TrackingRecord>, StoreError> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(id: &str) -> TrackingRecord {
        TrackingRecord::new(id, "dispatch@example.org", "Shelter update", 1_000)
    }

    #[tokio::test]
    async fn unknown_id_is_absent_and_mark_is_noop() {
        let store = MemoryTrackingStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);
        assert_eq!(store.mark_opened("missing", 2_000).await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn put_overwrites_existing_record() {
        let store = MemoryTrackingStore::new();
        store.put(record("a")).await.unwrap();

        let mut replacement = record("a");
        replacement.subject = "Shelter closed".into();
        store.put(replacement).await.unwrap();

        assert_eq!(store.len(), 1);
        let stored = store.get("a").await.unwrap().unwrap();
        assert_eq!(stored.subject, "Shelter closed");
    }

    #[tokio::test]
    async fn first_open_wins() {
        let store = MemoryTrackingStore::new();
        store.put(record("a")).await.unwrap();

        let first = store.mark_opened("a", 2_000).await.unwrap();
        assert_eq!(first.map(|r| r.opened_at), Some(Some(2_000)));

        assert_eq!(store.mark_opened("a", 3_000).await.unwrap(), None);
        let stored = store.get("a").await.unwrap().unwrap();
        assert_eq!(stored.opened_at, Some(2_000));
        assert_eq!(stored.sent_at, 1_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_opens_keep_one_timestamp() {
        let store = Arc::new(MemoryTrackingStore::new());
        store.put(record("race")).await.unwrap();

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.mark_opened("race", 10_000 + i).await.unwrap() })
            })
            .collect();

        let mut winners = Vec::new();
        for task in tasks {
            if let Some(r) = task.await.unwrap() {
                winners.push(r);
            }
        }

        assert_eq!(winners.len(), 1);
        let stored = store.get("race").await.unwrap().unwrap();
        assert_eq!(stored.opened_at, winners[0].opened_at);
    }

    #[tokio::test]
    async fn list_returns_every_record() {
        let store = MemoryTrackingStore::new();
        store.put(record("a")).await.unwrap();
        store.put(record("b")).await.unwrap();

        let mut ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.tracking_id)
            .collect();
        ids.sort();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn count_ignores_overwrites() {
        let store = MemoryTrackingStore::new();
        assert_eq!(store.count().await.unwrap(), 0);

        store.put(record("a")).await.unwrap();
        store.put(record("a")).await.unwrap();
        store.put(record("b")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }
}

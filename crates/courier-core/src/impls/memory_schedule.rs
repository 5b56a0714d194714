//! InMemoryScheduleStore - 定期スケジュール表のインメモリ実装

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{PipelineError, Subject};
use crate::ports::{ScheduleEntry, ScheduleStore};

#[derive(Default)]
pub struct InMemoryScheduleStore {
    entries: Mutex<BTreeMap<Subject, ScheduleEntry>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn arm(&self, entry: ScheduleEntry) -> Result<bool, PipelineError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&entry.subject) {
            return Ok(false);
        }
        entries.insert(entry.subject, entry);
        Ok(true)
    }

    async fn disarm(&self, subject: Subject) -> Result<bool, PipelineError> {
        Ok(self.entries.lock().await.remove(&subject).is_some())
    }

    async fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduleEntry>, PipelineError> {
        let mut entries = self.entries.lock().await;
        let mut due = Vec::new();
        for entry in entries.values_mut() {
            if !entry.is_due(now) {
                continue;
            }
            due.push(entry.clone());
            entry.next_fire_at = entry.following_fire_at(now);
            entry.fire_count += 1;
        }
        Ok(due)
    }

    async fn get(&self, subject: Subject) -> Result<Option<ScheduleEntry>, PipelineError> {
        Ok(self.entries.lock().await.get(&subject).cloned())
    }

    async fn list(&self) -> Result<Vec<ScheduleEntry>, PipelineError> {
        Ok(self.entries.lock().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChannelId, ContentId};
    use chrono::TimeZone;
    use ulid::Ulid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn hourly(subject: Subject, first: DateTime<Utc>) -> ScheduleEntry {
        ScheduleEntry::new(subject, 3600, first, t0())
    }

    #[tokio::test]
    async fn arm_is_idempotent() {
        let store = InMemoryScheduleStore::new();
        let subject = Subject::Channel(ChannelId::from_ulid(Ulid::new()));

        assert!(store.arm(hourly(subject, t0())).await.unwrap());
        let later = t0() + chrono::Duration::hours(5);
        assert!(!store.arm(hourly(subject, later)).await.unwrap());

        // the first arming wins
        let entry = store.get(subject).await.unwrap().unwrap();
        assert_eq!(entry.next_fire_at, t0());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn claim_due_advances_each_entry_once() {
        let store = InMemoryScheduleStore::new();
        let due = Subject::Content(ContentId::from_ulid(Ulid::new()));
        let not_yet = Subject::Content(ContentId::from_ulid(Ulid::new()));
        store.arm(hourly(due, t0())).await.unwrap();
        store
            .arm(hourly(not_yet, t0() + chrono::Duration::hours(1)))
            .await
            .unwrap();

        let claimed = store.claim_due(t0()).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].subject, due);

        // same instant again: nothing left to fire
        assert!(store.claim_due(t0()).await.unwrap().is_empty());

        let entry = store.get(due).await.unwrap().unwrap();
        assert_eq!(entry.next_fire_at, t0() + chrono::Duration::hours(1));
        assert_eq!(entry.fire_count, 1);
    }

    #[tokio::test]
    async fn disarm_stops_firing() {
        let store = InMemoryScheduleStore::new();
        let subject = Subject::Channel(ChannelId::from_ulid(Ulid::new()));
        store.arm(hourly(subject, t0())).await.unwrap();

        assert!(store.disarm(subject).await.unwrap());
        assert!(!store.disarm(subject).await.unwrap());
        assert!(store.claim_due(t0()).await.unwrap().is_empty());
    }
}

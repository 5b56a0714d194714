//! ScheduleStore port - 定期実行の永続スケジュール表
//!
//! 自分自身を再投入し続けるタスクの代わりに、`next_fire_at` 列を持つ
//! エントリを保存し、単一の sweeper が期限の来たものを拾います。
//! 再起動後も残り、`list` で観測でき、`disarm` で止められます。

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{PipelineError, Subject};

/// One recurring obligation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub subject: Subject,
    pub interval_secs: u64,
    pub next_fire_at: DateTime<Utc>,
    pub armed_at: DateTime<Utc>,
    /// How many times the sweeper has fired this entry.
    pub fire_count: u64,
}

impl ScheduleEntry {
    pub fn new(
        subject: Subject,
        interval_secs: u64,
        first_fire_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            subject,
            interval_secs,
            next_fire_at: first_fire_at,
            armed_at: now,
            fire_count: 0,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_fire_at <= now
    }

    /// Next slot strictly after `now`; missed slots are skipped, not replayed.
    /// Saturates at `DateTime::MAX_UTC` instead of overflowing.
    pub fn following_fire_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let interval = seconds(self.interval_secs.max(1));
        let next = self
            .next_fire_at
            .checked_add_signed(interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if next > now {
            return next;
        }
        let behind = (now - next).num_seconds() / interval.num_seconds() + 1;
        i32::try_from(behind)
            .ok()
            .and_then(|n| interval.checked_mul(n))
            .and_then(|skip| next.checked_add_signed(skip))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// `secs` as a `TimeDelta`, clamped to the largest representable one.
pub(crate) fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Install an entry. Idempotent: an existing entry for the subject is kept
    /// as is and `false` is returned.
    async fn arm(&self, entry: ScheduleEntry) -> Result<bool, PipelineError>;

    /// Remove the entry for `subject`. Returns whether one existed.
    async fn disarm(&self, subject: Subject) -> Result<bool, PipelineError>;

    /// Return entries due at `now` and advance each one's `next_fire_at`
    /// in the same step, so two sweepers never fire the same slot.
    async fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduleEntry>, PipelineError>;

    async fn get(&self, subject: Subject) -> Result<Option<ScheduleEntry>, PipelineError>;

    async fn list(&self) -> Result<Vec<ScheduleEntry>, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChannelId;
    use chrono::TimeZone;
    use ulid::Ulid;

    fn entry(first: DateTime<Utc>) -> ScheduleEntry {
        ScheduleEntry::new(
            Subject::Channel(ChannelId::from_ulid(Ulid::new())),
            3600,
            first,
            first,
        )
    }

    #[test]
    fn next_slot_follows_interval() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let e = entry(t0);
        assert_eq!(e.following_fire_at(t0), t0 + chrono::Duration::hours(1));
    }

    #[test]
    fn missed_slots_are_skipped() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let e = entry(t0);
        // sweeper was down for 3.5 hours
        let now = t0 + chrono::Duration::minutes(210);
        assert_eq!(e.following_fire_at(now), t0 + chrono::Duration::hours(4));
    }

    #[test]
    fn huge_interval_saturates_instead_of_panicking() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut e = entry(t0);
        e.interval_secs = u64::MAX;
        assert_eq!(e.following_fire_at(t0), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn long_outage_with_tiny_interval_still_lands_after_now() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut e = entry(t0);
        e.interval_secs = 1;
        let now = t0 + chrono::Duration::days(90);
        let next = e.following_fire_at(now);
        assert!(next > now);
        assert!(next <= now + chrono::Duration::seconds(1));
    }
}

//! Precondition skips: logged with structured fields and counted per reason.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use tracing::warn;

use crate::domain::{ContentStatus, Outcome};

/// Why a handler chose to do nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SkipReason {
    ContentMissing,
    NotApproved,
    NotScheduled,
    NotPublished,
    ChannelMissing,
    ChannelInactive,
    /// Another worker moved the item first.
    LostRace,
    /// A different task owns the delivery.
    ClaimedElsewhere,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::ContentMissing => "content_missing",
            SkipReason::NotApproved => "not_approved",
            SkipReason::NotScheduled => "not_scheduled",
            SkipReason::NotPublished => "not_published",
            SkipReason::ChannelMissing => "channel_missing",
            SkipReason::ChannelInactive => "channel_inactive",
            SkipReason::LostRace => "lost_race",
            SkipReason::ClaimedElsewhere => "claimed_elsewhere",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct SkipLog {
    counts: Mutex<BTreeMap<SkipReason, u64>>,
}

impl SkipLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and count a skip, returning the outcome the handler reports.
    pub fn record(
        &self,
        task: &'static str,
        subject: impl fmt::Display,
        status: Option<ContentStatus>,
        reason: SkipReason,
    ) -> Outcome {
        warn!(
            task,
            subject = %subject,
            status = status.map(ContentStatus::as_str),
            reason = reason.as_str(),
            "precondition failed, skipping"
        );
        let mut counts = self.counts.lock().unwrap_or_else(|p| p.into_inner());
        *counts.entry(reason).or_default() += 1;
        Outcome::skipped(reason.as_str())
    }

    pub fn count(&self, reason: SkipReason) -> u64 {
        let counts = self.counts.lock().unwrap_or_else(|p| p.into_inner());
        counts.get(&reason).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> BTreeMap<String, u64> {
        let counts = self.counts.lock().unwrap_or_else(|p| p.into_inner());
        counts
            .iter()
            .map(|(reason, n)| (reason.as_str().to_string(), *n))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OutcomeKind;

    #[test]
    fn record_counts_per_reason() {
        let log = SkipLog::new();
        let outcome = log.record("dispatch", "content-x", Some(ContentStatus::Draft), SkipReason::NotApproved);
        log.record("dispatch", "content-y", None, SkipReason::NotApproved);
        log.record("publish", "content-z", None, SkipReason::ContentMissing);

        assert_eq!(outcome.kind, OutcomeKind::Skipped);
        assert_eq!(outcome.reason.as_deref(), Some("not_approved"));
        assert_eq!(log.count(SkipReason::NotApproved), 2);
        assert_eq!(log.counts().get("content_missing"), Some(&1));
        assert_eq!(log.count(SkipReason::LostRace), 0);
    }
}

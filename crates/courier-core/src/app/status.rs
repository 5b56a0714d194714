//! Status - 運用者向けのパイプライン状況
//!
//! キューの状態別件数、skip 理由ごとの件数、定期スケジュールの一覧をまとめます。

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{ContentStatus, LifecycleEvent, PipelineError, allowed_events};
use crate::pipeline::SkipLog;
use crate::ports::{ScheduleEntry, ScheduleStore};
use crate::queue::{Queue, QueueCounts};

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub queue: QueueCounts,
    pub skips: BTreeMap<String, u64>,
    pub schedules: Vec<ScheduleEntry>,
}

impl PipelineStatus {
    pub async fn collect(
        queue: &dyn Queue,
        schedules: &dyn ScheduleStore,
        skips: &SkipLog,
    ) -> Result<Self, PipelineError> {
        let queue = queue
            .counts_by_state()
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        Ok(Self {
            queue,
            skips: skips.counts(),
            schedules: schedules.list().await?,
        })
    }
}

/// What an item in `status` may do next, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleView {
    pub status: ContentStatus,
    pub terminal: bool,
    pub accepts: Vec<LifecycleEvent>,
}

impl LifecycleView {
    pub fn of(status: ContentStatus) -> Self {
        Self {
            status,
            terminal: status.is_terminal(),
            accepts: allowed_events(status),
        }
    }
}

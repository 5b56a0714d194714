//! ScheduleSweeper - 定期スケジュール表を走査して poll タスクを投入する
//!
//! 期限の来たエントリは `claim_due` が `next_fire_at` を進めてから返すので、
//! 同じスロットが二度投入されることはありません。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::domain::{PipelineError, Subject, Trigger};
use crate::pipeline::enqueue_task;
use crate::ports::{Clock, ScheduleStore};
use crate::queue::Queue;
use crate::typed::{PollChannelMetrics, PollContentMetrics};

pub struct ScheduleSweeper {
    schedules: Arc<dyn ScheduleStore>,
    queue: Arc<dyn Queue>,
    clock: Arc<dyn Clock>,
}

impl ScheduleSweeper {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        queue: Arc<dyn Queue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            schedules,
            queue,
            clock,
        }
    }

    /// Enqueue a poll for every entry due at `now`. Returns how many fired.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<usize, PipelineError> {
        let due = self.schedules.claim_due(now).await?;
        for entry in &due {
            let task_id = match entry.subject {
                Subject::Content(content_id) => {
                    enqueue_task(
                        self.queue.as_ref(),
                        &PollContentMetrics { content_id },
                        Trigger::Now,
                    )
                    .await?
                }
                Subject::Channel(channel_id) => {
                    enqueue_task(
                        self.queue.as_ref(),
                        &PollChannelMetrics { channel_id },
                        Trigger::Now,
                    )
                    .await?
                }
            };
            debug!(subject = %entry.subject, %task_id, fire_count = entry.fire_count + 1, "poll enqueued");
        }
        Ok(due.len())
    }

    /// Sweep every `every` until shutdown is requested.
    pub fn spawn(self, every: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep_once(self.clock.now()).await {
                            error!(error = %e, "schedule sweep failed");
                        }
                    }
                }
            }
            info!("schedule sweeper stopped");
        });
        SweeperHandle { shutdown_tx, join }
    }
}

pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn shutdown_and_join(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "sweeper task panicked");
        }
    }
}

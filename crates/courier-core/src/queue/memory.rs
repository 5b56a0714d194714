//! In-memory queue implementation.
//!
//! 遅延タスク（eta / countdown / retry backoff）は発火時刻の min-heap に入り、
//! 時刻が来たら ready キューへ昇格します。ワーカーは Notify か
//! 次の発火時刻のどちらか早い方まで待機します（スレッドはブロックしない）。

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use super::{QueueCounts, RetryPolicy, TaskRecord, TaskState};
use crate::domain::{
    Decider, Decision, DecisionRecord, DefaultDecider, Outcome, OutcomeKind, PipelineError,
    TaskEnvelope, TaskId, TaskType, Trigger,
};
use crate::ports::{Clock, IdGenerator, UlidGenerator};
use crate::queue::{Queue, QueueError, TaskLease};

/// Scheduled task entry for priority queue.
///
/// We use Reverse ordering so BinaryHeap acts as a min-heap (earliest first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledTask {
    wake_at: Instant,
    task_id: TaskId,
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse ordering: earlier times have higher priority
        other
            .wake_at
            .cmp(&self.wake_at)
            .then_with(|| other.task_id.cmp(&self.task_id))
    }
}

#[derive(Default)]
struct InMemoryQueueState {
    /// All task records (single source of truth for tasks).
    records: HashMap<TaskId, TaskRecord>,

    /// Ready queue (TaskIds only).
    ready: VecDeque<TaskId>,

    /// Delayed and retry-scheduled tasks.
    scheduled: BinaryHeap<ScheduledTask>,

    decisions: Vec<DecisionRecord>,
}

impl InMemoryQueueState {
    /// Move tasks from scheduled to ready if their time has come.
    fn promote_scheduled_tasks(&mut self, now: DateTime<Utc>) {
        let instant_now = Instant::now();
        while let Some(entry) = self.scheduled.peek() {
            if entry.wake_at > instant_now {
                break; // Heap is sorted, so we can stop
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            if let Some(record) = self.records.get_mut(&entry.task_id)
                && record.state.is_waiting()
            {
                record.requeue(now);
                self.ready.push_back(entry.task_id);
            }
        }
    }

    fn counts_by_state(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for record in self.records.values() {
            match record.state {
                TaskState::Delayed => counts.delayed += 1,
                TaskState::Queued => counts.queued += 1,
                TaskState::Running => counts.running += 1,
                TaskState::Succeeded if record.last_outcome == Some(OutcomeKind::Skipped) => {
                    counts.skipped += 1
                }
                TaskState::Succeeded => counts.succeeded += 1,
                TaskState::RetryScheduled => counts.retry_scheduled += 1,
                TaskState::Dead => counts.dead += 1,
            }
        }
        counts
    }
}

/// In-memory queue implementation.
pub struct InMemoryQueue {
    state: Arc<Mutex<InMemoryQueueState>>,
    notify: Arc<Notify>,
    decider: Arc<dyn Decider>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    max_attempts: u32,
}

impl InMemoryQueue {
    pub fn new(retry_policy: RetryPolicy, max_attempts: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryQueueState::default())),
            notify: Arc::new(Notify::new()),
            decider: Arc::new(DefaultDecider::new(retry_policy)),
            ids: Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn with_decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = decider;
        self
    }

    pub async fn get(&self, task_id: TaskId) -> Option<TaskRecord> {
        let state = self.state.lock().await;
        state.records.get(&task_id).cloned()
    }

    /// All tasks ordered by fire time.
    pub async fn tasks(&self) -> Vec<TaskRecord> {
        let state = self.state.lock().await;
        let mut tasks: Vec<TaskRecord> = state.records.values().cloned().collect();
        tasks.sort_by_key(|r| (r.fire_at, r.envelope.task_id()));
        tasks
    }

    pub async fn tasks_of_type(&self, task_type: &str) -> Vec<TaskRecord> {
        self.tasks()
            .await
            .into_iter()
            .filter(|r| r.envelope.task_type().as_str() == task_type)
            .collect()
    }

    pub async fn decisions(&self) -> Vec<DecisionRecord> {
        let state = self.state.lock().await;
        state.decisions.clone()
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(
        &self,
        task_type: TaskType,
        payload: serde_json::Value,
        trigger: Trigger,
    ) -> Result<TaskId, QueueError> {
        let now = self.clock.now();
        let task_id = self.ids.generate_task_id();
        let envelope = TaskEnvelope::new(task_id, task_type, payload);
        let mut record = TaskRecord::new(envelope, self.max_attempts, now);
        let delay = trigger.delay_from(now);

        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            if delay.is_zero() {
                state.ready.push_back(task_id);
            } else {
                record.delay_until(trigger.fire_at(now));
                state.scheduled.push(ScheduledTask {
                    wake_at: Instant::now() + delay,
                    task_id,
                });
            }
            debug!(
                %task_id,
                task_type = %record.envelope.task_type(),
                fire_at = %record.fire_at,
                "task enqueued"
            );
            state.records.insert(task_id, record);
        }

        // 待機中のワーカーに通知（遅延タスクなら待機時刻の再計算を促す）
        self.notify.notify_one();
        Ok(task_id)
    }

    async fn lease(&self) -> Option<Box<dyn TaskLease>> {
        loop {
            let next_wake = {
                let mut guard = self.state.lock().await;
                let state = &mut *guard;
                let now = self.clock.now();
                state.promote_scheduled_tasks(now);

                let mut leased = None;
                while let Some(task_id) = state.ready.pop_front() {
                    if let Some(record) = state.records.get_mut(&task_id) {
                        record.start_attempt(now);
                        leased = Some(InMemoryLease {
                            task_id,
                            envelope: record.envelope.clone(),
                            attempt: record.attempts,
                            max_attempts: record.max_attempts,
                            queue: Arc::clone(&self.state),
                            notify: Arc::clone(&self.notify),
                            decider: Arc::clone(&self.decider),
                            clock: Arc::clone(&self.clock),
                        });
                        break;
                    }
                }

                if let Some(lease) = leased {
                    let more_ready = !state.ready.is_empty();
                    drop(guard);
                    if more_ready {
                        self.notify.notify_one();
                    }
                    return Some(Box::new(lease));
                }

                // No ready tasks - check if we have scheduled tasks
                state.scheduled.peek().map(|entry| entry.wake_at)
            };

            // Wait for notification OR next scheduled task time
            if let Some(wake_at) = next_wake {
                tokio::select! {
                    _ = self.notify.notified() => {},
                    _ = tokio::time::sleep_until(wake_at) => {},
                }
            } else {
                self.notify.notified().await;
            }
        }
    }

    async fn counts_by_state(&self) -> Result<QueueCounts, QueueError> {
        let state = self.state.lock().await;
        Ok(state.counts_by_state())
    }
}

/// Lease implementation for InMemoryQueue.
struct InMemoryLease {
    task_id: TaskId,
    envelope: TaskEnvelope,
    attempt: u32,
    max_attempts: u32,
    queue: Arc<Mutex<InMemoryQueueState>>,
    notify: Arc<Notify>,
    decider: Arc<dyn Decider>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl TaskLease for InMemoryLease {
    fn envelope(&self) -> &TaskEnvelope {
        &self.envelope
    }

    fn attempt(&self) -> u32 {
        self.attempt
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    async fn ack(self: Box<Self>, outcome: &Outcome) -> Result<(), QueueError> {
        let now = self.clock.now();
        let mut state = self.queue.lock().await;
        let record = state
            .records
            .get_mut(&self.task_id)
            .ok_or(QueueError::TaskNotFound(self.task_id))?;
        if record.state != TaskState::Running {
            return Err(QueueError::NotRunning {
                task_id: self.task_id,
                state: record.state,
            });
        }
        record.mark_succeeded(outcome.kind, now);
        Ok(())
    }

    async fn fail(self: Box<Self>, error: &PipelineError) -> Result<Decision, QueueError> {
        let now = self.clock.now();
        let message = error.to_string();

        let decision = {
            let mut guard = self.queue.lock().await;
            let state = &mut *guard;
            let record = state
                .records
                .get_mut(&self.task_id)
                .ok_or(QueueError::TaskNotFound(self.task_id))?;
            if record.state != TaskState::Running {
                return Err(QueueError::NotRunning {
                    task_id: self.task_id,
                    state: record.state,
                });
            }

            let decision = self.decider.decide(record, error.kind());
            let trigger = serde_json::json!({
                "error": message,
                "attempts": record.attempts,
                "max_attempts": record.max_attempts,
                "retryable": error.is_retryable(),
            });

            let context = match &decision {
                Decision::Retry { delay, .. } => {
                    let fire_at = Trigger::After(*delay).fire_at(now);
                    record.schedule_retry(fire_at, message.clone(), now);
                    state.scheduled.push(ScheduledTask {
                        wake_at: Instant::now() + *delay,
                        task_id: self.task_id,
                    });
                    Some(serde_json::json!({
                        "delay_secs": delay.as_secs_f64(),
                        "next_run_at": fire_at.to_rfc3339(),
                    }))
                }
                Decision::MarkDead { reason } => {
                    record.mark_dead(message.clone(), now);
                    Some(serde_json::json!({ "reason": reason }))
                }
            };

            state.decisions.push(DecisionRecord::new(
                self.task_id,
                trigger,
                "retry_policy",
                decision.label(),
                context,
                now,
            ));
            decision
        }; // Lock released here

        // Notify outside the lock
        if matches!(decision, Decision::Retry { .. }) {
            self.notify.notify_one();
        }

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use std::time::Duration;

    fn queue() -> InMemoryQueue {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        InMemoryQueue::new(RetryPolicy::default(), 3, clock)
    }

    async fn enqueue_now(queue: &InMemoryQueue) -> TaskId {
        queue
            .enqueue(TaskType::new("test"), serde_json::json!({}), Trigger::Now)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn enqueue_and_counts() {
        let queue = queue();
        enqueue_now(&queue).await;

        let counts = queue.counts_by_state().await.unwrap();
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.running, 0);
    }

    #[tokio::test]
    async fn lease_transitions_to_running() {
        let queue = queue();
        enqueue_now(&queue).await;

        let lease = tokio::time::timeout(Duration::from_millis(100), queue.lease())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(lease.envelope().task_type().as_str(), "test");
        assert_eq!(lease.attempt(), 1);

        let counts = queue.counts_by_state().await.unwrap();
        assert_eq!(counts.queued, 0);
        assert_eq!(counts.running, 1);
    }

    #[tokio::test]
    async fn ack_distinguishes_success_from_skip() {
        let queue = queue();
        enqueue_now(&queue).await;
        enqueue_now(&queue).await;

        queue.lease().await.unwrap().ack(&Outcome::success()).await.unwrap();
        queue
            .lease()
            .await
            .unwrap()
            .ack(&Outcome::skipped("stale"))
            .await
            .unwrap();

        let counts = queue.counts_by_state().await.unwrap();
        assert_eq!(counts.succeeded, 1);
        assert_eq!(counts.skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_task_is_invisible_until_eta() {
        let queue = queue();
        let task_id = queue
            .enqueue(
                TaskType::new("later"),
                serde_json::json!({}),
                Trigger::After(Duration::from_secs(3600)),
            )
            .await
            .unwrap();

        assert_eq!(queue.counts_by_state().await.unwrap().delayed, 1);

        let early = tokio::time::timeout(Duration::from_secs(3599), queue.lease()).await;
        assert!(early.is_err(), "task leased before its fire time");

        let lease = queue.lease().await.unwrap();
        assert_eq!(lease.envelope().task_id(), task_id);
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_eta_enqueued_later_fires_first() {
        let queue = queue();
        queue
            .enqueue(
                TaskType::new("late"),
                serde_json::json!({}),
                Trigger::After(Duration::from_secs(600)),
            )
            .await
            .unwrap();
        queue
            .enqueue(
                TaskType::new("soon"),
                serde_json::json!({}),
                Trigger::After(Duration::from_secs(60)),
            )
            .await
            .unwrap();

        let first = queue.lease().await.unwrap();
        assert_eq!(first.envelope().task_type().as_str(), "soon");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_schedules_retry() {
        let queue = queue();
        let task_id = enqueue_now(&queue).await;

        let lease = queue.lease().await.unwrap();
        let decision = lease
            .fail(&PipelineError::Delivery("timeout".into()))
            .await
            .unwrap();
        assert!(matches!(decision, Decision::Retry { .. }));

        let record = queue.get(task_id).await.unwrap();
        assert_eq!(record.state, TaskState::RetryScheduled);

        let decisions = queue.decisions().await;
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].policy, "retry_policy");
        assert_eq!(decisions[0].decision, "schedule_retry");
        assert_eq!(decisions[0].trigger["error"], "delivery failed: timeout");

        // same task id comes back after the backoff
        let retry = queue.lease().await.unwrap();
        assert_eq!(retry.envelope().task_id(), task_id);
        assert_eq!(retry.attempt(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_mark_dead() {
        let queue = queue();
        let task_id = enqueue_now(&queue).await;

        for _ in 0..3 {
            let lease = queue.lease().await.unwrap();
            lease
                .fail(&PipelineError::Generation("503".into()))
                .await
                .unwrap();
        }

        let record = queue.get(task_id).await.unwrap();
        assert_eq!(record.state, TaskState::Dead);
        assert_eq!(record.attempts, 3);

        let decisions = queue.decisions().await;
        assert_eq!(decisions.last().unwrap().decision, "mark_dead");
        assert_eq!(decisions.last().unwrap().trigger["max_attempts"], 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_dead_immediately() {
        let queue = queue();
        let task_id = enqueue_now(&queue).await;

        let lease = queue.lease().await.unwrap();
        lease
            .fail(&PipelineError::Decode {
                task_type: "test".into(),
                message: "missing field".into(),
            })
            .await
            .unwrap();

        assert_eq!(queue.get(task_id).await.unwrap().state, TaskState::Dead);
    }
}

//! WorkerLoop - タスク実行ループ
//!
//! lease → Runtime で実行 → ack / fail（retry か dead かは queue が決める）

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::runtime::Runtime;
use crate::domain::Decision;
use crate::queue::{Queue, TaskLease};
use crate::typed::AttemptContext;

/// Worker group handle.
/// - `request_shutdown()` でワーカー全体が新しい lease を取らなくなる
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, queue: Arc<dyn Queue>, runtime: Arc<Runtime>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let rt = Arc::clone(&runtime);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, q, rt, &mut rx).await;
            });
            joins.push(join);
        }

        info!(workers = n, "worker group started");
        Self { shutdown_tx, joins }
    }

    /// Request shutdown for all workers.
    /// In-flight handler execution is not cancelled; workers just stop
    /// taking new leases.
    pub fn request_shutdown(&self) {
        // receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            if let Err(e) = j.await {
                error!(error = %e, "worker task panicked");
            }
        }
        info!("worker group stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<dyn Queue>,
    runtime: Arc<Runtime>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease は待つ可能性があるので select で shutdown と競合させる
        let lease = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            lease = queue.lease() => lease,
        };

        let Some(lease) = lease else {
            tokio::task::yield_now().await;
            continue;
        };

        run_one(worker_id, &runtime, lease).await;
    }
    debug!(worker_id, "worker stopped");
}

/// Execute a leased task and report the result back to the queue.
pub(crate) async fn run_one(worker_id: usize, runtime: &Runtime, lease: Box<dyn TaskLease>) {
    // handler 実行に必要な分だけ owned にする（Queue のロックは lease() の中で完結）
    let envelope = lease.envelope().clone();
    let ctx = AttemptContext {
        task_id: envelope.task_id(),
        attempt: lease.attempt(),
        max_attempts: lease.max_attempts(),
    };
    let task_id = envelope.task_id();
    let task_type = envelope.task_type().as_str();
    debug!(worker_id, %task_id, task_type, attempt = ctx.attempt, "task leased");

    match runtime.execute(&envelope, &ctx).await {
        Ok(outcome) => {
            if let Err(e) = lease.ack(&outcome).await {
                error!(worker_id, %task_id, error = %e, "ack failed");
            }
        }
        Err(err) => match lease.fail(&err).await {
            Ok(Decision::Retry { delay, .. }) => {
                warn!(
                    worker_id,
                    %task_id,
                    task_type,
                    attempt = ctx.attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "task failed, retry scheduled"
                );
            }
            Ok(Decision::MarkDead { reason }) => {
                error!(
                    worker_id,
                    %task_id,
                    task_type,
                    attempt = ctx.attempt,
                    %reason,
                    error = %err,
                    "task dead"
                );
            }
            Err(e) => error!(worker_id, %task_id, error = %e, "fail report failed"),
        },
    }
}

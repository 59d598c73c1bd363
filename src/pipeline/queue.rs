//! Job queue and worker pool for report processing.
//!
//! `JobQueue` is a bounded mpsc channel plus an in-flight set keyed by report
//! id, so a report is queued or running at most once. `WorkerPool` runs N
//! tokio tasks that share the receiver and drive each job to a terminal
//! status.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::error::{JobStage, PipelineError};
use super::job::{run_report_job, JobContext};
use crate::db::{self, repository};
use crate::models::enums::ProcessingStatus;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Job queue is closed")]
    Closed,

    #[error("Job queue is full and no runtime is available to defer the job")]
    Full,

    #[error("Job queue lock poisoned")]
    LockPoisoned,
}

/// One unit of work: process this report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportJob {
    pub report_id: Uuid,
}

/// Sending side of the report pipeline. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<ReportJob>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    closed: Arc<AtomicBool>,
}

impl JobQueue {
    /// Queue a report for processing without waiting for it.
    ///
    /// Returns `Ok(false)` when the report is already queued or running.
    /// A full channel defers the send to a background task instead of
    /// blocking the caller.
    pub fn enqueue(&self, report_id: Uuid) -> Result<bool, QueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        {
            let mut in_flight = self.in_flight.lock().map_err(|_| QueueError::LockPoisoned)?;
            if !in_flight.insert(report_id) {
                return Ok(false);
            }
        }

        let job = ReportJob { report_id };
        match self.sender.try_send(job) {
            Ok(()) => {
                tracing::debug!(report_id = %report_id, "Report job enqueued");
                Ok(true)
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                let Ok(handle) = tokio::runtime::Handle::try_current() else {
                    self.finish(&report_id);
                    return Err(QueueError::Full);
                };
                tracing::warn!(report_id = %report_id, "Job queue full, deferring enqueue");
                let sender = self.sender.clone();
                let queue = self.clone();
                handle.spawn(async move {
                    if sender.send(job).await.is_err() {
                        // Report stays pending; startup recovery picks it up.
                        queue.finish(&job.report_id);
                        tracing::warn!(report_id = %job.report_id, "Job queue closed before deferred enqueue");
                    }
                });
                Ok(true)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.finish(&report_id);
                Err(QueueError::Closed)
            }
        }
    }

    /// Number of reports queued or running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn finish(&self, report_id: &Uuid) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(report_id);
        }
    }
}

/// Handle to the running workers.
///
/// `shutdown()` stops intake; jobs already running finish. Jobs still queued
/// stay `pending` in the database and are re-enqueued by startup recovery.
pub struct WorkerPool {
    queue: JobQueue,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks (at least one) on the current runtime.
    pub fn start(ctx: JobContext, workers: usize, capacity: usize) -> (JobQueue, WorkerPool) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let queue = JobQueue {
            sender,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            closed: Arc::new(AtomicBool::new(false)),
        };
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let count = workers.max(1);
        let handles = (0..count)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    ctx.clone(),
                    queue.clone(),
                    Arc::clone(&receiver),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        tracing::info!(
            workers = count,
            capacity = capacity.max(1),
            extraction_timeout_secs = ctx.extraction_timeout.as_secs(),
            "Report worker pool started"
        );

        let pool = WorkerPool {
            queue: queue.clone(),
            shutdown,
            workers: handles,
        };
        (queue, pool)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop intake and wait for running jobs to reach a terminal status.
    pub async fn shutdown(self) {
        self.queue.closed.store(true, Ordering::Release);
        let _ = self.shutdown.send(true);
        for handle in self.workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Report worker ended abnormally");
            }
        }
        tracing::info!("Report worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    ctx: JobContext,
    queue: JobQueue,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<ReportJob>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::debug!(worker_id, "Report worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        let job = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            job = next_job(&receiver) => match job {
                Some(job) => job,
                None => break,
            },
        };

        let outcome = run_report_job(&ctx, job.report_id).await;
        queue.finish(&job.report_id);
        tracing::debug!(
            worker_id,
            report_id = %job.report_id,
            outcome = ?outcome,
            "Report worker finished job"
        );
    }
    tracing::debug!(worker_id, "Report worker stopped");
}

async fn next_job(receiver: &tokio::sync::Mutex<mpsc::Receiver<ReportJob>>) -> Option<ReportJob> {
    receiver.lock().await.recv().await
}

/// What startup recovery did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    pub failed_interrupted: usize,
    pub requeued_pending: usize,
}

/// Startup recovery: reports left mid-pipeline by a crash are marked
/// `failed` (no automatic retry); reports still `pending` are re-enqueued.
pub async fn recover_reports(
    db_path: PathBuf,
    queue: &JobQueue,
) -> Result<RecoverySummary, PipelineError> {
    let joined = tokio::task::spawn_blocking(move || -> Result<_, PipelineError> {
        let conn = db::open_database(&db_path)?;
        let failed = repository::fail_interrupted_reports(&conn)?;
        let pending = repository::list_report_ids_by_status(&conn, ProcessingStatus::Pending)?;
        Ok((failed, pending))
    })
    .await;

    let (failed_interrupted, pending) = match joined {
        Ok(result) => result?,
        Err(e) if e.is_panic() => return Err(PipelineError::Panicked(JobStage::Claim)),
        Err(e) => {
            return Err(PipelineError::Aborted {
                stage: JobStage::Claim,
                reason: e.to_string(),
            })
        }
    };

    let mut requeued_pending = 0;
    for report_id in pending {
        match queue.enqueue(report_id) {
            Ok(true) => requeued_pending += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(report_id = %report_id, error = %e, "Could not re-enqueue pending report");
            }
        }
    }

    tracing::info!(failed_interrupted, requeued_pending, "Startup recovery complete");
    Ok(RecoverySummary {
        failed_interrupted,
        requeued_pending,
    })
}

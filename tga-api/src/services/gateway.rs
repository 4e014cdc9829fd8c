//! Asynchronous classification gateway
//!
//! Outbound: [`ClassificationGateway::dispatch`] assigns the moderator and writes a
//! pending outbox row in one transaction, then hands the job to the
//! [`DispatchWorker`] through a channel and returns. The worker calls the
//! classifier with a bounded timeout and resolves the row. On failure it reverts
//! the request to `formed` with no moderator and records the reason.
//!
//! Inbound: [`ClassificationGateway::accept_callback`] authenticates the
//! classifier's shared secret and applies the scores through the lifecycle manager.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tga_common::api::{secret_matches, AnalysisCallback, DispatchRequest};
use tga_common::db::DispatchRow;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::classifier_client::{ClassifierClient, DispatchError};
use super::lifecycle::{CallbackOutcome, LifecycleManager};
use crate::db::{self, dispatches::DispatchStatus};
use crate::error::{ApiError, ApiResult};
use crate::models::Lifecycle;

/// Jobs buffered between request handlers and the worker
const QUEUE_CAPACITY: usize = 256;

/// One outbox entry to deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchJob {
    pub dispatch_id: i64,
    pub request_id: i64,
    pub moderator_id: i64,
}

impl From<&DispatchRow> for DispatchJob {
    fn from(row: &DispatchRow) -> Self {
        DispatchJob {
            dispatch_id: row.id,
            request_id: row.analysis_request_id,
            moderator_id: row.moderator_id,
        }
    }
}

/// How a finished dispatch attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Accepted,
    Failed(String),
}

struct GatewayInner {
    lifecycle: LifecycleManager,
    queue: mpsc::Sender<DispatchJob>,
    callback_secret: String,
}

#[derive(Clone)]
pub struct ClassificationGateway {
    inner: Arc<GatewayInner>,
}

impl ClassificationGateway {
    /// Create the gateway and the worker that drains its queue
    pub fn new(
        lifecycle: LifecycleManager,
        client: Arc<dyn ClassifierClient>,
        callback_secret: impl Into<String>,
    ) -> (Self, DispatchWorker) {
        let (queue, jobs) = mpsc::channel(QUEUE_CAPACITY);
        let worker = DispatchWorker {
            db: lifecycle.db().clone(),
            client,
            jobs,
        };
        let gateway = Self {
            inner: Arc::new(GatewayInner {
                lifecycle,
                queue,
                callback_secret: callback_secret.into(),
            }),
        };
        (gateway, worker)
    }

    /// Request classification of a formed request
    ///
    /// Returns once the moderator assignment and outbox row are committed. The
    /// request stays `formed` until the classifier acknowledges the job.
    pub async fn dispatch(&self, moderator_id: i64, request_id: i64) -> ApiResult<DispatchJob> {
        let lifecycle = &self.inner.lifecycle;
        let request = lifecycle.load(request_id).await?;
        let next = request.lifecycle.assign_moderator(moderator_id)?;

        let mut tx = lifecycle.db().begin().await?;
        if !db::requests::compare_and_set(&mut *tx, request_id, &request.lifecycle, &next).await? {
            tx.rollback().await?;
            return Err(ApiError::Conflict(format!(
                "request {} changed concurrently",
                request_id
            )));
        }
        db::requests::set_dispatch_error(&mut *tx, request_id, None).await?;
        let dispatch_id =
            db::dispatches::insert_pending(&mut *tx, request_id, moderator_id, Utc::now()).await?;
        tx.commit().await?;

        let job = DispatchJob {
            dispatch_id,
            request_id,
            moderator_id,
        };
        info!(request_id, moderator_id, dispatch_id, "Classification dispatch queued");
        self.enqueue(job).await;
        Ok(job)
    }

    /// Authenticate and apply a classifier callback
    pub async fn accept_callback(&self, callback: &AnalysisCallback) -> ApiResult<CallbackOutcome> {
        if !secret_matches(&callback.secret_key, &self.inner.callback_secret) {
            warn!(
                request_id = callback.analysis_request_id,
                "Callback rejected: bad secret"
            );
            return Err(ApiError::Forbidden("invalid secret key".to_string()));
        }

        self.inner
            .lifecycle
            .complete_with_scores(callback.analysis_request_id, &callback.analysis_genre_data)
            .await
    }

    /// Re-queue outbox rows left pending by a previous run
    pub async fn recover_pending(&self) -> ApiResult<usize> {
        let pending = db::dispatches::list_pending(self.inner.lifecycle.db()).await?;
        let mut requeued = 0;

        for row in &pending {
            let job = DispatchJob::from(row);
            let awaiting = db::requests::find(self.inner.lifecycle.db(), job.request_id)
                .await?
                .map(|request| awaiting_dispatch(&request.lifecycle, job.moderator_id))
                .unwrap_or(false);

            if awaiting {
                self.enqueue(job).await;
                requeued += 1;
            } else {
                // The request moved on without us (e.g. a callback already completed it)
                db::dispatches::resolve(
                    self.inner.lifecycle.db(),
                    job.dispatch_id,
                    DispatchStatus::Failed,
                    Some("request no longer awaiting dispatch"),
                )
                .await?;
            }
        }

        if requeued > 0 {
            info!(requeued, "Re-queued pending classification dispatches");
        }
        Ok(requeued)
    }

    async fn enqueue(&self, job: DispatchJob) {
        if self.inner.queue.send(job).await.is_err() {
            error!(
                request_id = job.request_id,
                dispatch_id = job.dispatch_id,
                "Dispatch worker is not running; job stays pending until restart"
            );
        }
    }
}

/// Background consumer of the dispatch queue
pub struct DispatchWorker {
    db: SqlitePool,
    client: Arc<dyn ClassifierClient>,
    jobs: mpsc::Receiver<DispatchJob>,
}

impl DispatchWorker {
    /// Drain the queue until every gateway handle is dropped
    ///
    /// Each job runs in its own task so one slow classifier call does not hold up
    /// the rest.
    pub async fn run(mut self) {
        info!("Dispatch worker started");
        while let Some(job) = self.jobs.recv().await {
            let db = self.db.clone();
            let client = Arc::clone(&self.client);
            tokio::spawn(async move {
                if let Err(e) = deliver(&db, client.as_ref(), job).await {
                    error!(
                        request_id = job.request_id,
                        dispatch_id = job.dispatch_id,
                        error = %e,
                        "Failed to record dispatch outcome"
                    );
                }
            });
        }
        info!("Dispatch worker stopped");
    }
}

/// Send one job and record how it went
pub async fn deliver(
    db: &SqlitePool,
    client: &dyn ClassifierClient,
    job: DispatchJob,
) -> ApiResult<DispatchOutcome> {
    let result = client
        .submit(DispatchRequest {
            analysis_request_id: job.request_id,
        })
        .await;

    match result {
        Ok(()) => {
            record_accepted(db, job).await?;
            Ok(DispatchOutcome::Accepted)
        }
        Err(e) => {
            let reason = e.to_string();
            record_failed(db, job, &e).await?;
            Ok(DispatchOutcome::Failed(reason))
        }
    }
}

async fn record_accepted(db: &SqlitePool, job: DispatchJob) -> ApiResult<()> {
    let request = db::requests::find(db, job.request_id).await?;

    let mut tx = db.begin().await?;
    db::dispatches::resolve(&mut *tx, job.dispatch_id, DispatchStatus::Accepted, None).await?;

    if let Some(current) = request.map(|r| r.lifecycle) {
        if awaiting_dispatch(&current, job.moderator_id) {
            let next = current.start_processing()?;
            if !db::requests::compare_and_set(&mut *tx, job.request_id, &current, &next).await? {
                debug!(request_id = job.request_id, "Request moved on before dispatch acknowledgement");
            }
        } else {
            // The callback overtook the acknowledgement, or the request was deleted
            debug!(request_id = job.request_id, status = %current.status(), "Leaving request as is");
        }
    }
    tx.commit().await?;

    info!(request_id = job.request_id, dispatch_id = job.dispatch_id, "Classifier accepted job");
    Ok(())
}

async fn record_failed(db: &SqlitePool, job: DispatchJob, cause: &DispatchError) -> ApiResult<()> {
    let reason = cause.to_string();
    warn!(
        request_id = job.request_id,
        dispatch_id = job.dispatch_id,
        reason = %reason,
        "Classification dispatch failed, reverting request to formed"
    );

    let request = db::requests::find(db, job.request_id).await?;

    let mut tx = db.begin().await?;
    db::dispatches::resolve(&mut *tx, job.dispatch_id, DispatchStatus::Failed, Some(&reason))
        .await?;

    if let Some(current) = request.map(|r| r.lifecycle) {
        if awaiting_dispatch(&current, job.moderator_id) {
            let next = current.revert_dispatch()?;
            if db::requests::compare_and_set(&mut *tx, job.request_id, &current, &next).await? {
                db::requests::set_dispatch_error(&mut *tx, job.request_id, Some(&reason)).await?;
            }
        }
    }
    tx.commit().await?;
    Ok(())
}

/// Formed, with this moderator's dispatch still in flight
fn awaiting_dispatch(state: &Lifecycle, moderator_id: i64) -> bool {
    matches!(state, Lifecycle::Formed { moderator_id: Some(m), .. } if *m == moderator_id)
}

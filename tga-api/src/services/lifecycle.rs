//! Analysis lifecycle manager
//!
//! Owns every change to an analysis request and its genre attachments. Handlers
//! and the classification gateway call in here; nothing else writes those tables.
//!
//! Reads happen outside transactions. Writes re-check the state they depend on
//! through conditional updates, so a concurrent change turns into `Conflict` or
//! `InvalidState` instead of a lost update.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tga_common::api::GenreScore;
use tga_common::db::RequestStatus;
use tga_common::scoring::MAX_PERCENT;
use tracing::{debug, info, warn};

use crate::db::{self, requests::RequestFilter};
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::models::{AnalysisRequest, DraftIcon, Lifecycle, RequestView};

/// Attempts at get-or-create before giving up on a draft that keeps changing
const DRAFT_ATTEMPTS: usize = 3;

/// Who is performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub is_moderator: bool,
}

/// Query-string filters of the list operation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    /// YYYY-MM-DD, inclusive
    pub start_date: Option<String>,
    /// YYYY-MM-DD, inclusive (whole day)
    pub end_date: Option<String>,
    /// Honoured for moderators only
    pub creator_id: Option<i64>,
}

/// Result of applying classifier scores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Applied { updated: usize },
    AlreadyCompleted,
}

#[derive(Clone)]
pub struct LifecycleManager {
    db: SqlitePool,
}

impl LifecycleManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    /// Load a request, treating `deleted` as absent
    pub async fn load(&self, id: i64) -> ApiResult<AnalysisRequest> {
        match db::requests::find(&self.db, id).await? {
            Some(request) if request.status() != RequestStatus::Deleted => Ok(request),
            _ => Err(not_found(id)),
        }
    }

    /// The creator's draft without creating one
    pub async fn current_draft(&self, creator_id: i64) -> ApiResult<Option<AnalysisRequest>> {
        Ok(db::requests::find_draft(&self.db, creator_id).await?)
    }

    /// The creator's draft, created empty if absent
    ///
    /// Concurrent callers for one creator all get the same row: the storage-level
    /// unique index lets exactly one insert through.
    pub async fn get_or_create_draft(&self, creator_id: i64) -> ApiResult<AnalysisRequest> {
        for _ in 0..DRAFT_ATTEMPTS {
            if let Some(draft) = db::requests::find_draft(&self.db, creator_id).await? {
                return Ok(draft);
            }
            if db::requests::insert_draft_if_absent(&self.db, creator_id, Utc::now()).await? {
                info!(creator_id, "Created draft analysis request");
            }
        }
        Err(ApiError::Conflict(
            "draft changed concurrently, retry the operation".to_string(),
        ))
    }

    /// Badge data; never creates a draft
    pub async fn draft_icon(&self, creator_id: Option<i64>) -> ApiResult<DraftIcon> {
        let Some(creator_id) = creator_id else {
            return Ok(DraftIcon::default());
        };
        match self.current_draft(creator_id).await? {
            Some(draft) => Ok(DraftIcon {
                analysis_request_id: draft.id,
                genres_in_request_count: db::attachments::count(&self.db, draft.id).await?,
            }),
            None => Ok(DraftIcon::default()),
        }
    }

    /// Replace the body text of a draft; an empty body is ignored
    pub async fn edit(&self, actor: Actor, id: i64, text: &str) -> ApiResult<AnalysisRequest> {
        let request = self.load(id).await?;
        ensure_visible(actor, &request)?;
        ensure_owner(actor, &request)?;
        if request.status() != RequestStatus::Draft {
            return Err(ApiError::InvalidState(format!(
                "only a draft can be edited, request {} is {}",
                id,
                request.status()
            )));
        }

        if text.trim().is_empty() {
            debug!(request_id = id, "Ignoring empty body edit");
            return Ok(request);
        }

        if !db::requests::update_text(&self.db, id, text).await? {
            return Err(ApiError::InvalidState(format!("request {} is no longer a draft", id)));
        }
        self.load(id).await
    }

    /// Attach a catalogue genre to the creator's draft (creating the draft)
    pub async fn attach_genre(&self, creator_id: i64, genre_id: i64) -> ApiResult<AnalysisRequest> {
        if db::genres::find_active(&self.db, genre_id).await?.is_none() {
            return Err(ApiError::NotFound(format!("genre {} not found", genre_id)));
        }

        for _ in 0..DRAFT_ATTEMPTS {
            let draft = self.get_or_create_draft(creator_id).await?;
            match db::attachments::insert(&self.db, draft.id, genre_id).await {
                Ok(true) => {
                    info!(request_id = draft.id, genre_id, "Genre attached");
                    return Ok(draft);
                }
                // Draft was formed or deleted in between; resolve the new one
                Ok(false) => continue,
                Err(tga_common::Error::Database(e)) if is_unique_violation(&e) => {
                    return Err(ApiError::Conflict(format!(
                        "genre {} is already attached to request {}",
                        genre_id, draft.id
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ApiError::Conflict(
            "draft changed concurrently, retry the operation".to_string(),
        ))
    }

    /// Edit the annotation and/or probability of an attachment on the current draft
    pub async fn update_attachment(
        &self,
        creator_id: i64,
        genre_id: i64,
        comment: Option<&str>,
        probability_percent: Option<i64>,
    ) -> ApiResult<()> {
        if let Some(p) = probability_percent {
            validate_probability(p)?;
        }
        let draft = self
            .current_draft(creator_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("no current draft".to_string()))?;

        if !db::attachments::update(&self.db, draft.id, genre_id, comment, probability_percent)
            .await?
        {
            return Err(attachment_not_found(draft.id, genre_id));
        }
        Ok(())
    }

    /// Remove an attachment from the current draft
    pub async fn detach_genre(&self, creator_id: i64, genre_id: i64) -> ApiResult<()> {
        let draft = self
            .current_draft(creator_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("no current draft".to_string()))?;

        if !db::attachments::delete(&self.db, draft.id, genre_id).await? {
            return Err(attachment_not_found(draft.id, genre_id));
        }
        info!(request_id = draft.id, genre_id, "Genre detached");
        Ok(())
    }

    /// `draft -> formed`
    ///
    /// Checked in order: state, non-empty text, at least one genre.
    pub async fn form(&self, actor: Actor, id: i64) -> ApiResult<AnalysisRequest> {
        let request = self.load(id).await?;
        ensure_visible(actor, &request)?;
        ensure_owner(actor, &request)?;

        let next = request.lifecycle.form(Utc::now())?;
        if request.text_to_analyse.trim().is_empty() {
            return Err(ApiError::ValidationFailed(
                "text to analyse must not be empty".to_string(),
            ));
        }
        if db::attachments::count(&self.db, id).await? == 0 {
            return Err(ApiError::ValidationFailed(
                "at least one genre must be attached".to_string(),
            ));
        }

        self.transition(&request, &next).await?;
        info!(request_id = id, "Analysis request formed");
        self.load(id).await
    }

    /// `formed -> rejected`
    pub async fn reject(&self, moderator_id: i64, id: i64) -> ApiResult<AnalysisRequest> {
        let request = self.load(id).await?;
        let next = request.lifecycle.reject(moderator_id, Utc::now())?;

        self.transition(&request, &next).await?;
        info!(request_id = id, moderator_id, "Analysis request rejected");
        self.load(id).await
    }

    /// Soft delete by the owner or a moderator
    pub async fn delete(&self, actor: Actor, id: i64) -> ApiResult<()> {
        let request = self.load(id).await?;
        ensure_visible(actor, &request)?;
        if request.creator_id != actor.user_id && !actor.is_moderator {
            return Err(ApiError::Forbidden(
                "only the creator or a moderator can delete a request".to_string(),
            ));
        }

        let next = request.lifecycle.delete()?;
        self.transition(&request, &next).await?;
        info!(request_id = id, user_id = actor.user_id, "Analysis request deleted");
        Ok(())
    }

    /// Full projection of one request
    pub async fn get(&self, actor: Actor, id: i64) -> ApiResult<RequestView> {
        let request = self.load(id).await?;
        ensure_visible(actor, &request)?;
        self.view(request).await
    }

    /// Requests visible to the actor; moderators see everyone's, creators their own
    pub async fn list(&self, actor: Actor, params: &ListParams) -> ApiResult<Vec<RequestView>> {
        let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
            Some(text) => Some(text.parse::<RequestStatus>().map_err(|_| {
                ApiError::ValidationFailed(format!("unknown status '{}'", text))
            })?),
            None => None,
        };

        let filter = RequestFilter {
            viewer_id: actor.user_id,
            creator_id: if actor.is_moderator {
                params.creator_id
            } else {
                Some(actor.user_id)
            },
            status,
            formed_from: parse_date(params.start_date.as_deref(), "start_date")?
                .map(|d| d.and_time(NaiveTime::MIN).and_utc()),
            formed_to: parse_date(params.end_date.as_deref(), "end_date")?
                .map(end_of_day),
        };

        let requests = db::requests::list(&self.db, &filter).await?;
        let mut views = Vec::with_capacity(requests.len());
        for request in requests {
            views.push(self.view(request).await?);
        }
        Ok(views)
    }

    /// Apply classifier scores and complete the request, all in one transaction
    ///
    /// A request that is already completed is acknowledged without touching it.
    pub async fn complete_with_scores(
        &self,
        id: i64,
        scores: &[GenreScore],
    ) -> ApiResult<CallbackOutcome> {
        for score in scores {
            validate_probability(score.probability_percent)?;
        }

        let request = match db::requests::find(&self.db, id).await? {
            Some(request) => request,
            None => return Err(not_found(id)),
        };
        if request.status() == RequestStatus::Completed {
            info!(request_id = id, "Duplicate callback for completed request ignored");
            return Ok(CallbackOutcome::AlreadyCompleted);
        }
        let next = request.lifecycle.complete(Utc::now())?;

        let mut tx = self.db.begin().await?;
        if !db::requests::compare_and_set(&mut *tx, id, &request.lifecycle, &next).await? {
            tx.rollback().await?;
            // Lost a race; a concurrent duplicate callback is the benign case
            return match db::requests::find(&self.db, id).await? {
                Some(current) if current.status() == RequestStatus::Completed => {
                    Ok(CallbackOutcome::AlreadyCompleted)
                }
                _ => Err(ApiError::Conflict(format!("request {} changed concurrently", id))),
            };
        }

        let mut updated = 0;
        for score in scores {
            if db::attachments::set_probability(
                &mut *tx,
                id,
                score.genre_id,
                score.probability_percent,
            )
            .await?
            {
                updated += 1;
            } else {
                debug!(request_id = id, genre_id = score.genre_id, "Score for unattached genre ignored");
            }
        }
        tx.commit().await?;

        info!(request_id = id, updated, "Analysis request completed");
        Ok(CallbackOutcome::Applied { updated })
    }

    /// Persist a state change computed from `request`
    async fn transition(&self, request: &AnalysisRequest, next: &Lifecycle) -> ApiResult<()> {
        if !db::requests::compare_and_set(&self.db, request.id, &request.lifecycle, next).await? {
            warn!(request_id = request.id, "Concurrent modification detected");
            return Err(ApiError::Conflict(format!(
                "request {} changed concurrently",
                request.id
            )));
        }
        Ok(())
    }

    async fn view(&self, request: AnalysisRequest) -> ApiResult<RequestView> {
        let creator_login = db::users::login_of(&self.db, request.creator_id)
            .await?
            .unwrap_or_default();
        let moderator_login = match request.lifecycle.moderator_id() {
            Some(moderator_id) => db::users::login_of(&self.db, moderator_id).await?,
            None => None,
        };
        let genres = db::attachments::list_for_request(&self.db, request.id).await?;

        Ok(RequestView {
            id: request.id,
            status: request.status(),
            creator_login,
            moderator_login,
            formed_at: request.lifecycle.formed_at(),
            completed_at: request.lifecycle.completed_at(),
            text_to_analyse: request.text_to_analyse,
            created_at: request.created_at,
            last_dispatch_error: request.last_dispatch_error,
            genres_completed_count: RequestView::count_completed(&genres),
            genres,
        })
    }
}

/// Owners see their requests; moderators see every request except other users' drafts
fn ensure_visible(actor: Actor, request: &AnalysisRequest) -> ApiResult<()> {
    if request.creator_id == actor.user_id {
        return Ok(());
    }
    if actor.is_moderator {
        if request.status() == RequestStatus::Draft {
            return Err(not_found(request.id));
        }
        return Ok(());
    }
    Err(ApiError::Forbidden(format!(
        "request {} belongs to another user",
        request.id
    )))
}

fn ensure_owner(actor: Actor, request: &AnalysisRequest) -> ApiResult<()> {
    if request.creator_id != actor.user_id {
        return Err(ApiError::Forbidden(
            "only the creator can change a request".to_string(),
        ));
    }
    Ok(())
}

fn validate_probability(p: i64) -> ApiResult<()> {
    if !(0..=MAX_PERCENT).contains(&p) {
        return Err(ApiError::ValidationFailed(format!(
            "probability must be within 0..={}, got {}",
            MAX_PERCENT, p
        )));
    }
    Ok(())
}

fn parse_date(value: Option<&str>, field: &str) -> ApiResult<Option<NaiveDate>> {
    match value.filter(|v| !v.is_empty()) {
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                ApiError::ValidationFailed(format!("invalid {}, expected YYYY-MM-DD", field))
            }),
        None => Ok(None),
    }
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_nano_opt(23, 59, 59, 999_999_999)
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN))
        .and_utc()
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("analysis request {} not found", id))
}

fn attachment_not_found(request_id: i64, genre_id: i64) -> ApiError {
    ApiError::NotFound(format!(
        "genre {} is not attached to request {}",
        genre_id, request_id
    ))
}

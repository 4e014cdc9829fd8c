//! Analysis request state machine
//!
//! ```text
//! draft ──form──▶ formed ──dispatch accepted──▶ processing ──callback──▶ completed
//!                 │ ▲  │                                                  ▲
//!                 │ │  └──────────────── callback ────────────────────────┘
//!                 │ └── dispatch failed (moderator cleared)
//!                 └──reject──▶ rejected
//! draft | formed | processing ──delete──▶ deleted
//! ```
//!
//! Each state carries exactly the data that exists in it, so a `completed` request
//! without a completion timestamp cannot be represented. Transitions consume nothing
//! and return the next state; persistence is the caller's job.

use chrono::{DateTime, Utc};
use tga_common::db::{AnalysisRequestRow, RequestStatus};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Draft,
    /// `moderator_id` is set while a classification dispatch is in flight
    Formed {
        formed_at: DateTime<Utc>,
        moderator_id: Option<i64>,
    },
    Processing {
        formed_at: DateTime<Utc>,
        moderator_id: i64,
    },
    Completed {
        formed_at: DateTime<Utc>,
        moderator_id: i64,
        completed_at: DateTime<Utc>,
    },
    Rejected {
        formed_at: DateTime<Utc>,
        moderator_id: i64,
        completed_at: DateTime<Utc>,
    },
    Deleted {
        formed_at: Option<DateTime<Utc>>,
        moderator_id: Option<i64>,
    },
}

impl Lifecycle {
    pub fn status(&self) -> RequestStatus {
        match self {
            Lifecycle::Draft => RequestStatus::Draft,
            Lifecycle::Formed { .. } => RequestStatus::Formed,
            Lifecycle::Processing { .. } => RequestStatus::Processing,
            Lifecycle::Completed { .. } => RequestStatus::Completed,
            Lifecycle::Rejected { .. } => RequestStatus::Rejected,
            Lifecycle::Deleted { .. } => RequestStatus::Deleted,
        }
    }

    pub fn formed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Lifecycle::Draft => None,
            Lifecycle::Formed { formed_at, .. }
            | Lifecycle::Processing { formed_at, .. }
            | Lifecycle::Completed { formed_at, .. }
            | Lifecycle::Rejected { formed_at, .. } => Some(*formed_at),
            Lifecycle::Deleted { formed_at, .. } => *formed_at,
        }
    }

    pub fn moderator_id(&self) -> Option<i64> {
        match self {
            Lifecycle::Draft => None,
            Lifecycle::Formed { moderator_id, .. } | Lifecycle::Deleted { moderator_id, .. } => {
                *moderator_id
            }
            Lifecycle::Processing { moderator_id, .. }
            | Lifecycle::Completed { moderator_id, .. }
            | Lifecycle::Rejected { moderator_id, .. } => Some(*moderator_id),
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Lifecycle::Completed { completed_at, .. } | Lifecycle::Rejected { completed_at, .. } => {
                Some(*completed_at)
            }
            _ => None,
        }
    }

    /// Rebuild the state from stored columns, rejecting inconsistent rows
    pub fn from_columns(
        status: RequestStatus,
        formed_at: Option<DateTime<Utc>>,
        moderator_id: Option<i64>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, String> {
        let lifecycle = match (status, formed_at, moderator_id, completed_at) {
            (RequestStatus::Draft, None, None, None) => Lifecycle::Draft,
            (RequestStatus::Formed, Some(formed_at), moderator_id, None) => Lifecycle::Formed {
                formed_at,
                moderator_id,
            },
            (RequestStatus::Processing, Some(formed_at), Some(moderator_id), None) => {
                Lifecycle::Processing {
                    formed_at,
                    moderator_id,
                }
            }
            (RequestStatus::Completed, Some(formed_at), Some(moderator_id), Some(completed_at)) => {
                Lifecycle::Completed {
                    formed_at,
                    moderator_id,
                    completed_at,
                }
            }
            (RequestStatus::Rejected, Some(formed_at), Some(moderator_id), Some(completed_at)) => {
                Lifecycle::Rejected {
                    formed_at,
                    moderator_id,
                    completed_at,
                }
            }
            (RequestStatus::Deleted, formed_at, moderator_id, None) => Lifecycle::Deleted {
                formed_at,
                moderator_id,
            },
            (status, formed_at, moderator_id, completed_at) => {
                return Err(format!(
                    "status {} with formed_at={:?} moderator_id={:?} completed_at={:?}",
                    status, formed_at, moderator_id, completed_at
                ))
            }
        };
        Ok(lifecycle)
    }

    /// `draft -> formed`
    pub fn form(&self, now: DateTime<Utc>) -> ApiResult<Lifecycle> {
        match self {
            Lifecycle::Draft => Ok(Lifecycle::Formed {
                formed_at: now,
                moderator_id: None,
            }),
            other => Err(illegal("form", other)),
        }
    }

    /// Record the moderator who requested classification; stays `formed`
    pub fn assign_moderator(&self, moderator_id: i64) -> ApiResult<Lifecycle> {
        match self {
            Lifecycle::Formed {
                formed_at,
                moderator_id: None,
            } => Ok(Lifecycle::Formed {
                formed_at: *formed_at,
                moderator_id: Some(moderator_id),
            }),
            Lifecycle::Formed {
                moderator_id: Some(_),
                ..
            } => Err(ApiError::InvalidState(
                "classification is already in progress".to_string(),
            )),
            other => Err(illegal("moderate", other)),
        }
    }

    /// Classifier accepted the job: `formed -> processing`
    pub fn start_processing(&self) -> ApiResult<Lifecycle> {
        match self {
            Lifecycle::Formed {
                formed_at,
                moderator_id: Some(moderator_id),
            } => Ok(Lifecycle::Processing {
                formed_at: *formed_at,
                moderator_id: *moderator_id,
            }),
            other => Err(illegal("start processing", other)),
        }
    }

    /// Dispatch failed before the classifier accepted it: clear the moderator
    pub fn revert_dispatch(&self) -> ApiResult<Lifecycle> {
        match self {
            Lifecycle::Formed {
                formed_at,
                moderator_id: Some(_),
            } => Ok(Lifecycle::Formed {
                formed_at: *formed_at,
                moderator_id: None,
            }),
            other => Err(illegal("revert dispatch", other)),
        }
    }

    /// `formed -> rejected`
    pub fn reject(&self, moderator_id: i64, now: DateTime<Utc>) -> ApiResult<Lifecycle> {
        match self {
            Lifecycle::Formed {
                formed_at,
                moderator_id: None,
            } => Ok(Lifecycle::Rejected {
                formed_at: *formed_at,
                moderator_id,
                completed_at: now,
            }),
            Lifecycle::Formed {
                moderator_id: Some(_),
                ..
            } => Err(ApiError::InvalidState(
                "classification is already in progress".to_string(),
            )),
            other => Err(illegal("moderate", other)),
        }
    }

    /// Scores arrived: `formed | processing -> completed`
    ///
    /// A `formed` request is accepted only while a dispatch is in flight, since the
    /// callback may overtake the dispatch acknowledgement.
    pub fn complete(&self, now: DateTime<Utc>) -> ApiResult<Lifecycle> {
        match self {
            Lifecycle::Formed {
                formed_at,
                moderator_id: Some(moderator_id),
            }
            | Lifecycle::Processing {
                formed_at,
                moderator_id,
            } => Ok(Lifecycle::Completed {
                formed_at: *formed_at,
                moderator_id: *moderator_id,
                completed_at: now,
            }),
            other => Err(illegal("complete", other)),
        }
    }

    /// Soft delete from any non-terminal state
    pub fn delete(&self) -> ApiResult<Lifecycle> {
        if self.status().is_terminal() {
            return Err(illegal("delete", self));
        }
        Ok(Lifecycle::Deleted {
            formed_at: self.formed_at(),
            moderator_id: self.moderator_id(),
        })
    }
}

fn illegal(action: &str, state: &Lifecycle) -> ApiError {
    ApiError::InvalidState(format!(
        "cannot {} a request in status '{}'",
        action,
        state.status()
    ))
}

/// An analysis request with its validated lifecycle state
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub id: i64,
    pub creator_id: i64,
    pub text_to_analyse: String,
    pub created_at: DateTime<Utc>,
    pub last_dispatch_error: Option<String>,
    pub lifecycle: Lifecycle,
}

impl AnalysisRequest {
    pub fn status(&self) -> RequestStatus {
        self.lifecycle.status()
    }
}

impl TryFrom<AnalysisRequestRow> for AnalysisRequest {
    type Error = tga_common::Error;

    fn try_from(row: AnalysisRequestRow) -> Result<Self, Self::Error> {
        let status: RequestStatus = row.status.parse()?;
        let lifecycle =
            Lifecycle::from_columns(status, row.formed_at, row.moderator_id, row.completed_at)
                .map_err(|detail| {
                    tga_common::Error::Corrupt(format!("analysis request {}: {}", row.id, detail))
                })?;

        Ok(AnalysisRequest {
            id: row.id,
            creator_id: row.creator_id,
            text_to_analyse: row.text_to_analyse,
            created_at: row.created_at,
            last_dispatch_error: row.last_dispatch_error,
            lifecycle,
        })
    }
}

//! Database row models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Stored status of an analysis request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Draft,
    Formed,
    Processing,
    Completed,
    Rejected,
    Deleted,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        RequestStatus::Draft,
        RequestStatus::Formed,
        RequestStatus::Processing,
        RequestStatus::Completed,
        RequestStatus::Rejected,
        RequestStatus::Deleted,
    ];

    /// Text stored in the `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Draft => "draft",
            RequestStatus::Formed => "formed",
            RequestStatus::Processing => "processing",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Deleted => "deleted",
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Rejected | RequestStatus::Deleted
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::Corrupt(format!("unknown request status '{}'", s)))
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub login: String,
    pub password_hash: String,
    pub is_moderator: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GenreRow {
    pub id: i64,
    pub name: String,
    pub image_url: Option<String>,
    pub keywords: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Raw `analysis_requests` row; status is still text here
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalysisRequestRow {
    pub id: i64,
    pub status: String,
    pub creator_id: i64,
    pub moderator_id: Option<i64>,
    pub text_to_analyse: String,
    pub created_at: DateTime<Utc>,
    pub formed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_dispatch_error: Option<String>,
}

/// Attachment joined with its genre
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttachmentRow {
    pub genre_id: i64,
    pub genre_name: String,
    pub image_url: Option<String>,
    pub comment: String,
    pub probability_percent: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DispatchRow {
    pub id: i64,
    pub analysis_request_id: i64,
    pub moderator_id: i64,
    pub status: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_round_trip() {
        for status in RequestStatus::ALL {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_is_corrupt() {
        assert!(matches!(
            "archived".parse::<RequestStatus>(),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RequestStatus::Draft.is_terminal());
        assert!(!RequestStatus::Formed.is_terminal());
        assert!(!RequestStatus::Processing.is_terminal());
        assert!(RequestStatus::Completed.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(RequestStatus::Deleted.is_terminal());
    }
}

//! Response projections

use chrono::{DateTime, Utc};
use serde::Serialize;
use tga_common::db::{AttachmentRow, GenreRow, RequestStatus};

/// Catalogue entry as shown to clients
#[derive(Debug, Clone, Serialize)]
pub struct GenreView {
    pub id: i64,
    pub name: String,
    pub image_url: Option<String>,
    pub keywords: String,
}

impl From<GenreRow> for GenreView {
    fn from(row: GenreRow) -> Self {
        GenreView {
            id: row.id,
            name: row.name,
            image_url: row.image_url,
            keywords: row.keywords,
        }
    }
}

/// Full projection of one request
#[derive(Debug, Clone, Serialize)]
pub struct RequestView {
    pub id: i64,
    pub status: RequestStatus,
    pub creator_login: String,
    pub moderator_login: Option<String>,
    pub text_to_analyse: String,
    pub created_at: DateTime<Utc>,
    pub formed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_dispatch_error: Option<String>,
    pub genres: Vec<AttachmentRow>,
    /// Attachments with a non-zero probability
    pub genres_completed_count: usize,
}

impl RequestView {
    pub fn count_completed(genres: &[AttachmentRow]) -> usize {
        genres.iter().filter(|g| g.probability_percent > 0).count()
    }
}

/// Badge for the creator's current draft
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DraftIcon {
    /// 0 when there is no draft
    pub analysis_request_id: i64,
    pub genres_in_request_count: i64,
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One concrete dated, timed occurrence of a course. All occurrences of a
/// course share `course_id`, `share_code` and `signature`. Rows are never
/// physically removed; `is_deleted` marks them inactive.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: String,
    pub schedule_id: String,
    pub course_id: String,
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub location: Option<String>,
    pub teacher: Option<String>,
    pub note: Option<String>,
    pub share_code: Option<String>,
    pub signature: Option<String>,
    pub is_deleted: bool,
}

/// Row shape for a batch insert; the store assigns the row id.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub schedule_id: String,
    pub course_id: String,
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub location: Option<String>,
    pub teacher: Option<String>,
    pub note: Option<String>,
    pub share_code: String,
    pub signature: String,
}

/// Fields touched by a single-event edit. Course id and signature stay as-is,
/// so an edited occurrence remains grouped under its course.
#[derive(Debug, Clone)]
pub struct EventPatch {
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub location: Option<String>,
    pub teacher: Option<String>,
    pub note: Option<String>,
}

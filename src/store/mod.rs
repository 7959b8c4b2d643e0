pub mod sqlite;

pub use sqlite::{SqliteAuditSink, SqliteEventStore, SqliteShareRegistry, get_or_create_schedule};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::models::{Event, EventPatch, NewEvent};

/// Persistence collaborator for course occurrences. Implementations must make
/// `insert` batch-atomic: either the whole batch lands or none of it.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert(&self, events: &[NewEvent]) -> Result<(), AppError>;

    /// Non-deleted events of a schedule, ordered by start time ascending.
    async fn list_active(&self, schedule_id: &str) -> Result<Vec<Event>, AppError>;

    /// Non-deleted events of a schedule carrying the given signature.
    async fn find_by_signature(
        &self,
        schedule_id: &str,
        signature: &str,
    ) -> Result<Vec<Event>, AppError>;

    /// Non-deleted events of a schedule whose start falls on the given
    /// calendar date (YYYY-MM-DD).
    async fn find_by_date(&self, schedule_id: &str, date: &str) -> Result<Vec<Event>, AppError>;

    /// Non-deleted events of a course across schedules, ordered by start time.
    async fn find_by_course(&self, course_id: &str) -> Result<Vec<Event>, AppError>;

    /// Non-deleted events of a schedule carrying the given share code,
    /// ordered by start time.
    async fn find_by_share_code(
        &self,
        schedule_id: &str,
        code: &str,
    ) -> Result<Vec<Event>, AppError>;

    async fn soft_delete_event(&self, event_id: &str, schedule_id: &str) -> Result<(), AppError>;

    async fn soft_delete_course(&self, course_id: &str) -> Result<(), AppError>;

    async fn update_fields(
        &self,
        event_id: &str,
        schedule_id: &str,
        patch: EventPatch,
    ) -> Result<(), AppError>;

    /// Stamp every row of a course (deleted or not) with the given signature,
    /// keeping the retained row set internally consistent after a
    /// whole-course update.
    async fn normalize_signature(&self, course_id: &str, signature: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct ShareEntry {
    pub token: String,
    pub course_id: String,
    pub schedule_id: String,
    pub expires_at: Option<String>,
}

/// Maps opaque share tokens to course identities, with optional expiry.
#[async_trait]
pub trait ShareRegistry: Send + Sync {
    async fn register(
        &self,
        token: &str,
        course_id: &str,
        schedule_id: &str,
        expires_at: Option<&str>,
    ) -> Result<(), AppError>;

    async fn resolve(&self, token: &str) -> Result<Option<ShareEntry>, AppError>;
}

/// Best-effort telemetry; callers swallow failures.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(
        &self,
        actor_id: &str,
        action: &str,
        entity: &str,
        entity_id: Option<&str>,
        payload: Option<Value>,
    ) -> Result<(), AppError>;
}

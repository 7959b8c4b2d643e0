use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Event, EventPatch, NewEvent, Schedule};
use crate::store::{AuditSink, EventStore, ShareEntry, ShareRegistry};

const EVENT_COLUMNS: &str = "id, schedule_id, course_id, title, start_time, end_time, location, teacher, note, share_code, signature, is_deleted";

const DEFAULT_SCHEDULE_TITLE: &str = "Default";
const DEFAULT_SCHEDULE_COLOR: &str = "#111827";

pub struct SqliteEventStore {
    db: SqlitePool,
}

impl SqliteEventStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn insert(&self, events: &[NewEvent]) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;
        for event in events {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO events (id, schedule_id, course_id, title, start_time, end_time, location, teacher, note, share_code, signature, is_deleted) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)"
            )
            .bind(&id)
            .bind(&event.schedule_id)
            .bind(&event.course_id)
            .bind(&event.title)
            .bind(&event.start_time)
            .bind(&event.end_time)
            .bind(&event.location)
            .bind(&event.teacher)
            .bind(&event.note)
            .bind(&event.share_code)
            .bind(&event.signature)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_active(&self, schedule_id: &str) -> Result<Vec<Event>, AppError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE schedule_id = ? AND is_deleted = 0 ORDER BY start_time ASC"
        ))
        .bind(schedule_id)
        .fetch_all(&self.db)
        .await?;
        Ok(events)
    }

    async fn find_by_signature(
        &self,
        schedule_id: &str,
        signature: &str,
    ) -> Result<Vec<Event>, AppError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE schedule_id = ? AND signature = ? AND is_deleted = 0"
        ))
        .bind(schedule_id)
        .bind(signature)
        .fetch_all(&self.db)
        .await?;
        Ok(events)
    }

    async fn find_by_date(&self, schedule_id: &str, date: &str) -> Result<Vec<Event>, AppError> {
        let day_start = format!("{date}T00:00:00");
        let day_end = format!("{date}T23:59:59");
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE schedule_id = ? AND is_deleted = 0 AND start_time >= ? AND start_time <= ?"
        ))
        .bind(schedule_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.db)
        .await?;
        Ok(events)
    }

    async fn find_by_course(&self, course_id: &str) -> Result<Vec<Event>, AppError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE course_id = ? AND is_deleted = 0 ORDER BY start_time ASC"
        ))
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;
        Ok(events)
    }

    async fn find_by_share_code(
        &self,
        schedule_id: &str,
        code: &str,
    ) -> Result<Vec<Event>, AppError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE schedule_id = ? AND share_code = ? AND is_deleted = 0 ORDER BY start_time ASC"
        ))
        .bind(schedule_id)
        .bind(code)
        .fetch_all(&self.db)
        .await?;
        Ok(events)
    }

    async fn soft_delete_event(&self, event_id: &str, schedule_id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE events SET is_deleted = 1 WHERE id = ? AND schedule_id = ?")
            .bind(event_id)
            .bind(schedule_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn soft_delete_course(&self, course_id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE events SET is_deleted = 1 WHERE course_id = ?")
            .bind(course_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_fields(
        &self,
        event_id: &str,
        schedule_id: &str,
        patch: EventPatch,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE events SET title = ?, start_time = ?, end_time = ?, location = ?, teacher = ?, note = ? WHERE id = ? AND schedule_id = ?"
        )
        .bind(&patch.title)
        .bind(&patch.start_time)
        .bind(&patch.end_time)
        .bind(&patch.location)
        .bind(&patch.teacher)
        .bind(&patch.note)
        .bind(event_id)
        .bind(schedule_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn normalize_signature(&self, course_id: &str, signature: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE events SET signature = ? WHERE course_id = ?")
            .bind(signature)
            .bind(course_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

pub struct SqliteShareRegistry {
    db: SqlitePool,
}

impl SqliteShareRegistry {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ShareRegistry for SqliteShareRegistry {
    async fn register(
        &self,
        token: &str,
        course_id: &str,
        schedule_id: &str,
        expires_at: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO shares (token, course_id, schedule_id, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token)
        .bind(course_id)
        .bind(schedule_id)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn resolve(&self, token: &str) -> Result<Option<ShareEntry>, AppError> {
        let row = sqlx::query_as::<_, (String, String, String, Option<String>)>(
            "SELECT token, course_id, schedule_id, expires_at FROM shares WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|(token, course_id, schedule_id, expires_at)| ShareEntry {
            token,
            course_id,
            schedule_id,
            expires_at,
        }))
    }
}

pub struct SqliteAuditSink {
    db: SqlitePool,
}

impl SqliteAuditSink {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn record(
        &self,
        actor_id: &str,
        action: &str,
        entity: &str,
        entity_id: Option<&str>,
        payload: Option<Value>,
    ) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let payload = payload.map(|value| value.to_string());
        sqlx::query(
            "INSERT INTO audit_logs (user_id, action, entity, entity_id, payload, created_at) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(actor_id)
        .bind(action)
        .bind(entity)
        .bind(entity_id)
        .bind(payload)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

/// Lazily provision the user row and their "Default" schedule, returning the
/// schedule either way.
pub async fn get_or_create_schedule(
    db: &SqlitePool,
    user_id: &str,
    email: Option<&str>,
) -> Result<Schedule, AppError> {
    let known_user = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    if known_user.is_none() {
        sqlx::query("INSERT INTO users (id, email) VALUES (?, ?)")
            .bind(user_id)
            .bind(email)
            .execute(db)
            .await?;
    }

    let existing = sqlx::query_as::<_, Schedule>(
        "SELECT id, user_id, title, color FROM schedules WHERE user_id = ? AND title = ?",
    )
    .bind(user_id)
    .bind(DEFAULT_SCHEDULE_TITLE)
    .fetch_optional(db)
    .await?;
    if let Some(schedule) = existing {
        return Ok(schedule);
    }

    let schedule = Schedule {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        title: DEFAULT_SCHEDULE_TITLE.to_string(),
        color: DEFAULT_SCHEDULE_COLOR.to_string(),
    };
    sqlx::query("INSERT INTO schedules (id, user_id, title, color) VALUES (?, ?, ?, ?)")
        .bind(&schedule.id)
        .bind(&schedule.user_id)
        .bind(&schedule.title)
        .bind(&schedule.color)
        .execute(db)
        .await?;
    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite://:memory:")
            .await
            .expect("Failed to create test db");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn new_event(schedule_id: &str, course_id: &str, date: &str, start: &str, end: &str) -> NewEvent {
        NewEvent {
            schedule_id: schedule_id.to_string(),
            course_id: course_id.to_string(),
            title: "Algebra".to_string(),
            start_time: format!("{date}T{start}:00+01:00"),
            end_time: format!("{date}T{end}:00+01:00"),
            location: None,
            teacher: None,
            note: None,
            share_code: "CODE1234".to_string(),
            signature: "sig-a".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_list_active_orders_by_start_time() {
        let pool = setup_test_db().await;
        let store = SqliteEventStore::new(pool);

        store
            .insert(&[
                new_event("s1", "c1", "2024-03-11", "09:00", "10:00"),
                new_event("s1", "c1", "2024-03-04", "09:00", "10:00"),
            ])
            .await
            .expect("insert failed");

        let events = store.list_active("s1").await.expect("list failed");
        assert_eq!(events.len(), 2);
        assert!(events[0].start_time < events[1].start_time);
    }

    #[tokio::test]
    async fn soft_deleted_rows_are_invisible_but_retained() {
        let pool = setup_test_db().await;
        let store = SqliteEventStore::new(pool.clone());

        store
            .insert(&[new_event("s1", "c1", "2024-03-04", "09:00", "10:00")])
            .await
            .expect("insert failed");
        store.soft_delete_course("c1").await.expect("delete failed");

        assert!(store.list_active("s1").await.unwrap().is_empty());
        assert!(store.find_by_signature("s1", "sig-a").await.unwrap().is_empty());
        assert!(store.find_by_date("s1", "2024-03-04").await.unwrap().is_empty());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn find_by_date_scopes_to_the_calendar_day() {
        let pool = setup_test_db().await;
        let store = SqliteEventStore::new(pool);

        store
            .insert(&[
                new_event("s1", "c1", "2024-03-04", "09:00", "10:00"),
                new_event("s1", "c1", "2024-03-05", "09:00", "10:00"),
            ])
            .await
            .expect("insert failed");

        let events = store.find_by_date("s1", "2024-03-04").await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].start_time.starts_with("2024-03-04"));
    }

    #[tokio::test]
    async fn normalize_signature_covers_every_row_of_the_course() {
        let pool = setup_test_db().await;
        let store = SqliteEventStore::new(pool.clone());

        store
            .insert(&[
                new_event("s1", "c1", "2024-03-04", "09:00", "10:00"),
                new_event("s1", "c1", "2024-03-11", "09:00", "10:00"),
            ])
            .await
            .expect("insert failed");
        store.normalize_signature("c1", "sig-b").await.unwrap();

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM events WHERE signature = 'sig-b'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn update_fields_leaves_course_id_and_signature_alone() {
        let pool = setup_test_db().await;
        let store = SqliteEventStore::new(pool);

        store
            .insert(&[new_event("s1", "c1", "2024-03-04", "09:00", "10:00")])
            .await
            .expect("insert failed");
        let event = store.list_active("s1").await.unwrap().remove(0);

        store
            .update_fields(
                &event.id,
                "s1",
                EventPatch {
                    title: "Algebra II".to_string(),
                    start_time: "2024-03-04T11:00:00+01:00".to_string(),
                    end_time: "2024-03-04T12:00:00+01:00".to_string(),
                    location: Some("Room 2".to_string()),
                    teacher: None,
                    note: None,
                },
            )
            .await
            .unwrap();

        let updated = store.list_active("s1").await.unwrap().remove(0);
        assert_eq!(updated.title, "Algebra II");
        assert_eq!(updated.course_id, "c1");
        assert_eq!(updated.signature.as_deref(), Some("sig-a"));
    }

    #[tokio::test]
    async fn share_registry_round_trip() {
        let pool = setup_test_db().await;
        let shares = SqliteShareRegistry::new(pool);

        shares
            .register("ABCD1234", "c1", "s1", None)
            .await
            .expect("register failed");

        let entry = shares.resolve("ABCD1234").await.unwrap().expect("missing");
        assert_eq!(entry.course_id, "c1");
        assert_eq!(entry.schedule_id, "s1");
        assert_eq!(entry.expires_at, None);

        assert!(shares.resolve("NOPE0000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn audit_sink_records_payloads() {
        let pool = setup_test_db().await;
        let audit = SqliteAuditSink::new(pool.clone());

        audit
            .record(
                "user-1",
                "create",
                "course",
                Some("c1"),
                Some(serde_json::json!({"title": "Algebra"})),
            )
            .await
            .expect("record failed");

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM audit_logs WHERE user_id = 'user-1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn get_or_create_schedule_is_idempotent() {
        let pool = setup_test_db().await;

        let first = get_or_create_schedule(&pool, "user-1", Some("a@example.com"))
            .await
            .expect("first call failed");
        let second = get_or_create_schedule(&pool, "user-1", None)
            .await
            .expect("second call failed");

        assert_eq!(first.id, second.id);
        assert_eq!(first.title, "Default");
    }
}

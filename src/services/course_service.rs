use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CourseDraft, Event, EventPatch};
use crate::schedule::{ConflictQuery, build_events, draft_signature, extract_dates, has_conflicts, to_offset_datetime};
use crate::store::{AuditSink, EventStore, ShareRegistry};

/// Orchestrates course create/import/update/delete against the injected
/// collaborators. Note that the signature check, conflict check and insert
/// are separate store round-trips with no transaction tying them together;
/// conflict prevention is a best-effort guard, not a linearizable guarantee.
pub struct CourseService {
    store: Arc<dyn EventStore>,
    shares: Arc<dyn ShareRegistry>,
    audit: Arc<dyn AuditSink>,
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created { events: Vec<Event>, code: String },
    Duplicate { events: Vec<Event> },
    Conflict,
}

#[derive(Debug)]
pub enum ImportOutcome {
    Imported { events: Vec<Event>, code: String },
    Duplicate { events: Vec<Event> },
    NotFound,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(Vec<Event>),
    Conflict,
    NotFound,
}

/// Opaque 8-character uppercase-alphanumeric share code.
pub fn generate_share_code() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(8)
        .map(|byte| CHARSET[*byte as usize % CHARSET.len()] as char)
        .collect()
}

fn is_expired(expires_at: &str) -> bool {
    DateTime::parse_from_rfc3339(expires_at)
        .map(|deadline| deadline < Utc::now())
        .unwrap_or(false)
}

impl CourseService {
    pub fn new(
        store: Arc<dyn EventStore>,
        shares: Arc<dyn ShareRegistry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { store, shares, audit }
    }

    pub async fn list_events(&self, schedule_id: &str) -> Result<Vec<Event>, AppError> {
        self.store.list_active(schedule_id).await
    }

    /// Create a course from a draft. Resubmitting an identical draft is a
    /// no-op reported as `Duplicate`; a time overlap with existing events
    /// blocks the write and no code is issued.
    pub async fn create(
        &self,
        draft: &CourseDraft,
        schedule_id: &str,
        actor_id: Option<&str>,
    ) -> Result<CreateOutcome, AppError> {
        let signature = draft_signature(draft);
        let existing = self.store.find_by_signature(schedule_id, &signature).await?;
        if !existing.is_empty() {
            info!("duplicate course submission for schedule {}", schedule_id);
            return Ok(CreateOutcome::Duplicate {
                events: self.store.list_active(schedule_id).await?,
            });
        }

        let dates = extract_dates(draft);
        let conflicting = has_conflicts(
            self.store.as_ref(),
            ConflictQuery {
                schedule_id,
                dates: &dates,
                start_time: &draft.start_time,
                end_time: &draft.end_time,
                exclude_course_id: None,
                exclude_event_id: None,
            },
        )
        .await?;
        if conflicting {
            return Ok(CreateOutcome::Conflict);
        }

        let course_id = Uuid::new_v4().to_string();
        let code = generate_share_code();
        let rows = build_events(draft, &course_id, &code, schedule_id, &signature);
        if rows.is_empty() {
            return Err(AppError::BadRequest(
                "draft expands to no occurrences".to_string(),
            ));
        }

        self.store.insert(&rows).await?;
        self.shares.register(&code, &course_id, schedule_id, None).await?;
        self.record_audit(
            actor_id,
            "create",
            "course",
            Some(&course_id),
            Some(json!({ "title": draft.title, "code": code })),
        )
        .await;

        Ok(CreateOutcome::Created {
            events: self.store.list_active(schedule_id).await?,
            code,
        })
    }

    /// Copy a shared course into the destination schedule. The copy gets a
    /// fresh course id and share code, decoupled from the source; the source
    /// course's signature is reused as the fingerprint of the copy, which is
    /// accurate because the copy mirrors the source at import time.
    pub async fn import_by_code(
        &self,
        token: &str,
        schedule_id: &str,
        actor_id: Option<&str>,
    ) -> Result<ImportOutcome, AppError> {
        let Some(share) = self.shares.resolve(token).await? else {
            return Ok(ImportOutcome::NotFound);
        };
        if share.expires_at.as_deref().is_some_and(is_expired) {
            return Ok(ImportOutcome::NotFound);
        }

        let source = self.store.find_by_course(&share.course_id).await?;
        let Some(first) = source.first() else {
            return Ok(ImportOutcome::NotFound);
        };

        let signature = first.signature.clone().unwrap_or_default();
        let existing = self.store.find_by_signature(schedule_id, &signature).await?;
        if !existing.is_empty() {
            return Ok(ImportOutcome::Duplicate {
                events: self.store.list_active(schedule_id).await?,
            });
        }

        let new_course_id = Uuid::new_v4().to_string();
        let new_code = generate_share_code();
        let rows: Vec<_> = source
            .iter()
            .map(|row| crate::models::NewEvent {
                schedule_id: schedule_id.to_string(),
                course_id: new_course_id.clone(),
                title: row.title.clone(),
                start_time: row.start_time.clone(),
                end_time: row.end_time.clone(),
                location: row.location.clone(),
                teacher: row.teacher.clone(),
                note: row.note.clone(),
                share_code: new_code.clone(),
                signature: signature.clone(),
            })
            .collect();

        self.store.insert(&rows).await?;
        self.shares
            .register(&new_code, &new_course_id, schedule_id, None)
            .await?;
        self.record_audit(
            actor_id,
            "import",
            "course",
            Some(&new_course_id),
            Some(json!({ "token": token })),
        )
        .await;

        Ok(ImportOutcome::Imported {
            events: self.store.list_active(schedule_id).await?,
            code: new_code,
        })
    }

    /// Replace every occurrence of the course behind `code` with a fresh
    /// expansion of the draft, keeping the course id and share code. The old
    /// rows are soft-deleted, the new batch inserted, and the signature
    /// normalized across the course.
    pub async fn update_by_code(
        &self,
        code: &str,
        draft: &CourseDraft,
        schedule_id: &str,
        actor_id: Option<&str>,
    ) -> Result<UpdateOutcome, AppError> {
        let Some(share) = self.shares.resolve(code).await? else {
            return Ok(UpdateOutcome::NotFound);
        };
        let course_id = share.course_id;
        let signature = draft_signature(draft);

        let dates = extract_dates(draft);
        let conflicting = has_conflicts(
            self.store.as_ref(),
            ConflictQuery {
                schedule_id,
                dates: &dates,
                start_time: &draft.start_time,
                end_time: &draft.end_time,
                exclude_course_id: Some(&course_id),
                exclude_event_id: None,
            },
        )
        .await?;
        if conflicting {
            return Ok(UpdateOutcome::Conflict);
        }

        let rows = build_events(draft, &course_id, code, schedule_id, &signature);
        if rows.is_empty() {
            return Err(AppError::BadRequest(
                "draft expands to no occurrences".to_string(),
            ));
        }

        self.store.soft_delete_course(&course_id).await?;
        self.store.insert(&rows).await?;
        self.store.normalize_signature(&course_id, &signature).await?;
        self.record_audit(
            actor_id,
            "update",
            "course",
            Some(&course_id),
            Some(json!({ "code": code })),
        )
        .await;

        Ok(UpdateOutcome::Updated(
            self.store.list_active(schedule_id).await?,
        ))
    }

    /// Edit one occurrence in place, regardless of the draft's original date
    /// mode: only the single date counts, and only title/time/location/
    /// teacher/note change. The row keeps its course id and signature, so it
    /// detaches in content while staying grouped under the course.
    pub async fn update_event(
        &self,
        event_id: &str,
        draft: &CourseDraft,
        schedule_id: &str,
        actor_id: Option<&str>,
    ) -> Result<UpdateOutcome, AppError> {
        let dates = vec![draft.date_single.clone()];
        let conflicting = has_conflicts(
            self.store.as_ref(),
            ConflictQuery {
                schedule_id,
                dates: &dates,
                start_time: &draft.start_time,
                end_time: &draft.end_time,
                exclude_course_id: None,
                exclude_event_id: Some(event_id),
            },
        )
        .await?;
        if conflicting {
            return Ok(UpdateOutcome::Conflict);
        }

        let (Some(start_time), Some(end_time)) = (
            to_offset_datetime(&draft.date_single, &draft.start_time),
            to_offset_datetime(&draft.date_single, &draft.end_time),
        ) else {
            return Err(AppError::BadRequest(
                "event edit needs a valid date and time".to_string(),
            ));
        };

        self.store
            .update_fields(
                event_id,
                schedule_id,
                EventPatch {
                    title: draft.title.clone(),
                    start_time,
                    end_time,
                    location: none_if_blank(&draft.location),
                    teacher: none_if_blank(&draft.teacher),
                    note: none_if_blank(&draft.note),
                },
            )
            .await?;
        self.record_audit(actor_id, "update_single", "event", Some(event_id), None)
            .await;

        Ok(UpdateOutcome::Updated(
            self.store.list_active(schedule_id).await?,
        ))
    }

    pub async fn delete_event(
        &self,
        event_id: &str,
        schedule_id: &str,
        actor_id: Option<&str>,
    ) -> Result<Vec<Event>, AppError> {
        self.store.soft_delete_event(event_id, schedule_id).await?;
        self.record_audit(actor_id, "delete_single", "event", Some(event_id), None)
            .await;
        self.store.list_active(schedule_id).await
    }

    /// Soft-delete every occurrence of the course behind `code`. The share
    /// token keeps resolving to the (now empty) course id.
    pub async fn delete_course_by_code(
        &self,
        code: &str,
        actor_id: Option<&str>,
    ) -> Result<Option<String>, AppError> {
        let Some(share) = self.shares.resolve(code).await? else {
            return Ok(None);
        };
        let course_id = share.course_id;
        self.store.soft_delete_course(&course_id).await?;
        self.record_audit(
            actor_id,
            "delete",
            "course",
            Some(&course_id),
            Some(json!({ "code": code })),
        )
        .await;
        Ok(Some(course_id))
    }

    /// Reconstruct an editable draft from a course's active rows, for
    /// pre-filling the edit form. Weekly shape is not recoverable from rows
    /// alone, so multi-date is used whenever more than one date remains.
    pub async fn get_draft_by_code(
        &self,
        code: &str,
        schedule_id: &str,
    ) -> Result<Option<CourseDraft>, AppError> {
        let rows = self.store.find_by_share_code(schedule_id, code).await?;
        let Some(first) = rows.first() else {
            return Ok(None);
        };

        let mut dates: Vec<String> = Vec::new();
        for row in &rows {
            let Some(date) = row.start_time.get(..10) else {
                continue;
            };
            if !dates.iter().any(|seen| seen == date) {
                dates.push(date.to_string());
            }
        }

        let start = first.start_time.get(11..16).unwrap_or_default().to_string();
        let end = first.end_time.get(11..16).unwrap_or_default().to_string();
        let date_mode = if dates.len() > 1 {
            crate::models::DateMode::Multi
        } else {
            crate::models::DateMode::Single
        };

        Ok(Some(CourseDraft {
            title: first.title.clone(),
            date_mode,
            date_single: dates.first().cloned().unwrap_or_default(),
            date_range_start: dates.first().cloned().unwrap_or_default(),
            date_range_end: dates.last().cloned().unwrap_or_default(),
            weekdays: Vec::new(),
            dates,
            start_time: start,
            end_time: end,
            location: first.location.clone(),
            teacher: first.teacher.clone(),
            note: first.note.clone(),
        }))
    }

    async fn record_audit(
        &self,
        actor_id: Option<&str>,
        action: &str,
        entity: &str,
        entity_id: Option<&str>,
        payload: Option<Value>,
    ) {
        let Some(actor_id) = actor_id else {
            return;
        };
        if let Err(err) = self
            .audit
            .record(actor_id, action, entity, entity_id, payload)
            .await
        {
            warn!("audit record failed: {}", err);
        }
    }
}

fn none_if_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

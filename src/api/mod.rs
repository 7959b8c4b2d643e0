use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{delete, patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{CourseDraft, DateMode, Event, Schedule};
use crate::services::{CreateOutcome, ImportOutcome, UpdateOutcome};
use crate::state::AppState;
use crate::store::get_or_create_schedule;

#[derive(Deserialize)]
struct ScheduleRequest {
    user_id: String,
    email: Option<String>,
}

#[derive(Deserialize)]
struct DraftRequest {
    draft: CourseDraft,
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct ImportRequest {
    token: String,
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct ActorParams {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
struct CourseResponse {
    events: Vec<Event>,
    code: Option<String>,
    duplicate: bool,
}

#[derive(Serialize)]
struct EventsResponse {
    events: Vec<Event>,
}

#[derive(Serialize)]
struct DeletedCourseResponse {
    course_id: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/schedules", post(create_schedule))
        .route("/schedules/{schedule_id}/events", get(list_events))
        .route(
            "/schedules/{schedule_id}/events/{id}",
            patch(update_event).delete(delete_event),
        )
        .route("/schedules/{schedule_id}/courses", post(create_course))
        .route(
            "/schedules/{schedule_id}/courses/import",
            post(import_course),
        )
        .route(
            "/schedules/{schedule_id}/courses/{code}",
            get(get_course_draft).put(update_course),
        )
        .route("/courses/{code}", delete(delete_course))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn create_schedule(
    State(state): State<AppState>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<Schedule>, AppError> {
    let schedule = get_or_create_schedule(&state.db, &req.user_id, req.email.as_deref()).await?;
    Ok(Json(schedule))
}

async fn list_events(
    State(state): State<AppState>,
    Path(schedule_id): Path<String>,
) -> Result<Json<EventsResponse>, AppError> {
    let events = state.courses.list_events(&schedule_id).await?;
    Ok(Json(EventsResponse { events }))
}

async fn create_course(
    State(state): State<AppState>,
    Path(schedule_id): Path<String>,
    Json(req): Json<DraftRequest>,
) -> Result<Json<CourseResponse>, AppError> {
    req.draft.validate()?;
    match state
        .courses
        .create(&req.draft, &schedule_id, req.user_id.as_deref())
        .await?
    {
        CreateOutcome::Created { events, code } => Ok(Json(CourseResponse {
            events,
            code: Some(code),
            duplicate: false,
        })),
        CreateOutcome::Duplicate { events } => Ok(Json(CourseResponse {
            events,
            code: None,
            duplicate: true,
        })),
        CreateOutcome::Conflict => Err(AppError::Conflict(
            "course overlaps existing events".to_string(),
        )),
    }
}

async fn import_course(
    State(state): State<AppState>,
    Path(schedule_id): Path<String>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<CourseResponse>, AppError> {
    match state
        .courses
        .import_by_code(&req.token, &schedule_id, req.user_id.as_deref())
        .await?
    {
        ImportOutcome::Imported { events, code } => Ok(Json(CourseResponse {
            events,
            code: Some(code),
            duplicate: false,
        })),
        ImportOutcome::Duplicate { events } => Ok(Json(CourseResponse {
            events,
            code: None,
            duplicate: true,
        })),
        ImportOutcome::NotFound => Err(AppError::NotFound),
    }
}

async fn get_course_draft(
    State(state): State<AppState>,
    Path((schedule_id, code)): Path<(String, String)>,
) -> Result<Json<CourseDraft>, AppError> {
    let draft = state
        .courses
        .get_draft_by_code(&code, &schedule_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(draft))
}

async fn update_course(
    State(state): State<AppState>,
    Path((schedule_id, code)): Path<(String, String)>,
    Json(req): Json<DraftRequest>,
) -> Result<Json<EventsResponse>, AppError> {
    req.draft.validate()?;
    match state
        .courses
        .update_by_code(&code, &req.draft, &schedule_id, req.user_id.as_deref())
        .await?
    {
        UpdateOutcome::Updated(events) => Ok(Json(EventsResponse { events })),
        UpdateOutcome::Conflict => Err(AppError::Conflict(
            "course overlaps existing events".to_string(),
        )),
        UpdateOutcome::NotFound => Err(AppError::NotFound),
    }
}

async fn delete_course(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<ActorParams>,
) -> Result<Json<DeletedCourseResponse>, AppError> {
    let course_id = state
        .courses
        .delete_course_by_code(&code, params.user_id.as_deref())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(DeletedCourseResponse { course_id }))
}

async fn update_event(
    State(state): State<AppState>,
    Path((schedule_id, id)): Path<(String, String)>,
    Json(req): Json<DraftRequest>,
) -> Result<Json<EventsResponse>, AppError> {
    // A single-event edit only touches one date, whatever shape the draft
    // originally had.
    let mut draft = req.draft;
    draft.date_mode = DateMode::Single;
    draft.validate()?;
    match state
        .courses
        .update_event(&id, &draft, &schedule_id, req.user_id.as_deref())
        .await?
    {
        UpdateOutcome::Updated(events) => Ok(Json(EventsResponse { events })),
        UpdateOutcome::Conflict => Err(AppError::Conflict(
            "event overlaps existing events".to_string(),
        )),
        UpdateOutcome::NotFound => Err(AppError::NotFound),
    }
}

async fn delete_event(
    State(state): State<AppState>,
    Path((schedule_id, id)): Path<(String, String)>,
    Query(params): Query<ActorParams>,
) -> Result<Json<EventsResponse>, AppError> {
    let events = state
        .courses
        .delete_event(&id, &schedule_id, params.user_id.as_deref())
        .await?;
    Ok(Json(EventsResponse { events }))
}

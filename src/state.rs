use std::sync::Arc;

use sqlx::SqlitePool;

use crate::services::CourseService;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub courses: Arc<CourseService>,
}

use sqlx::SqlitePool;

use planboard::models::NewEvent;
use planboard::schedule::{ConflictQuery, has_conflicts};
use planboard::store::{EventStore, SqliteEventStore};

async fn setup_store() -> SqliteEventStore {
    let pool = SqlitePool::connect("sqlite://:memory:")
        .await
        .expect("Failed to create test db");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    SqliteEventStore::new(pool)
}

fn event(course_id: &str, date: &str, start: &str, end: &str) -> NewEvent {
    NewEvent {
        schedule_id: "s1".to_string(),
        course_id: course_id.to_string(),
        title: "Algebra".to_string(),
        start_time: format!("{date}T{start}:00+01:00"),
        end_time: format!("{date}T{end}:00+01:00"),
        location: None,
        teacher: None,
        note: None,
        share_code: "CODE1234".to_string(),
        signature: "sig".to_string(),
    }
}

fn query<'a>(
    dates: &'a [String],
    start: &'a str,
    end: &'a str,
) -> ConflictQuery<'a> {
    ConflictQuery {
        schedule_id: "s1",
        dates,
        start_time: start,
        end_time: end,
        exclude_course_id: None,
        exclude_event_id: None,
    }
}

#[tokio::test]
async fn detects_overlap_on_the_same_date() {
    let store = setup_store().await;
    store
        .insert(&[event("c1", "2024-03-04", "09:00", "10:00")])
        .await
        .unwrap();

    let dates = vec!["2024-03-04".to_string()];
    assert!(has_conflicts(&store, query(&dates, "09:30", "10:30")).await.unwrap());
    assert!(has_conflicts(&store, query(&dates, "08:00", "09:01")).await.unwrap());
    // Fully containing the existing event counts too.
    assert!(has_conflicts(&store, query(&dates, "08:00", "12:00")).await.unwrap());
}

#[tokio::test]
async fn boundary_touches_are_not_overlaps() {
    let store = setup_store().await;
    store
        .insert(&[event("c1", "2024-03-04", "09:00", "10:00")])
        .await
        .unwrap();

    let dates = vec!["2024-03-04".to_string()];
    assert!(!has_conflicts(&store, query(&dates, "10:00", "11:00")).await.unwrap());
    assert!(!has_conflicts(&store, query(&dates, "08:00", "09:00")).await.unwrap());
}

#[tokio::test]
async fn other_dates_do_not_conflict() {
    let store = setup_store().await;
    store
        .insert(&[event("c1", "2024-03-04", "09:00", "10:00")])
        .await
        .unwrap();

    let dates = vec!["2024-03-05".to_string()];
    assert!(!has_conflicts(&store, query(&dates, "09:00", "10:00")).await.unwrap());
}

#[tokio::test]
async fn excluded_course_and_event_do_not_count() {
    let store = setup_store().await;
    store
        .insert(&[event("c1", "2024-03-04", "09:00", "10:00")])
        .await
        .unwrap();
    let existing = store.list_active("s1").await.unwrap().remove(0);

    let dates = vec!["2024-03-04".to_string()];

    let mut by_course = query(&dates, "09:00", "10:00");
    by_course.exclude_course_id = Some("c1");
    assert!(!has_conflicts(&store, by_course).await.unwrap());

    let mut by_event = query(&dates, "09:00", "10:00");
    by_event.exclude_event_id = Some(&existing.id);
    assert!(!has_conflicts(&store, by_event).await.unwrap());

    // Excluding an unrelated course changes nothing.
    let mut unrelated = query(&dates, "09:00", "10:00");
    unrelated.exclude_course_id = Some("c2");
    assert!(has_conflicts(&store, unrelated).await.unwrap());
}

#[tokio::test]
async fn soft_deleted_events_never_conflict() {
    let store = setup_store().await;
    store
        .insert(&[event("c1", "2024-03-04", "09:00", "10:00")])
        .await
        .unwrap();
    store.soft_delete_course("c1").await.unwrap();

    let dates = vec!["2024-03-04".to_string()];
    assert!(!has_conflicts(&store, query(&dates, "09:00", "10:00")).await.unwrap());
}

#[tokio::test]
async fn unparseable_candidate_times_report_no_conflict() {
    let store = setup_store().await;
    store
        .insert(&[event("c1", "2024-03-04", "09:00", "10:00")])
        .await
        .unwrap();

    let dates = vec!["2024-03-04".to_string()];
    assert!(!has_conflicts(&store, query(&dates, "late", "later")).await.unwrap());
}

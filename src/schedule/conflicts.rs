use chrono::{DateTime, Timelike};

use crate::error::AppError;
use crate::models::draft::parse_time;
use crate::store::EventStore;

pub struct ConflictQuery<'a> {
    pub schedule_id: &'a str,
    pub dates: &'a [String],
    pub start_time: &'a str,
    pub end_time: &'a str,
    pub exclude_course_id: Option<&'a str>,
    pub exclude_event_id: Option<&'a str>,
}

/// True if any non-deleted event of the schedule overlaps the candidate time
/// range on any of the given dates. Ranges are compared half-open on minutes
/// of day, so an event ending exactly when another starts does not conflict.
/// Returns on the first overlap found.
pub async fn has_conflicts(
    store: &dyn EventStore,
    query: ConflictQuery<'_>,
) -> Result<bool, AppError> {
    let (Some(start), Some(end)) = (parse_time(query.start_time), parse_time(query.end_time))
    else {
        return Ok(false);
    };
    let candidate_start = start.hour() * 60 + start.minute();
    let candidate_end = end.hour() * 60 + end.minute();

    for date in query.dates {
        let events = store.find_by_date(query.schedule_id, date).await?;
        for event in events {
            if query.exclude_course_id == Some(event.course_id.as_str()) {
                continue;
            }
            if query.exclude_event_id == Some(event.id.as_str()) {
                continue;
            }
            let (Some(existing_start), Some(existing_end)) =
                (minute_of_day(&event.start_time), minute_of_day(&event.end_time))
            else {
                continue;
            };
            if candidate_start.max(existing_start) < candidate_end.min(existing_end) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn minute_of_day(timestamp: &str) -> Option<u32> {
    let parsed = DateTime::parse_from_rfc3339(timestamp).ok()?;
    Some(parsed.hour() * 60 + parsed.minute())
}

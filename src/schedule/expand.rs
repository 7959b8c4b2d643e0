use std::collections::HashSet;

use chrono::{Datelike, Local, TimeZone};

use crate::models::draft::{parse_date, parse_time};
use crate::models::{CourseDraft, DateMode, NewEvent};

/// Combine a calendar date with a HH:MM time and stamp the local UTC offset,
/// so stored timestamps are unambiguous.
pub fn to_offset_datetime(date: &str, time: &str) -> Option<String> {
    let date = parse_date(date)?;
    let time = parse_time(time)?;
    let local = Local.from_local_datetime(&date.and_time(time)).earliest()?;
    Some(local.format("%Y-%m-%dT%H:%M:%S%:z").to_string())
}

/// The calendar dates a draft covers, in expansion order.
///
/// A degenerate weekly draft (unparseable or inverted range, no weekdays)
/// yields an empty list rather than an error; validation is expected to have
/// rejected it upstream.
pub fn extract_dates(draft: &CourseDraft) -> Vec<String> {
    match draft.date_mode {
        DateMode::Single => vec![draft.date_single.clone()],
        DateMode::Multi => draft.dates.clone(),
        DateMode::Weekly => weekly_dates(draft),
    }
}

fn weekly_dates(draft: &CourseDraft) -> Vec<String> {
    let (Some(start), Some(end)) = (
        parse_date(&draft.date_range_start),
        parse_date(&draft.date_range_end),
    ) else {
        return Vec::new();
    };

    let wanted: HashSet<u8> = draft.weekdays.iter().copied().collect();
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        if wanted.contains(&(current.weekday().num_days_from_sunday() as u8)) {
            dates.push(current.format("%Y-%m-%d").to_string());
        }
        current = match current.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    dates
}

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Materialize a draft into one insertable row per covered date, all carrying
/// the shared course id, share code and signature.
pub fn build_events(
    draft: &CourseDraft,
    course_id: &str,
    share_code: &str,
    schedule_id: &str,
    signature: &str,
) -> Vec<NewEvent> {
    extract_dates(draft)
        .into_iter()
        .filter_map(|date| {
            let start_time = to_offset_datetime(&date, &draft.start_time)?;
            let end_time = to_offset_datetime(&date, &draft.end_time)?;
            Some(NewEvent {
                schedule_id: schedule_id.to_string(),
                course_id: course_id.to_string(),
                title: draft.title.clone(),
                start_time,
                end_time,
                location: blank_to_none(&draft.location),
                teacher: blank_to_none(&draft.teacher),
                note: blank_to_none(&draft.note),
                share_code: share_code.to_string(),
                signature: signature.to_string(),
            })
        })
        .collect()
}

use crate::models::CourseDraft;

/// Normalized, order-independent fingerprint of a draft's semantic content.
///
/// Two drafts differing only by list-field ordering or by case/whitespace in
/// text fields produce the same signature. Used per schedule as an
/// idempotence guard against duplicate submissions.
pub fn draft_signature(draft: &CourseDraft) -> String {
    let mut weekdays = draft.weekdays.clone();
    weekdays.sort_unstable();
    let weekdays: Vec<String> = weekdays.iter().map(|day| day.to_string()).collect();

    let mut dates = draft.dates.clone();
    dates.sort();

    [
        draft.title.trim().to_lowercase(),
        draft.start_time.clone(),
        draft.end_time.clone(),
        draft.date_mode.as_str().to_string(),
        draft.date_single.clone(),
        draft.date_range_start.clone(),
        draft.date_range_end.clone(),
        weekdays.join(","),
        dates.join(","),
        normalize(&draft.teacher),
        normalize(&draft.location),
        normalize(&draft.note),
    ]
    .join("|")
}

fn normalize(field: &Option<String>) -> String {
    field
        .as_deref()
        .map(|text| text.trim().to_lowercase())
        .unwrap_or_default()
}

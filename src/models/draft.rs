use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateMode {
    Single,
    Weekly,
    Multi,
}

impl DateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DateMode::Single => "single",
            DateMode::Weekly => "weekly",
            DateMode::Multi => "multi",
        }
    }
}

/// User-entered course template prior to expansion into concrete events.
///
/// Exactly one of the three date shapes carries data, selected by `date_mode`:
/// `date_single`, `date_range_start`/`date_range_end` + `weekdays`
/// (0=Sunday..6=Saturday), or the explicit `dates` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDraft {
    pub title: String,
    pub date_mode: DateMode,
    #[serde(default)]
    pub date_single: String,
    #[serde(default)]
    pub date_range_start: String,
    #[serde(default)]
    pub date_range_end: String,
    #[serde(default)]
    pub weekdays: Vec<u8>,
    #[serde(default)]
    pub dates: Vec<String>,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub teacher: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

impl CourseDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::BadRequest("title is required".to_string()));
        }

        let start = parse_time(&self.start_time)
            .ok_or_else(|| AppError::BadRequest("start_time must be HH:MM".to_string()))?;
        let end = parse_time(&self.end_time)
            .ok_or_else(|| AppError::BadRequest("end_time must be HH:MM".to_string()))?;
        if end <= start {
            return Err(AppError::BadRequest(
                "end_time must be after start_time".to_string(),
            ));
        }

        match self.date_mode {
            DateMode::Single => {
                parse_date(&self.date_single).ok_or_else(|| {
                    AppError::BadRequest("date_single must be YYYY-MM-DD".to_string())
                })?;
            }
            DateMode::Weekly => {
                let range_start = parse_date(&self.date_range_start).ok_or_else(|| {
                    AppError::BadRequest("date_range_start must be YYYY-MM-DD".to_string())
                })?;
                let range_end = parse_date(&self.date_range_end).ok_or_else(|| {
                    AppError::BadRequest("date_range_end must be YYYY-MM-DD".to_string())
                })?;
                if range_end < range_start {
                    return Err(AppError::BadRequest(
                        "date_range_end must not precede date_range_start".to_string(),
                    ));
                }
                if self.weekdays.is_empty() {
                    return Err(AppError::BadRequest(
                        "weekly courses need at least one weekday".to_string(),
                    ));
                }
                if self.weekdays.iter().any(|day| *day > 6) {
                    return Err(AppError::BadRequest(
                        "weekdays must be 0 (Sunday) through 6 (Saturday)".to_string(),
                    ));
                }
            }
            DateMode::Multi => {
                if self.dates.is_empty() {
                    return Err(AppError::BadRequest(
                        "multi-date courses need at least one date".to_string(),
                    ));
                }
                for date in &self.dates {
                    parse_date(date).ok_or_else(|| {
                        AppError::BadRequest(format!("invalid date: {date}"))
                    })?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_draft() -> CourseDraft {
        CourseDraft {
            title: "Algebra".to_string(),
            date_mode: DateMode::Single,
            date_single: "2024-03-04".to_string(),
            date_range_start: String::new(),
            date_range_end: String::new(),
            weekdays: Vec::new(),
            dates: Vec::new(),
            start_time: "09:00".to_string(),
            end_time: "10:00".to_string(),
            location: None,
            teacher: None,
            note: None,
        }
    }

    #[test]
    fn accepts_valid_single_draft() {
        assert!(base_draft().validate().is_ok());
    }

    #[test]
    fn rejects_blank_title() {
        let mut draft = base_draft();
        draft.title = "   ".to_string();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn rejects_end_not_after_start() {
        let mut draft = base_draft();
        draft.end_time = "09:00".to_string();
        assert!(draft.validate().is_err());

        draft.end_time = "08:30".to_string();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn rejects_weekly_without_weekdays() {
        let mut draft = base_draft();
        draft.date_mode = DateMode::Weekly;
        draft.date_range_start = "2024-03-04".to_string();
        draft.date_range_end = "2024-03-18".to_string();
        assert!(draft.validate().is_err());

        draft.weekdays = vec![1];
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_weekly_range() {
        let mut draft = base_draft();
        draft.date_mode = DateMode::Weekly;
        draft.date_range_start = "2024-03-18".to_string();
        draft.date_range_end = "2024-03-04".to_string();
        draft.weekdays = vec![1];
        assert!(draft.validate().is_err());
    }

    #[test]
    fn rejects_multi_without_dates() {
        let mut draft = base_draft();
        draft.date_mode = DateMode::Multi;
        assert!(draft.validate().is_err());

        draft.dates = vec!["2024-03-05".to_string()];
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_weekday() {
        let mut draft = base_draft();
        draft.date_mode = DateMode::Weekly;
        draft.date_range_start = "2024-03-04".to_string();
        draft.date_range_end = "2024-03-18".to_string();
        draft.weekdays = vec![7];
        assert!(draft.validate().is_err());
    }
}

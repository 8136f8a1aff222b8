use super::models::Event;
use crate::components::google_calendar::CalendarEvent;
use crate::utils::time::{minutes_of_day, MINUTES_PER_DAY};
use chrono::{DateTime, Datelike, NaiveDate};
use chrono_tz::Tz;
use tracing::warn;

/// A parsed event boundary
#[derive(Debug, Clone, PartialEq)]
enum Boundary {
    Timed(DateTime<Tz>),
    AllDay(NaiveDate),
}

/// Parse a provider timestamp.
///
/// Values with a time-of-day component are RFC 3339 date-times converted to
/// `tz`; bare `YYYY-MM-DD` values are all-day dates.
fn parse_boundary(value: &str, tz: &Tz) -> Option<Boundary> {
    let value = value.trim();
    if value.contains('T') {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| Boundary::Timed(dt.with_timezone(tz)))
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().map(Boundary::AllDay)
    }
}

/// Convert a raw calendar record into a layout event.
///
/// Returns `None` for records with unparseable or mismatched timestamps.
pub fn normalize_event(raw: &CalendarEvent, tz: &Tz) -> Option<Event> {
    let start = parse_boundary(&raw.start, tz)?;
    let end = parse_boundary(&raw.end, tz)?;

    let (day, start_minutes, end_minutes, is_all_day) = match (start, end) {
        (Boundary::Timed(start), Boundary::Timed(end)) => {
            let start_minutes = minutes_of_day(&start);
            let end_minutes = if end.date_naive() > start.date_naive() {
                MINUTES_PER_DAY
            } else {
                minutes_of_day(&end).max(start_minutes)
            };
            (start.weekday().num_days_from_sunday(), start_minutes, end_minutes, false)
        }
        (Boundary::AllDay(date), Boundary::AllDay(_)) => {
            (date.weekday().num_days_from_sunday(), 0, MINUTES_PER_DAY, true)
        }
        _ => return None,
    };

    Some(Event {
        id: raw.id.clone(),
        title: raw.title.clone(),
        day: day as u8,
        start_minutes,
        end_minutes,
        attendees: raw.attendees.clone(),
        calendar: raw.calendar.clone(),
        is_all_day,
    })
}

/// Normalize a batch of raw records, dropping the malformed ones
pub fn normalize_events(raw: &[CalendarEvent], tz: &Tz) -> Vec<Event> {
    raw.iter()
        .filter_map(|record| {
            let event = normalize_event(record, tz);
            if event.is_none() {
                warn!(
                    "Dropping calendar event {} with unparseable times ({:?} - {:?})",
                    record.id, record.start, record.end
                );
            }
            event
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn raw(id: &str, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            title: "Review".to_string(),
            calendar: "Work".to_string(),
            start: start.to_string(),
            end: end.to_string(),
            attendees: vec!["a@example.com".to_string()],
        }
    }

    #[test]
    fn test_timed_event_in_local_time() {
        // 14:00 UTC on Monday 2024-03-04 is 09:00 in New York
        let event = normalize_event(&raw("1", "2024-03-04T14:00:00Z", "2024-03-04T15:30:00Z"), &New_York).unwrap();
        assert_eq!(event.day, 1);
        assert_eq!(event.start_minutes, 540);
        assert_eq!(event.end_minutes, 630);
        assert!(!event.is_all_day);
    }

    #[test]
    fn test_local_day_can_differ_from_utc_day() {
        // Monday 02:00 UTC is Sunday evening in New York
        let event = normalize_event(&raw("1", "2024-03-04T02:00:00Z", "2024-03-04T03:00:00Z"), &New_York).unwrap();
        assert_eq!(event.day, 0);
        assert_eq!(event.start_minutes, 21 * 60);
    }

    #[test]
    fn test_event_ending_after_midnight() {
        let event = normalize_event(
            &raw("1", "2024-03-04T23:00:00-05:00", "2024-03-05T01:00:00-05:00"),
            &New_York,
        )
        .unwrap();
        assert_eq!(event.end_minutes, MINUTES_PER_DAY);
    }

    #[test]
    fn test_all_day_event() {
        let event = normalize_event(&raw("1", "2024-03-06", "2024-03-07"), &New_York).unwrap();
        assert!(event.is_all_day);
        assert_eq!(event.day, 3);
        assert_eq!((event.start_minutes, event.end_minutes), (0, MINUTES_PER_DAY));
    }

    #[test]
    fn test_malformed_events_are_dropped() {
        let events = normalize_events(
            &[
                raw("bad", "yesterday-ish", "2024-03-04T15:00:00Z"),
                raw("mixed", "2024-03-04", "2024-03-04T15:00:00Z"),
                raw("empty", "", ""),
                raw("good", "2024-03-04T14:00:00Z", "2024-03-04T15:00:00Z"),
            ],
            &New_York,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "good");
    }
}

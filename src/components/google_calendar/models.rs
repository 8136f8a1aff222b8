use serde::{Deserialize, Serialize};

/// Fallback title for events without a summary
pub const UNTITLED: &str = "Untitled";
/// Fallback name for calendars without a summary
pub const DEFAULT_CALENDAR_NAME: &str = "Calendar";

/// Simplified calendar event representation
///
/// `start` and `end` are RFC 3339 date-times for timed events and
/// `YYYY-MM-DD` dates for all-day events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub calendar: String,
    pub start: String,
    pub end: String,
    pub attendees: Vec<String>,
}

/// Entry of `users/me/calendarList`
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarListEntry {
    pub id: String,
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CalendarList {
    #[serde(default)]
    pub items: Vec<CalendarListEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
}

impl EventTime {
    fn into_value(self) -> String {
        self.date_time.or(self.date).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Attendee {
    pub email: Option<String>,
}

/// Event resource as returned by the Calendar API
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiEvent {
    #[serde(default)]
    pub id: String,
    pub summary: Option<String>,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

impl ApiEvent {
    pub fn into_event(self, calendar: &str) -> CalendarEvent {
        CalendarEvent {
            id: self.id,
            title: self
                .summary
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNTITLED.to_string()),
            calendar: calendar.to_string(),
            start: self.start.into_value(),
            end: self.end.into_value(),
            attendees: self.attendees.into_iter().filter_map(|a| a.email).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventList {
    #[serde(default)]
    pub items: Vec<ApiEvent>,
}

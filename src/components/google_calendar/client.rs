use super::models::{CalendarEvent, CalendarList, CalendarListEntry, EventList, DEFAULT_CALENDAR_NAME};
use super::token::TokenSet;
use crate::components::providers::ServiceClient;
use crate::error::{google_calendar_error, DashResult};
use crate::utils::time::week_range;
use chrono::{DateTime, SecondsFormat, TimeZone};
use futures::future::join_all;
use reqwest::Client;
use tracing::{info, warn};

const SERVICE: &str = "Google Calendar";
const BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
const MAX_RESULTS: u32 = 250;

/// Read-only Calendar API client for one set of user tokens
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    api: ServiceClient,
}

impl GoogleCalendarClient {
    pub fn new(tokens: &TokenSet, http: Client) -> DashResult<Self> {
        Ok(Self {
            api: ServiceClient::new(SERVICE, BASE_URL, tokens.access_token.as_str(), http)?,
        })
    }

    /// Calendars visible to the user
    pub async fn list_calendars(&self) -> DashResult<Vec<CalendarListEntry>> {
        let list: CalendarList = self.api.get_json(&["users", "me", "calendarList"], &[]).await?;
        Ok(list.items)
    }

    /// Expanded events of one calendar in `[time_min, time_max)`
    pub async fn list_events<Tz: TimeZone>(
        &self,
        calendar: &CalendarListEntry,
        time_min: &DateTime<Tz>,
        time_max: &DateTime<Tz>,
    ) -> DashResult<Vec<CalendarEvent>>
    where
        Tz::Offset: std::fmt::Display,
    {
        let query = [
            ("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("timeMax", time_max.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", MAX_RESULTS.to_string()),
        ];
        let list: EventList = self
            .api
            .get_json(&["calendars", calendar.id.as_str(), "events"], &query)
            .await?;

        let name = calendar
            .summary
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_CALENDAR_NAME);
        Ok(list.items.into_iter().map(|event| event.into_event(name)).collect())
    }

    /// Events of every calendar in the week containing `now`.
    ///
    /// Calendars are queried in parallel; one that fails is logged and skipped.
    pub async fn fetch_week_events<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DashResult<Vec<CalendarEvent>>
    where
        Tz::Offset: std::fmt::Display,
    {
        let (week_start, week_end) =
            week_range(now).ok_or_else(|| google_calendar_error("Could not compute the current week"))?;
        let calendars = self.list_calendars().await?;

        let results = join_all(
            calendars
                .iter()
                .map(|calendar| self.list_events(calendar, &week_start, &week_end)),
        )
        .await;

        let mut events = Vec::new();
        for (calendar, result) in calendars.iter().zip(results) {
            match result {
                Ok(found) => events.extend(found),
                Err(e) => warn!("Skipping calendar {}: {}", calendar.id, e),
            }
        }

        info!("Fetched {} events from {} calendars", events.len(), calendars.len());
        Ok(events)
    }
}

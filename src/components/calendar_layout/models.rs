use crate::error::{config_error, DashResult};
use crate::utils::time::MINUTES_PER_DAY;
use serde::{Deserialize, Serialize};

/// Shortest block drawn for an event, in minutes
pub const MIN_VISUAL_MINUTES: u32 = 30;

/// Days shown in the week grid, Sunday first
pub const DAYS_PER_WEEK: u8 = 7;

/// A calendar event normalized to wall-clock minutes on one weekday
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Stable key used for tie-breaking
    pub id: String,
    pub title: String,
    /// Day of week, Sunday = 0
    pub day: u8,
    pub start_minutes: u32,
    pub end_minutes: u32,
    pub attendees: Vec<String>,
    /// Display name of the calendar the event came from
    pub calendar: String,
    pub is_all_day: bool,
}

/// The visible part of a day and its vertical scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayWindow {
    pub start_minutes: u32,
    pub end_minutes: u32,
    /// Pixels per hour
    pub row_height: f64,
}

impl Default for DisplayWindow {
    fn default() -> Self {
        Self {
            start_minutes: 6 * 60,
            end_minutes: 22 * 60,
            row_height: 48.0,
        }
    }
}

impl DisplayWindow {
    /// Create a display window, rejecting empty or out-of-day ranges
    pub fn new(start_minutes: u32, end_minutes: u32, row_height: f64) -> DashResult<Self> {
        if start_minutes >= end_minutes || end_minutes > MINUTES_PER_DAY {
            return Err(config_error(&format!(
                "Invalid calendar display window {}-{}",
                start_minutes, end_minutes
            )));
        }
        if !row_height.is_finite() || row_height <= 0.0 {
            return Err(config_error(&format!("Invalid calendar row height {}", row_height)));
        }
        Ok(Self {
            start_minutes,
            end_minutes,
            row_height,
        })
    }

    /// Pixel height of the whole window
    pub fn height(&self) -> f64 {
        minutes_to_pixels(self.end_minutes - self.start_minutes, self.row_height)
    }

    /// Pixel offset of a clock time from the top of the window
    pub fn offset_of(&self, minutes: u32) -> f64 {
        minutes_to_pixels(minutes.saturating_sub(self.start_minutes), self.row_height)
    }
}

pub(crate) fn minutes_to_pixels(minutes: u32, row_height: f64) -> f64 {
    minutes as f64 / 60.0 * row_height
}

/// An event with its position inside a day column
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedEvent {
    #[serde(flatten)]
    pub event: Event,
    /// Column inside the event's overlap cluster
    pub column: usize,
    /// Peak concurrency of the cluster
    pub column_count: usize,
    pub top_offset: f64,
    pub visual_height: f64,
    pub left_percent: f64,
    pub width_percent: f64,
}

/// Layout of a single weekday
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayLayout {
    pub day: u8,
    pub timed: Vec<PlacedEvent>,
    pub all_day: Vec<Event>,
}

/// Layout of a full week, Sunday first
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekLayout {
    pub window: DisplayWindow,
    pub days: Vec<DayLayout>,
}

impl WeekLayout {
    /// Total number of events placed, timed and all-day
    pub fn event_count(&self) -> usize {
        self.days.iter().map(|d| d.timed.len() + d.all_day.len()).sum()
    }
}

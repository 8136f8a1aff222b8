//! Weekly calendar event layout.
//!
//! Events are merged across calendars, split per weekday, clamped to the
//! display window and grouped into overlap clusters. Each cluster is divided
//! into as many equal-width columns as its peak concurrency, so overlapping
//! events render side by side.

mod layout;
mod merge;
pub mod models;
mod normalize;

pub use layout::{clamp_to_window, is_non_overlapping, layout_day, layout_week};
pub use merge::merge_duplicates;
pub use models::{DayLayout, DisplayWindow, Event, PlacedEvent, WeekLayout, MIN_VISUAL_MINUTES};
pub use normalize::{normalize_event, normalize_events};

//! Google Calendar access: the OAuth web-server flow and read-only event listing.

mod client;
pub mod models;
pub mod token;

pub use client::GoogleCalendarClient;
pub use models::{CalendarEvent, CalendarListEntry};
pub use token::{GoogleOAuth, TokenSet};

use super::google::{connected_tokens, week_layout};
use super::response::ApiError;
use super::AppState;
use crate::components::calendar_layout::{DisplayWindow, PlacedEvent, WeekLayout};
use crate::components::poller::DashboardSnapshot;
use crate::components::poller::FeedState;
use crate::error::Error;
use crate::utils::time::format_clock_minutes;
use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub struct CardView {
    pub metric: String,
    pub icon: String,
    pub value: String,
    pub change: String,
    pub trend: &'static str,
}

pub struct UsageRow {
    pub email: String,
    pub cost: String,
}

pub struct RegionRow {
    pub label: String,
    pub count: String,
}

pub struct HourMark {
    pub label: String,
    pub style: String,
}

pub struct BlockView {
    pub title: String,
    pub time_range: String,
    pub calendar: String,
    pub attendees: String,
    pub style: String,
}

pub struct DayColumn {
    pub name: &'static str,
    pub all_day: Vec<String>,
    pub has_all_day: bool,
    pub blocks: Vec<BlockView>,
}

/// Week grid ready for the template
pub struct CalendarView {
    pub show_connect: bool,
    pub notice: String,
    pub has_notice: bool,
    pub grid_style: String,
    pub hours: Vec<HourMark>,
    pub days: Vec<DayColumn>,
}

impl CalendarView {
    fn empty(window: &DisplayWindow) -> Self {
        Self {
            show_connect: false,
            notice: String::new(),
            has_notice: false,
            grid_style: format!("height:{:.1}px", window.height()),
            hours: hour_marks(window),
            days: DAY_NAMES
                .iter()
                .map(|&name| DayColumn {
                    name,
                    all_day: Vec::new(),
                    has_all_day: false,
                    blocks: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn disconnected(window: &DisplayWindow) -> Self {
        Self {
            show_connect: true,
            ..Self::empty(window)
        }
    }

    pub fn unavailable(window: &DisplayWindow, notice: String) -> Self {
        Self {
            has_notice: true,
            notice,
            ..Self::empty(window)
        }
    }

    pub fn from_layout(layout: &WeekLayout) -> Self {
        let mut view = Self::empty(&layout.window);
        for (column, day) in view.days.iter_mut().zip(&layout.days) {
            column.all_day = day.all_day.iter().map(|e| e.title.clone()).collect();
            column.has_all_day = !column.all_day.is_empty();
            column.blocks = day.timed.iter().map(block_view).collect();
        }
        view
    }
}

fn hour_marks(window: &DisplayWindow) -> Vec<HourMark> {
    let first_hour = window.start_minutes.div_ceil(60) * 60;
    (first_hour..window.end_minutes)
        .step_by(60)
        .map(|minutes| HourMark {
            label: format_clock_minutes(minutes),
            style: format!("top:{:.1}px", window.offset_of(minutes)),
        })
        .collect()
}

fn block_view(placed: &PlacedEvent) -> BlockView {
    let event = &placed.event;
    BlockView {
        title: event.title.clone(),
        time_range: format!(
            "{} - {}",
            format_clock_minutes(event.start_minutes),
            format_clock_minutes(event.end_minutes)
        ),
        calendar: event.calendar.clone(),
        attendees: event.attendees.join(", "),
        style: format!(
            "top:{:.1}px;height:{:.1}px;left:{:.4}%;width:{:.4}%",
            placed.top_offset, placed.visual_height, placed.left_percent, placed.width_percent
        ),
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardPage {
    pub refresh_secs: u64,
    pub usage_status: String,
    pub usage: Vec<UsageRow>,
    pub usage_total: String,
    pub cards_status: String,
    pub cards: Vec<CardView>,
    pub regions: Vec<RegionRow>,
    pub revenue_status: String,
    pub arr: String,
    pub total_money_made: String,
    pub calendar: CalendarView,
}

/// Status line of a feed: loading, last error, or last update time
fn feed_status<T>(feed: &FeedState<T>) -> String {
    match (&feed.error, feed.updated_at, feed.loading) {
        (Some(error), _, _) => error.clone(),
        (None, _, true) => "Loading...".to_string(),
        (None, Some(at), false) => format!("Updated {}", at.format("%H:%M UTC")),
        (None, None, false) => String::new(),
    }
}

fn format_dollars(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// Integer with thousands separators
fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl DashboardPage {
    pub fn build(snapshot: &DashboardSnapshot, calendar: CalendarView, refresh_secs: u64) -> Self {
        let usage = snapshot.usage.data.as_ref();
        let analytics = snapshot.analytics.data.as_ref();
        let revenue = snapshot.revenue.data.as_ref();

        Self {
            refresh_secs,
            usage_status: feed_status(&snapshot.usage),
            usage: usage
                .map(|u| {
                    u.data
                        .iter()
                        .map(|entry| UsageRow {
                            email: entry.email.clone(),
                            cost: format_dollars(entry.cost),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            usage_total: format_dollars(usage.map(|u| u.total).unwrap_or(0.0)),
            cards_status: feed_status(&snapshot.analytics),
            cards: analytics
                .map(|a| {
                    a.data
                        .iter()
                        .map(|card| CardView {
                            metric: card.metric.clone(),
                            icon: card.icon.clone(),
                            value: format_count(card.value),
                            change: format!("{:+}%", card.change),
                            trend: if card.change < 0 { "down" } else { "up" },
                        })
                        .collect()
                })
                .unwrap_or_default(),
            regions: analytics
                .map(|a| {
                    a.regions
                        .iter()
                        .map(|r| RegionRow {
                            label: format!("{}, {}", r.region, r.country),
                            count: format_count(r.count),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            revenue_status: feed_status(&snapshot.revenue),
            arr: format!("${}", format_count(revenue.map(|r| r.arr).unwrap_or(0))),
            total_money_made: format_dollars(revenue.map(|r| r.total_money_made).unwrap_or(0.0)),
            calendar,
        }
    }
}

pub async fn dashboard(State(state): State<AppState>, jar: CookieJar) -> Result<(CookieJar, Html<String>), ApiError> {
    let (jar, calendar) = match connected_tokens(&state, jar.clone()).await {
        Ok((jar, tokens)) => match week_layout(&state, &tokens).await {
            Ok(layout) => (jar, CalendarView::from_layout(&layout)),
            Err(e) => {
                warn!("Failed to load calendar week: {}", e);
                (jar, CalendarView::unavailable(&state.window, e.to_string()))
            }
        },
        Err(Error::NotConnected) => (jar, CalendarView::disconnected(&state.window)),
        Err(e) => {
            warn!("Failed to read calendar tokens: {}", e);
            (jar, CalendarView::unavailable(&state.window, e.to_string()))
        }
    };

    let page = {
        let snapshot = state.snapshot.read().await;
        DashboardPage::build(&snapshot, calendar, state.page_refresh_secs())
    };
    let html = page.render().map_err(|e| {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to render dashboard: {}", e))
    })?;

    Ok((jar, Html(html)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::calendar_layout::{layout_week, Event};
    use crate::components::metrics::Revenue;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn test_hour_marks() {
        let window = DisplayWindow::new(390, 600, 60.0).unwrap();
        let marks = hour_marks(&window);
        let labels: Vec<&str> = marks.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["07:00", "08:00", "09:00"]);
        assert_eq!(marks[0].style, "top:30.0px");
    }

    #[test]
    fn test_calendar_view_blocks() {
        let window = DisplayWindow::new(360, 1320, 60.0).unwrap();
        let event = Event {
            id: "1".to_string(),
            title: "Standup".to_string(),
            day: 1,
            start_minutes: 540,
            end_minutes: 570,
            attendees: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            calendar: "Work".to_string(),
            is_all_day: false,
        };
        let view = CalendarView::from_layout(&layout_week(&[event], &window));

        assert_eq!(view.days.len(), 7);
        assert_eq!(view.days[1].name, "Mon");
        let block = &view.days[1].blocks[0];
        assert_eq!(block.time_range, "09:00 - 09:30");
        assert_eq!(block.attendees, "a@example.com, b@example.com");
        assert_eq!(block.style, "top:180.0px;height:30.0px;left:0.0000%;width:100.0000%");
        assert!(!view.show_connect);
    }

    #[test]
    fn test_page_renders_snapshot() {
        let mut snapshot = DashboardSnapshot::default();
        snapshot.revenue.data = Some(Revenue {
            arr: 123456,
            total_money_made: 42.5,
        });
        snapshot.revenue.loading = false;
        snapshot.usage.error = Some("Configuration error: Missing PostHog config".to_string());

        let calendar = CalendarView::disconnected(&DisplayWindow::default());
        let html = DashboardPage::build(&snapshot, calendar, 300).render().unwrap();

        assert!(html.contains("$123,456"));
        assert!(html.contains("$42.50"));
        assert!(html.contains("Missing PostHog config"));
        assert!(html.contains("/api/google/auth"));
        assert!(html.contains("content=\"300\""));
    }
}

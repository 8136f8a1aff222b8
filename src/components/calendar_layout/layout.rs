use super::merge::merge_duplicates;
use super::models::{
    minutes_to_pixels, DayLayout, DisplayWindow, Event, PlacedEvent, WeekLayout, DAYS_PER_WEEK,
    MIN_VISUAL_MINUTES,
};
use tracing::debug;

/// An event with its clamped visible interval
#[derive(Debug, Clone, Copy)]
struct Span<'a> {
    event: &'a Event,
    start: u32,
    end: u32,
}

impl Span<'_> {
    fn overlaps(&self, other: &Span<'_>) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Bound an interval to the display window, widening collapsed intervals.
///
/// The returned interval always satisfies `start < end`.
pub fn clamp_to_window(start: u32, end: u32, window: &DisplayWindow) -> (u32, u32) {
    let start = start.clamp(window.start_minutes, window.end_minutes);
    let mut end = end.clamp(window.start_minutes, window.end_minutes);
    if end > start {
        return (start, end);
    }

    end = (start + MIN_VISUAL_MINUTES).min(window.end_minutes);
    if end > start {
        (start, end)
    } else {
        // Sitting on the window end: grow backwards from it
        (
            window.end_minutes.saturating_sub(MIN_VISUAL_MINUTES).max(window.start_minutes),
            window.end_minutes,
        )
    }
}

/// Place the timed events of one day side by side.
///
/// All-day events are skipped. Output is ordered by start, end and id.
pub fn layout_day(events: &[Event], window: &DisplayWindow) -> Vec<PlacedEvent> {
    let mut spans: Vec<Span<'_>> = events
        .iter()
        .filter(|event| !event.is_all_day)
        .map(|event| {
            let (start, end) = clamp_to_window(event.start_minutes, event.end_minutes, window);
            Span { event, start, end }
        })
        .collect();
    spans.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(a.end.cmp(&b.end))
            .then_with(|| a.event.id.cmp(&b.event.id))
    });

    let mut placed = Vec::with_capacity(spans.len());
    for cluster in clusters(&spans) {
        let peak = peak_concurrency(cluster);
        let columns = assign_columns(cluster);
        let column_count = columns.iter().map(|c| c + 1).max().unwrap_or(1).max(peak);
        if column_count != peak {
            debug!("Column count {} exceeds peak concurrency {}", column_count, peak);
        }

        let width = 100.0 / column_count as f64;
        for (span, column) in cluster.iter().zip(columns) {
            placed.push(PlacedEvent {
                event: span.event.clone(),
                column,
                column_count,
                top_offset: window.offset_of(span.start),
                visual_height: minutes_to_pixels(span.end - span.start, window.row_height),
                left_percent: column as f64 * width,
                width_percent: width,
            });
        }
    }

    placed
}

/// Split sorted spans into maximal chains of overlapping intervals
fn clusters<'s, 'a>(spans: &'s [Span<'a>]) -> Vec<&'s [Span<'a>]> {
    let mut result = Vec::new();
    let mut cluster_start = 0;
    let mut cluster_end = 0;

    for (index, span) in spans.iter().enumerate() {
        if index > cluster_start && span.start >= cluster_end {
            result.push(&spans[cluster_start..index]);
            cluster_start = index;
        }
        if index == cluster_start {
            cluster_end = span.end;
        } else {
            cluster_end = cluster_end.max(span.end);
        }
    }
    if cluster_start < spans.len() {
        result.push(&spans[cluster_start..]);
    }

    result
}

/// Largest number of spans active at one instant.
///
/// Sampled at the midpoint between each pair of consecutive boundaries, using
/// doubled coordinates so the midpoint stays integral.
fn peak_concurrency(spans: &[Span<'_>]) -> usize {
    if spans.len() <= 1 {
        return spans.len();
    }

    let mut bounds: Vec<u32> = spans.iter().flat_map(|s| [s.start, s.end]).collect();
    bounds.sort_unstable();
    bounds.dedup();

    bounds
        .windows(2)
        .map(|pair| {
            let midpoint = pair[0] + pair[1];
            spans
                .iter()
                .filter(|s| 2 * s.start < midpoint && midpoint < 2 * s.end)
                .count()
        })
        .max()
        .unwrap_or(1)
}

/// Give each span the lowest column free at its start
fn assign_columns(spans: &[Span<'_>]) -> Vec<usize> {
    let mut column_ends: Vec<u32> = Vec::new();
    spans
        .iter()
        .map(|span| match column_ends.iter().position(|&end| end <= span.start) {
            Some(column) => {
                column_ends[column] = span.end;
                column
            }
            None => {
                column_ends.push(span.end);
                column_ends.len() - 1
            }
        })
        .collect()
}

/// Lay out a whole week: merge duplicates, split by weekday and lane
pub fn layout_week(events: &[Event], window: &DisplayWindow) -> WeekLayout {
    let merged = merge_duplicates(events);

    let days = (0..DAYS_PER_WEEK)
        .map(|day| {
            let (mut all_day, timed): (Vec<Event>, Vec<Event>) = merged
                .iter()
                .filter(|event| event.day == day)
                .cloned()
                .partition(|event| event.is_all_day);
            all_day.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));

            DayLayout {
                day,
                timed: layout_day(&timed, window),
                all_day,
            }
        })
        .collect();

    WeekLayout {
        window: *window,
        days,
    }
}

/// Check that no two overlapping placed events share horizontal space
pub fn is_non_overlapping(placed: &[PlacedEvent], window: &DisplayWindow) -> bool {
    let spans: Vec<(Span<'_>, &PlacedEvent)> = placed
        .iter()
        .map(|p| {
            let (start, end) = clamp_to_window(p.event.start_minutes, p.event.end_minutes, window);
            (Span { event: &p.event, start, end }, p)
        })
        .collect();

    spans.iter().enumerate().all(|(i, (a, pa))| {
        spans[i + 1..].iter().all(|(b, pb)| {
            !a.overlaps(b)
                || pa.left_percent + pa.width_percent <= pb.left_percent + 1e-9
                || pb.left_percent + pb.width_percent <= pa.left_percent + 1e-9
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> DisplayWindow {
        DisplayWindow::new(6 * 60, 22 * 60, 60.0).unwrap()
    }

    fn timed(id: &str, start: u32, end: u32) -> Event {
        Event {
            id: id.to_string(),
            title: format!("Meeting {}", id),
            day: 1,
            start_minutes: start,
            end_minutes: end,
            attendees: Vec::new(),
            calendar: "Work".to_string(),
            is_all_day: false,
        }
    }

    #[test]
    fn test_clamp_inside_window_is_unchanged() {
        assert_eq!(clamp_to_window(540, 600, &window()), (540, 600));
    }

    #[test]
    fn test_clamp_widens_zero_length() {
        assert_eq!(clamp_to_window(540, 540, &window()), (540, 570));
        // Capped at the window end
        assert_eq!(clamp_to_window(1310, 1310, &window()), (1310, 1320));
    }

    #[test]
    fn test_clamp_outside_window() {
        // Entirely before the window: collapses onto the start and widens forward
        assert_eq!(clamp_to_window(60, 120, &window()), (360, 390));
        // Entirely after the window: anchored to the window end
        assert_eq!(clamp_to_window(1380, 1410, &window()), (1290, 1320));
        // Reversed interval is treated as collapsed
        assert_eq!(clamp_to_window(600, 540, &window()), (600, 630));
    }

    #[test]
    fn test_clusters_split_on_touching_intervals() {
        let events = vec![timed("a", 540, 600), timed("b", 600, 660), timed("c", 630, 700)];
        let placed = layout_day(&events, &window());
        assert_eq!(placed[0].column_count, 1);
        assert_eq!(placed[1].column_count, 2);
        assert_eq!(placed[2].column_count, 2);
    }

    #[test]
    fn test_peak_between_starts() {
        // a spans everything, b and c are disjoint inside it: peak is 2, not 3
        let events = vec![timed("a", 540, 720), timed("b", 560, 600), timed("c", 620, 700)];
        let placed = layout_day(&events, &window());
        assert!(placed.iter().all(|p| p.column_count == 2));
        let columns: Vec<usize> = placed.iter().map(|p| p.column).collect();
        assert_eq!(columns, vec![0, 1, 1]);
    }

    #[test]
    fn test_vertical_geometry() {
        let placed = layout_day(&[timed("a", 540, 630)], &window());
        assert_eq!(placed[0].top_offset, 180.0);
        assert_eq!(placed[0].visual_height, 90.0);
    }

    #[test]
    fn test_all_day_events_are_skipped() {
        let mut all_day = timed("a", 0, 1440);
        all_day.is_all_day = true;
        assert!(layout_day(&[all_day], &window()).is_empty());
    }

    #[test]
    fn test_empty_day() {
        assert!(layout_day(&[], &window()).is_empty());
    }

    #[test]
    fn test_week_has_seven_days() {
        let week = layout_week(&[timed("a", 540, 600)], &window());
        assert_eq!(week.days.len(), 7);
        assert_eq!(week.days[1].timed.len(), 1);
        assert_eq!(week.event_count(), 1);
    }
}

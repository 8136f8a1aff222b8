use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Timelike, Utc};

/// Minutes in a day, the exclusive upper bound of a wall-clock time
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parse time string in HH:MM format
pub fn parse_time(time_str: &str) -> Option<(u32, u32)> {
    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let hour = parts[0].parse::<u32>().ok()?;
    let minute = parts[1].parse::<u32>().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

/// Parse an HH:MM clock time into minutes since midnight.
///
/// `24:00` is accepted as the end of the day.
pub fn parse_clock_minutes(time_str: &str) -> Option<u32> {
    if time_str.trim() == "24:00" {
        return Some(MINUTES_PER_DAY);
    }
    let (hour, minute) = parse_time(time_str.trim())?;
    Some(hour * 60 + minute)
}

/// Format minutes since midnight as HH:MM
pub fn format_clock_minutes(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Minutes since midnight of a wall-clock datetime
pub fn minutes_of_day<Tz: TimeZone>(dt: &DateTime<Tz>) -> u32 {
    dt.hour() * 60 + dt.minute()
}

/// Midnight of `date` in `tz`, skipping forward an hour if midnight falls in a DST gap
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Tz>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
}

/// Get the calendar week containing `now`: Sunday 00:00 up to the following Sunday 00:00
pub fn week_range<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
    let tz = now.timezone();
    let sunday = now
        .date_naive()
        .checked_sub_signed(Duration::days(now.weekday().num_days_from_sunday() as i64))?;
    let next_sunday = sunday.checked_add_signed(Duration::days(7))?;

    Some((local_midnight(&tz, sunday)?, local_midnight(&tz, next_sunday)?))
}

/// UTC month boundaries around a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthBounds {
    pub previous_start: DateTime<Utc>,
    pub current_start: DateTime<Utc>,
    pub next_start: DateTime<Utc>,
}

/// Get the start of the previous, current and next UTC month
pub fn month_boundaries(now: &DateTime<Utc>) -> Option<MonthBounds> {
    let current = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)?;
    let previous = current.checked_sub_months(Months::new(1))?;
    let next = current.checked_add_months(Months::new(1))?;

    let at_midnight = |date: NaiveDate| date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));

    Some(MonthBounds {
        previous_start: at_midnight(previous)?,
        current_start: at_midnight(current)?,
        next_start: at_midnight(next)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Chicago;

    #[test]
    fn test_parse_time() {
        // Valid cases
        assert_eq!(parse_time("00:00"), Some((0, 0)));
        assert_eq!(parse_time("12:30"), Some((12, 30)));
        assert_eq!(parse_time("23:59"), Some((23, 59)));

        // Invalid cases
        assert_eq!(parse_time("24:00"), None); // Hour out of range
        assert_eq!(parse_time("12:60"), None); // Minute out of range
        assert_eq!(parse_time("12:30:45"), None); // Too many parts
        assert_eq!(parse_time("12"), None); // Too few parts
        assert_eq!(parse_time("12:ab"), None); // Invalid minute
    }

    #[test]
    fn test_parse_clock_minutes() {
        assert_eq!(parse_clock_minutes("06:00"), Some(360));
        assert_eq!(parse_clock_minutes(" 21:30 "), Some(1290));
        assert_eq!(parse_clock_minutes("24:00"), Some(MINUTES_PER_DAY));
        assert_eq!(parse_clock_minutes("24:30"), None);
        assert_eq!(format_clock_minutes(1290), "21:30");
        assert_eq!(format_clock_minutes(5), "00:05");
    }

    #[test]
    fn test_week_range() {
        // Wednesday, 2023-01-04 at 10:00
        let wednesday = Chicago.with_ymd_and_hms(2023, 1, 4, 10, 0, 0).unwrap();
        let (start, end) = week_range(&wednesday).unwrap();
        assert_eq!(start.format("%Y-%m-%d %H:%M").to_string(), "2023-01-01 00:00");
        assert_eq!(end.format("%Y-%m-%d %H:%M").to_string(), "2023-01-08 00:00");

        // Sunday is the first day of its own week
        let sunday = Chicago.with_ymd_and_hms(2023, 1, 8, 23, 59, 0).unwrap();
        let (start, _) = week_range(&sunday).unwrap();
        assert_eq!(start.format("%Y-%m-%d").to_string(), "2023-01-08");
    }

    #[test]
    fn test_month_boundaries() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let bounds = month_boundaries(&now).unwrap();
        assert_eq!(bounds.previous_start, Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(bounds.current_start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(bounds.next_start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_minutes_of_day() {
        let dt = Chicago.with_ymd_and_hms(2023, 1, 4, 9, 45, 0).unwrap();
        assert_eq!(minutes_of_day(&dt), 585);
    }
}

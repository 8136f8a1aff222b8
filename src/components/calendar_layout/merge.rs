use super::models::Event;
use std::collections::{BTreeMap, HashSet};

/// Merge events that appear on several calendars.
///
/// Events sharing `(title, day, start, end)` collapse into one entry whose
/// attendees are the union of all constituents, walked in ascending id order.
/// The constituent with the smallest id supplies the identity and calendar
/// name, so the result does not depend on input order.
pub fn merge_duplicates(events: &[Event]) -> Vec<Event> {
    let mut groups: BTreeMap<(&str, u8, u32, u32), Vec<&Event>> = BTreeMap::new();
    for event in events {
        groups
            .entry((event.title.as_str(), event.day, event.start_minutes, event.end_minutes))
            .or_default()
            .push(event);
    }

    groups
        .into_values()
        .map(|mut group| {
            group.sort_by(|a, b| a.id.cmp(&b.id));
            let mut merged = group[0].clone();
            if group.len() > 1 {
                merged.attendees = union_attendees(&group);
                merged.is_all_day = group.iter().all(|e| e.is_all_day);
            }
            merged
        })
        .collect()
}

fn union_attendees(group: &[&Event]) -> Vec<String> {
    let mut seen = HashSet::new();
    group
        .iter()
        .flat_map(|event| event.attendees.iter())
        .filter(|attendee| seen.insert(attendee.as_str()))
        .cloned()
        .collect()
}

//! Temporal filter and deduplicator for hourly series
//!
//! Every adapter funnels its hourly candidates through [`clean`], which turns
//! free-form time labels into validated `(hour, minute)` pairs, orders them,
//! drops duplicate hours and, for today, everything already in the past.

use chrono::{NaiveTime, Timelike};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::{DayOffset, HourlyCandidate, HourlyEntry};

// H, HH, HH:MM, HH.MM, HHhMM, optionally behind an ISO date ("2026-10-19T09:00")
static TIME_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{4}-\d{2}-\d{2}[T ])?(\d{1,2})(?:[:.h](\d{2}))?(?::\d{2})?$")
        .expect("time label pattern compiles")
});

/// Parse a time label into `(hour, minute)`; out-of-range values are rejected
#[must_use]
pub fn parse_time_label(label: &str) -> Option<(u8, u8)> {
    let caps = TIME_LABEL.captures(label.trim())?;
    let hour: u8 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u8 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    (hour <= 23 && minute <= 59).then_some((hour, minute))
}

/// Validate, sort, deduplicate and (for today) drop past entries
///
/// Duplicate hours keep the entry with strictly fewer placeholder fields; on a
/// tie the earlier entry in sorted order stays. An empty result is returned as
/// is.
#[must_use]
pub fn clean(candidates: Vec<HourlyCandidate>, day: DayOffset, now: NaiveTime) -> Vec<HourlyEntry> {
    let total = candidates.len();
    let mut entries: Vec<HourlyEntry> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let (hour, minute) = parse_time_label(&candidate.label)?;
            Some(HourlyEntry {
                hour,
                minute,
                fields: candidate.fields,
            })
        })
        .collect();
    let valid = entries.len();

    // stable: equal keys keep source order
    entries.sort_by_key(|entry| (entry.hour, entry.minute));

    let mut deduped: Vec<HourlyEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        match deduped.last_mut() {
            Some(kept) if kept.hour == entry.hour => {
                if entry.fields.placeholder_count() < kept.fields.placeholder_count() {
                    *kept = entry;
                }
            }
            _ => deduped.push(entry),
        }
    }

    if day.is_today() {
        let cutoff = (now.hour() as u8, now.minute() as u8);
        deduped.retain(|entry| (entry.hour, entry.minute) >= cutoff);
    }

    debug!(
        "timeline: {total} candidates, {valid} valid, {} kept for {day}",
        deduped.len()
    );
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Condition, HourlyFields, Wind};
    use rstest::rstest;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    /// Candidate with `real` populated fields
    fn candidate(label: &str, real: usize) -> HourlyCandidate {
        let mut fields = HourlyFields::default();
        let setters: [fn(&mut HourlyFields); 8] = [
            |f| f.temperature = Some(15.0),
            |f| f.condition = Condition::Cloudy,
            |f| f.precipitation = Some(0.0),
            |f| f.precipitation_prob = Some(5),
            |f| f.wind = Wind::new(Some(6.0), None),
            |f| f.humidity = Some(55),
            |f| f.feels_like = Some(14.0),
            |f| f.icon_ref = Some("icon".into()),
        ];
        for set in setters.iter().take(real) {
            set(&mut fields);
        }
        HourlyCandidate::new(label, fields)
    }

    fn times(entries: &[HourlyEntry]) -> Vec<String> {
        entries.iter().map(HourlyEntry::time_label).collect()
    }

    #[rstest]
    #[case("9", Some((9, 0)))]
    #[case("09", Some((9, 0)))]
    #[case("09:30", Some((9, 30)))]
    #[case("14.15", Some((14, 15)))]
    #[case("18h45", Some((18, 45)))]
    #[case("2026-10-19T07:00", Some((7, 0)))]
    #[case(" 23:59 ", Some((23, 59)))]
    #[case("25:00", None)]
    #[case("24", None)]
    #[case("12:60", None)]
    #[case("mattina", None)]
    #[case("", None)]
    fn test_parse_time_label(#[case] label: &str, #[case] expected: Option<(u8, u8)>) {
        assert_eq!(parse_time_label(label), expected);
    }

    #[test]
    fn test_output_is_strictly_increasing() {
        let input = vec![
            candidate("18:00", 3),
            candidate("06:00", 3),
            candidate("12:00", 3),
            candidate("06:00", 4),
            candidate("12:30", 3),
            candidate("00:00", 1),
        ];
        let entries = clean(input, DayOffset::new(1), at(12, 0));
        assert!(entries.windows(2).all(|w| w[0].hour < w[1].hour));
        assert_eq!(times(&entries), vec!["00:00", "06:00", "12:00", "18:00"]);
    }

    #[test]
    fn test_today_keeps_only_future_entries() {
        let input = (0..24).flat_map(|h| {
            [candidate(&format!("{h:02}:00"), 4), candidate(&format!("{h:02}:45"), 2)]
        });
        let entries = clean(input.collect(), DayOffset::TODAY, at(15, 45));
        assert!(!entries.is_empty());
        assert!(entries
            .iter()
            .all(|e| e.hour > 15 || (e.hour == 15 && e.minute >= 45)));
    }

    #[test]
    fn test_other_days_keep_every_valid_entry() {
        let input = vec![candidate("01:00", 2), candidate("05:00", 2), candidate("23:00", 2)];
        let entries = clean(input, DayOffset::new(3), at(22, 0));
        assert_eq!(times(&entries), vec!["01:00", "05:00", "23:00"]);
    }

    #[test]
    fn test_duplicate_with_fewer_placeholders_wins() {
        // 3 placeholders vs 1 placeholder
        let input = vec![candidate("09:00", 5), candidate("09:00", 7)];
        let entries = clean(input, DayOffset::new(1), at(0, 0));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].fields.placeholder_count(), 1);
    }

    #[test]
    fn test_duplicate_tie_keeps_earlier_entry() {
        let mut first = candidate("09:00", 2);
        first.fields.icon_ref = Some("first".into());
        let mut second = candidate("9", 2);
        second.fields.icon_ref = Some("second".into());

        let entries = clean(vec![first, second], DayOffset::new(2), at(0, 0));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].fields.icon_ref.as_deref(), Some("first"));
    }

    #[test]
    fn test_milano_today_at_ten() {
        let input = vec![
            candidate("09:00", 2),
            candidate("09:00", 5),
            candidate("10:00", 4),
            candidate("11:00", 4),
            candidate("25:00", 8),
        ];
        let entries = clean(input, DayOffset::TODAY, at(10, 0));
        assert_eq!(times(&entries), vec!["10:00", "11:00"]);
    }

    #[test]
    fn test_empty_after_filtering_is_empty_list() {
        let input = vec![candidate("08:00", 8), candidate("09:00", 8)];
        assert!(clean(input, DayOffset::TODAY, at(21, 0)).is_empty());
        assert!(clean(Vec::new(), DayOffset::new(1), at(0, 0)).is_empty());
    }
}

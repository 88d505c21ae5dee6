use std::collections::HashMap;
use std::hash::Hash;

use chrono::NaiveDateTime;

use crate::models::{Event, GroupRetention};

/// Elapsed-day windows that count as a return. D7 and D30 are widened past
/// the exact day to tolerate sparse event sampling; the bounds are load-bearing
/// for compatibility with reference outputs.
pub const D1_WINDOW: (i64, i64) = (1, 1);
pub const D7_WINDOW: (i64, i64) = (7, 10);
pub const D30_WINDOW: (i64, i64) = (30, 35);

#[derive(Default)]
struct ReturnFlags {
    d1: bool,
    d7: bool,
    d30: bool,
}

/// D1/D7/D30 retention per grouping key.
///
/// `key_of` receives the event's index and the event and yields the partition
/// key, or `None` to leave the event out (e.g. no cell assignment). A user's
/// first event is tracked per key, so the same user can anchor different
/// cohorts in different groups.
///
/// Results are sorted by D1 percentage descending, key ascending.
pub fn retention_by<K, F>(events: &[Event], key_of: F) -> Vec<GroupRetention<K>>
where
    K: Clone + Eq + Hash + Ord,
    F: Fn(usize, &Event) -> Option<K>,
{
    let mut first_seen: HashMap<(K, &str), NaiveDateTime> = HashMap::new();
    for (idx, event) in events.iter().enumerate() {
        let Some(key) = key_of(idx, event) else {
            continue;
        };
        let entry = first_seen
            .entry((key, event.user_id.as_str()))
            .or_insert(event.timestamp);
        if event.timestamp < *entry {
            *entry = event.timestamp;
        }
    }

    let mut flags: HashMap<(K, &str), ReturnFlags> = HashMap::new();
    for (idx, event) in events.iter().enumerate() {
        let Some(key) = key_of(idx, event) else {
            continue;
        };
        let lookup = (key, event.user_id.as_str());
        let Some(first) = first_seen.get(&lookup) else {
            continue;
        };
        let elapsed_days = (event.timestamp - *first).num_days();
        if elapsed_days <= 0 {
            continue;
        }
        let entry = flags.entry(lookup).or_default();
        entry.d1 |= in_window(elapsed_days, D1_WINDOW);
        entry.d7 |= in_window(elapsed_days, D7_WINDOW);
        entry.d30 |= in_window(elapsed_days, D30_WINDOW);
    }

    let mut groups: HashMap<K, GroupRetention<K>> = HashMap::new();
    for ((key, user), _) in &first_seen {
        let entry = groups.entry(key.clone()).or_insert_with(|| GroupRetention {
            key: key.clone(),
            total_users: 0,
            d1_retained: 0,
            d7_retained: 0,
            d30_retained: 0,
        });
        entry.total_users += 1;
        if let Some(user_flags) = flags.get(&(key.clone(), *user)) {
            entry.d1_retained += user_flags.d1 as usize;
            entry.d7_retained += user_flags.d7 as usize;
            entry.d30_retained += user_flags.d30 as usize;
        }
    }

    let mut results: Vec<GroupRetention<K>> = groups.into_values().collect();
    results.sort_by(|a, b| {
        b.d1_pct()
            .partial_cmp(&a.d1_pct())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    results
}

/// Retention partitioned by city.
pub fn retention_by_city(events: &[Event]) -> Vec<GroupRetention<String>> {
    retention_by(events, |_, event| Some(event.city.clone()))
}

fn in_window(elapsed_days: i64, (lo, hi): (i64, i64)) -> bool {
    elapsed_days >= lo && elapsed_days <= hi
}

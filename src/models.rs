use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use h3o::CellIndex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Search,
    Navigation,
    PlaceView,
    ShareLocation,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::Search,
        EventType::Navigation,
        EventType::PlaceView,
        EventType::ShareLocation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Search => "search",
            EventType::Navigation => "navigation",
            EventType::PlaceView => "place_view",
            EventType::ShareLocation => "share_location",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    Low,
    Medium,
    High,
}

impl EngagementLevel {
    pub const ALL: [EngagementLevel; 3] = [
        EngagementLevel::Low,
        EngagementLevel::Medium,
        EngagementLevel::High,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementLevel::Low => "low",
            EngagementLevel::Medium => "medium",
            EngagementLevel::High => "high",
        }
    }

    /// Session durations scale with how engaged the user is.
    pub fn duration_multiplier(&self) -> f64 {
        match self {
            EngagementLevel::Low => 0.7,
            EngagementLevel::Medium => 1.0,
            EngagementLevel::High => 1.5,
        }
    }
}

/// One synthetic user event. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub user_id: String,
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub event_type: EventType,
    pub session_duration: i64,
    pub city: String,
    pub user_engagement: EngagementLevel,
}

/// D1/D7/D30 retention for one grouping key (a city or an H3 cell).
#[derive(Debug, Clone)]
pub struct GroupRetention<K> {
    pub key: K,
    pub total_users: usize,
    pub d1_retained: usize,
    pub d7_retained: usize,
    pub d30_retained: usize,
}

impl<K> GroupRetention<K> {
    pub fn d1_pct(&self) -> f64 {
        pct(self.d1_retained, self.total_users)
    }

    pub fn d7_pct(&self) -> f64 {
        pct(self.d7_retained, self.total_users)
    }

    pub fn d30_pct(&self) -> f64 {
        pct(self.d30_retained, self.total_users)
    }
}

// A group with no users retains nobody, not an error.
fn pct(retained: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        retained as f64 * 100.0 / total as f64
    }
}

/// Per-cell aggregates for one H3 hexagon at the analysis resolution.
#[derive(Debug, Clone)]
pub struct HexCell {
    pub cell: CellIndex,
    pub city: String,
    pub event_count: u64,
    pub unique_users: u64,
    pub avg_session_duration: f64,
    pub center_lat: f64,
    pub center_lon: f64,
    pub area_km2: f64,
    pub event_density: f64,
}

/// City-level rollup of the hexagon table.
#[derive(Debug, Clone)]
pub struct CityDensity {
    pub city: String,
    pub total_events: u64,
    pub total_users: u64,
    pub avg_density: f64,
    pub max_density: f64,
    pub std_density: f64,
    pub hex_count: usize,
    pub events_per_hex: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AreaType {
    Urban,
    Suburban,
}

impl AreaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AreaType::Urban => "urban",
            AreaType::Suburban => "suburban",
        }
    }
}

/// Urban-core vs suburban engagement split for one city.
#[derive(Debug, Clone)]
pub struct AreaComparison {
    pub city: String,
    pub area_type: AreaType,
    pub event_count: u64,
    pub unique_users: u64,
    pub avg_session_duration: f64,
}

/// Mean per-cell retention percentages for a city.
#[derive(Debug, Clone)]
pub struct CityRetentionMean {
    pub city: String,
    pub d1_pct: f64,
    pub d7_pct: f64,
    pub d30_pct: f64,
}

/// Written as `spatial_summary.json` after each spatial run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialSummary {
    pub total_hexagons: usize,
    pub total_hotspots: usize,
    pub avg_event_density: f64,
    pub max_event_density: f64,
    pub cities_analyzed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Written as `data_summary.json` after generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSummary {
    pub total_events: usize,
    pub unique_users: usize,
    pub cities: Vec<String>,
    pub date_range: Option<DateRange>,
    pub event_types: BTreeMap<String, u64>,
    pub events_by_city: BTreeMap<String, u64>,
}

impl DataSummary {
    pub fn from_events(events: &[Event]) -> Self {
        let mut users = std::collections::HashSet::new();
        let mut cities = std::collections::BTreeSet::new();
        let mut event_types = BTreeMap::new();
        let mut events_by_city = BTreeMap::new();

        for event in events {
            users.insert(event.user_id.as_str());
            cities.insert(event.city.clone());
            *event_types
                .entry(event.event_type.as_str().to_string())
                .or_insert(0u64) += 1;
            *events_by_city.entry(event.city.clone()).or_insert(0u64) += 1;
        }

        // Events arrive sorted by timestamp, but don't rely on it here.
        let date_range = match (
            events.iter().map(|e| e.timestamp).min(),
            events.iter().map(|e| e.timestamp).max(),
        ) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };

        DataSummary {
            total_events: events.len(),
            unique_users: users.len(),
            cities: cities.into_iter().collect(),
            date_range,
            event_types,
            events_by_city,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn event(user: &str, city: &str, event_type: EventType) -> Event {
        Event {
            event_id: "evt_000000".to_string(),
            user_id: user.to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .expect("valid timestamp"),
            latitude: 40.7128,
            longitude: -74.0060,
            event_type,
            session_duration: 60,
            city: city.to_string(),
            user_engagement: EngagementLevel::Medium,
        }
    }

    #[test]
    fn retention_pct_guards_empty_groups() {
        let empty = GroupRetention {
            key: "Nowhere".to_string(),
            total_users: 0,
            d1_retained: 0,
            d7_retained: 0,
            d30_retained: 0,
        };
        assert_eq!(empty.d1_pct(), 0.0);
        assert_eq!(empty.d7_pct(), 0.0);
        assert_eq!(empty.d30_pct(), 0.0);

        let half = GroupRetention {
            key: "Boston".to_string(),
            total_users: 4,
            d1_retained: 2,
            d7_retained: 1,
            d30_retained: 0,
        };
        assert_eq!(half.d1_pct(), 50.0);
        assert_eq!(half.d7_pct(), 25.0);
    }

    #[test]
    fn data_summary_counts_by_city_and_type() {
        let events = vec![
            event("user_00001", "Boston", EventType::Search),
            event("user_00001", "Boston", EventType::Navigation),
            event("user_00002", "Miami", EventType::Search),
        ];
        let summary = DataSummary::from_events(&events);
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.unique_users, 2);
        assert_eq!(
            summary.cities,
            vec!["Boston".to_string(), "Miami".to_string()]
        );
        assert_eq!(summary.event_types.get("search"), Some(&2));
        assert_eq!(summary.events_by_city.get("Boston"), Some(&2));
    }

    #[test]
    fn event_type_serde_uses_snake_case() {
        let json = serde_json::to_string(&EventType::PlaceView).expect("serialize");
        assert_eq!(json, "\"place_view\"");
        let back: EventType = serde_json::from_str("\"share_location\"").expect("deserialize");
        assert_eq!(back, EventType::ShareLocation);
    }
}

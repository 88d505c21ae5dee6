use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::EventType;

/// A city the generator can place users in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityConfig {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Relative share of users assigned to this city.
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DurationRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

/// Base session-duration ranges per event type, before the engagement
/// multiplier is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationRanges {
    pub search: DurationRange,
    pub navigation: DurationRange,
    pub place_view: DurationRange,
    pub share_location: DurationRange,
}

impl DurationRanges {
    pub fn for_type(&self, event_type: EventType) -> DurationRange {
        match event_type {
            EventType::Search => self.search,
            EventType::Navigation => self.navigation,
            EventType::PlaceView => self.place_view,
            EventType::ShareLocation => self.share_location,
        }
    }
}

/// Relative frequency of each event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTypeWeights {
    pub search: f64,
    pub navigation: f64,
    pub place_view: f64,
    pub share_location: f64,
}

impl EventTypeWeights {
    /// Weights in `EventType::ALL` order.
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.search,
            self.navigation,
            self.place_view,
            self.share_location,
        ]
    }
}

/// Priors for the per-user engagement level, sampled once at user creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementPriors {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl EngagementPriors {
    /// Weights in `EngagementLevel::ALL` order.
    pub fn as_array(&self) -> [f64; 3] {
        [self.low, self.medium, self.high]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub num_events: usize,
    pub num_users: usize,
    pub radius_km: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub seed: u64,
    pub cities: Vec<CityConfig>,
    pub event_type_weights: EventTypeWeights,
    pub durations: DurationRanges,
    pub engagement_priors: EngagementPriors,
    /// Relative event volume per hour of day, midnight first.
    pub hourly_weights: [f64; 24],
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            num_events: 100_000,
            num_users: 8_000,
            radius_km: 5.0,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid default date"),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).expect("valid default date"),
            seed: 2024,
            cities: default_cities(),
            event_type_weights: EventTypeWeights {
                search: 0.40,
                navigation: 0.30,
                place_view: 0.20,
                share_location: 0.10,
            },
            durations: DurationRanges {
                search: DurationRange {
                    min_secs: 30.0,
                    max_secs: 60.0,
                },
                navigation: DurationRange {
                    min_secs: 180.0,
                    max_secs: 600.0,
                },
                place_view: DurationRange {
                    min_secs: 45.0,
                    max_secs: 120.0,
                },
                share_location: DurationRange {
                    min_secs: 20.0,
                    max_secs: 40.0,
                },
            },
            engagement_priors: EngagementPriors {
                low: 0.5,
                medium: 0.3,
                high: 0.2,
            },
            // Peaks through daytime and evening, near-dead overnight.
            hourly_weights: [
                0.01, 0.01, 0.01, 0.01, 0.01, 0.02, // 0-5
                0.03, 0.05, 0.08, 0.09, 0.08, 0.07, // 6-11
                0.07, 0.06, 0.06, 0.07, 0.08, 0.09, // 12-17
                0.08, 0.07, 0.05, 0.03, 0.02, 0.01, // 18-23
            ],
        }
    }
}

impl GeneratorConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: GeneratorConfig = serde_json::from_str(&raw)
            .with_context(|| format!("invalid generator config in {}", path.display()))?;
        Ok(config)
    }

    /// Invalid configuration is fatal before any generation starts.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.num_events == 0 {
            bail!("num_events must be greater than zero");
        }
        if self.num_users == 0 {
            bail!("num_users must be greater than zero");
        }
        if self.radius_km <= 0.0 {
            bail!("radius_km must be positive, got {}", self.radius_km);
        }
        if self.cities.is_empty() {
            bail!("at least one city is required");
        }
        if self.end_date <= self.start_date {
            bail!(
                "date range is empty: {} .. {}",
                self.start_date,
                self.end_date
            );
        }
        for city in &self.cities {
            if city.weight < 0.0 {
                bail!("city {} has a negative weight", city.name);
            }
        }
        if self.cities.iter().map(|c| c.weight).sum::<f64>() <= 0.0 {
            bail!("city weights must sum to a positive value");
        }
        if self.event_type_weights.as_array().iter().sum::<f64>() <= 0.0 {
            bail!("event type weights must sum to a positive value");
        }
        if self.engagement_priors.as_array().iter().sum::<f64>() <= 0.0 {
            bail!("engagement priors must sum to a positive value");
        }
        if self.hourly_weights.iter().sum::<f64>() <= 0.0 {
            bail!("hourly weights must sum to a positive value");
        }
        for event_type in EventType::ALL {
            let range = self.durations.for_type(event_type);
            if range.min_secs <= 0.0 || range.max_secs <= range.min_secs {
                bail!(
                    "invalid duration range for {}: {} .. {}",
                    event_type.as_str(),
                    range.min_secs,
                    range.max_secs
                );
            }
        }
        Ok(())
    }
}

/// 15 major US cities, weighted roughly by population.
fn default_cities() -> Vec<CityConfig> {
    let cities = [
        ("New York", 40.7128, -74.0060, 0.10),
        ("Los Angeles", 34.0522, -118.2437, 0.09),
        ("Chicago", 41.8781, -87.6298, 0.08),
        ("Houston", 29.7604, -95.3698, 0.07),
        ("Phoenix", 33.4484, -112.0740, 0.06),
        ("Philadelphia", 39.9526, -75.1652, 0.06),
        ("San Antonio", 29.4241, -98.4936, 0.05),
        ("San Diego", 32.7157, -117.1611, 0.05),
        ("Dallas", 32.7767, -96.7970, 0.05),
        ("San Jose", 37.3382, -121.8863, 0.05),
        ("Austin", 30.2672, -97.7431, 0.05),
        ("Seattle", 47.6062, -122.3321, 0.05),
        ("Denver", 39.7392, -104.9903, 0.05),
        ("Boston", 42.3601, -71.0589, 0.06),
        ("Miami", 25.7617, -80.1918, 0.13),
    ];
    cities
        .into_iter()
        .map(|(name, lat, lon, weight)| CityConfig {
            name: name.to_string(),
            lat,
            lon,
            weight,
        })
        .collect()
}

/// City centers used for the urban-vs-suburban split. Cities outside this
/// set stay unclassified in that view.
pub fn default_urban_centers() -> HashMap<String, (f64, f64)> {
    [
        ("San Francisco", (37.7749, -122.4194)),
        ("New York", (40.7128, -74.0060)),
        ("Los Angeles", (34.0522, -118.2437)),
        ("Chicago", (41.8781, -87.6298)),
        ("Seattle", (47.6062, -122.3321)),
    ]
    .into_iter()
    .map(|(name, center)| (name.to_string(), center))
    .collect()
}

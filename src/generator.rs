use anyhow::Context;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::GeneratorConfig;
use crate::models::{EngagementLevel, Event, EventType};

const KM_PER_DEGREE: f64 = 111.0;

/// Scale of the exponential distance falloff, as a fraction of the city
/// radius. Keeps most events near the urban core.
const RADIAL_SCALE: f64 = 0.3;

struct UserProfile {
    id: String,
    city: usize,
    engagement: EngagementLevel,
}

/// Generate the full synthetic event table. The same config and seed always
/// produce the same events, byte for byte.
pub fn generate_events(config: &GeneratorConfig) -> anyhow::Result<Vec<Event>> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);

    let city_dist = WeightedIndex::new(config.cities.iter().map(|c| c.weight))
        .context("invalid city weights")?;
    let engagement_dist = WeightedIndex::new(config.engagement_priors.as_array())
        .context("invalid engagement priors")?;
    let type_dist = WeightedIndex::new(config.event_type_weights.as_array())
        .context("invalid event type weights")?;
    let hour_dist =
        WeightedIndex::new(config.hourly_weights).context("invalid hourly weights")?;

    // City and engagement are fixed for a user's lifetime.
    let users: Vec<UserProfile> = (0..config.num_users)
        .map(|i| UserProfile {
            id: format!("user_{i:05}"),
            city: city_dist.sample(&mut rng),
            engagement: EngagementLevel::ALL[engagement_dist.sample(&mut rng)],
        })
        .collect();

    let total_days = (config.end_date - config.start_date).num_days();
    let mut events = Vec::with_capacity(config.num_events);

    for i in 0..config.num_events {
        let user = &users[rng.gen_range(0..users.len())];
        let timestamp =
            sample_timestamp(&mut rng, config.start_date, total_days, &hour_dist)?;

        let city = &config.cities[user.city];
        let (latitude, longitude) =
            sample_point(&mut rng, city.lat, city.lon, config.radius_km);

        let event_type = EventType::ALL[type_dist.sample(&mut rng)];
        let range = config.durations.for_type(event_type);
        let session_duration = (rng.gen_range(range.min_secs..range.max_secs)
            * user.engagement.duration_multiplier()) as i64;

        events.push(Event {
            event_id: format!("evt_{i:06}"),
            user_id: user.id.clone(),
            timestamp,
            latitude,
            longitude,
            event_type,
            session_duration,
            city: city.name.clone(),
            user_engagement: user.engagement,
        });
    }

    // Downstream components expect the table ordered by time. Stable sort
    // keeps generation order for equal timestamps.
    events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    Ok(events)
}

fn sample_timestamp(
    rng: &mut StdRng,
    start_date: NaiveDate,
    total_days: i64,
    hour_dist: &WeightedIndex<f64>,
) -> anyhow::Result<NaiveDateTime> {
    let date = start_date + Duration::days(rng.gen_range(0..total_days));
    let hour = hour_dist.sample(rng) as u32;
    let minute = rng.gen_range(0..60);
    let second = rng.gen_range(0..60);
    date.and_hms_opt(hour, minute, second)
        .context("sampled clock fields out of range")
}

/// Random point around a city center: exponential distance law capped at the
/// radius, uniform angle.
fn sample_point(rng: &mut StdRng, center_lat: f64, center_lon: f64, radius_km: f64) -> (f64, f64) {
    let radius_deg = radius_km / KM_PER_DEGREE;
    let distance = (sample_exponential(rng, RADIAL_SCALE) * radius_deg).min(radius_deg);
    let angle = rng.gen_range(0.0..std::f64::consts::TAU);

    let lat = center_lat + distance * angle.cos();
    let lon = center_lon + distance * angle.sin();
    (round6(lat), round6(lon))
}

// Inverse-CDF sample of the exponential distribution.
fn sample_exponential(rng: &mut StdRng, scale: f64) -> f64 {
    -scale * (1.0 - rng.gen::<f64>()).ln()
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::CityConfig;

    fn small_config() -> GeneratorConfig {
        GeneratorConfig {
            num_events: 500,
            num_users: 40,
            seed: 7,
            cities: vec![
                CityConfig {
                    name: "Boston".to_string(),
                    lat: 42.3601,
                    lon: -71.0589,
                    weight: 0.5,
                },
                CityConfig {
                    name: "Miami".to_string(),
                    lat: 25.7617,
                    lon: -80.1918,
                    weight: 0.5,
                },
            ],
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn same_seed_reproduces_identical_events() {
        let config = small_config();
        let first = generate_events(&config).expect("generate");
        let second = generate_events(&config).expect("generate");
        assert_eq!(first, second);
    }

    #[test]
    fn different_seeds_diverge() {
        let config = small_config();
        let other = GeneratorConfig {
            seed: 8,
            ..small_config()
        };
        let first = generate_events(&config).expect("generate");
        let second = generate_events(&other).expect("generate");
        assert_ne!(first, second);
    }

    #[test]
    fn events_are_sorted_by_timestamp() {
        let events = generate_events(&small_config()).expect("generate");
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn users_keep_city_and_engagement() {
        let events = generate_events(&small_config()).expect("generate");
        let mut seen: HashMap<&str, (&str, crate::models::EngagementLevel)> = HashMap::new();
        for event in &events {
            let entry = seen
                .entry(event.user_id.as_str())
                .or_insert((event.city.as_str(), event.user_engagement));
            assert_eq!(entry.0, event.city.as_str());
            assert_eq!(entry.1, event.user_engagement);
        }
    }

    #[test]
    fn coordinates_stay_within_city_radius() {
        let config = small_config();
        let centers: HashMap<&str, (f64, f64)> = config
            .cities
            .iter()
            .map(|c| (c.name.as_str(), (c.lat, c.lon)))
            .collect();
        let radius_deg = config.radius_km / KM_PER_DEGREE;

        let events = generate_events(&config).expect("generate");
        for event in &events {
            let (lat, lon) = centers[event.city.as_str()];
            let offset = ((event.latitude - lat).powi(2) + (event.longitude - lon).powi(2)).sqrt();
            // 6-decimal rounding can push the offset a hair past the cap.
            assert!(offset <= radius_deg + 1e-5, "offset {offset} too large");
        }
    }

    #[test]
    fn durations_respect_type_and_engagement_bounds() {
        let config = small_config();
        let events = generate_events(&config).expect("generate");
        for event in &events {
            let range = config.durations.for_type(event.event_type);
            let multiplier = event.user_engagement.duration_multiplier();
            let min = (range.min_secs * multiplier).floor() as i64;
            let max = (range.max_secs * multiplier).ceil() as i64;
            assert!(
                event.session_duration >= min && event.session_duration <= max,
                "duration {} outside [{min}, {max}] for {}",
                event.session_duration,
                event.event_type.as_str()
            );
            assert!(event.session_duration > 0);
        }
    }

    #[test]
    fn invalid_config_fails_fast() {
        let config = GeneratorConfig {
            num_events: 0,
            ..small_config()
        };
        assert!(generate_events(&config).is_err());
    }

    #[test]
    fn event_ids_are_unique() {
        let events = generate_events(&small_config()).expect("generate");
        let ids: std::collections::HashSet<&str> =
            events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids.len(), events.len());
    }
}

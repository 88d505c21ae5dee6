use std::collections::{HashMap, HashSet};

use anyhow::Context;
use h3o::{CellIndex, LatLng, Resolution};

use crate::models::{
    AreaComparison, AreaType, CityDensity, CityRetentionMean, Event, GroupRetention, HexCell,
    SpatialSummary,
};
use crate::retention;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Map every event to its H3 cell at the given resolution. Pure per row:
/// the same coordinate always lands in the same cell.
pub fn assign_cells(events: &[Event], resolution: Resolution) -> anyhow::Result<Vec<CellIndex>> {
    events
        .iter()
        .map(|event| {
            let coord = LatLng::new(event.latitude, event.longitude).with_context(|| {
                format!(
                    "event {} has out-of-range coordinates ({}, {})",
                    event.event_id, event.latitude, event.longitude
                )
            })?;
            Ok(coord.to_cell(resolution))
        })
        .collect()
}

/// Aggregate events into the hexagon table. `cells` must be the parallel
/// assignment produced by [`assign_cells`].
pub fn aggregate_cells(events: &[Event], cells: &[CellIndex]) -> Vec<HexCell> {
    struct Accum<'a> {
        event_count: u64,
        users: HashSet<&'a str>,
        duration_sum: f64,
        // city -> (count, first index seen), for the modal label
        cities: HashMap<&'a str, (u64, usize)>,
    }

    let mut accums: HashMap<CellIndex, Accum> = HashMap::new();
    for (idx, (event, cell)) in events.iter().zip(cells.iter()).enumerate() {
        let accum = accums.entry(*cell).or_insert_with(|| Accum {
            event_count: 0,
            users: HashSet::new(),
            duration_sum: 0.0,
            cities: HashMap::new(),
        });
        accum.event_count += 1;
        accum.users.insert(event.user_id.as_str());
        accum.duration_sum += event.session_duration as f64;
        accum
            .cities
            .entry(event.city.as_str())
            .or_insert((0, idx))
            .0 += 1;
    }

    let mut hexes: Vec<HexCell> = accums
        .into_iter()
        .map(|(cell, accum)| {
            // Modal city; ties go to the city encountered first.
            let city = accum
                .cities
                .iter()
                .max_by(|(_, (count_a, idx_a)), (_, (count_b, idx_b))| {
                    count_a.cmp(count_b).then(idx_b.cmp(idx_a))
                })
                .map(|(city, _)| (*city).to_string())
                .unwrap_or_default();

            let center = LatLng::from(cell);
            let area_km2 = cell.area_km2();
            HexCell {
                cell,
                city,
                event_count: accum.event_count,
                unique_users: accum.users.len() as u64,
                avg_session_duration: accum.duration_sum / accum.event_count as f64,
                center_lat: center.lat(),
                center_lon: center.lng(),
                area_km2,
                event_density: accum.event_count as f64 / area_km2,
            }
        })
        .collect();

    hexes.sort_by_key(|hex| hex.cell);
    hexes
}

/// Percentile with linear interpolation between order statistics.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Cells at or above the density percentile threshold, densest first.
/// Recomputed from scratch on every call; nothing is cached across cell sets.
pub fn hotspots(hexes: &[HexCell], pct: f64) -> (f64, Vec<HexCell>) {
    let densities: Vec<f64> = hexes.iter().map(|h| h.event_density).collect();
    let Some(threshold) = percentile(&densities, pct) else {
        return (0.0, Vec::new());
    };

    let mut spots: Vec<HexCell> = hexes
        .iter()
        .filter(|h| h.event_density >= threshold)
        .cloned()
        .collect();
    spots.sort_by(|a, b| b.event_density.total_cmp(&a.event_density));
    (threshold, spots)
}

/// Per-city rollup of the hexagon table, sorted by mean density descending.
pub fn city_density(hexes: &[HexCell]) -> Vec<CityDensity> {
    let mut by_city: HashMap<&str, Vec<&HexCell>> = HashMap::new();
    for hex in hexes {
        by_city.entry(hex.city.as_str()).or_default().push(hex);
    }

    let mut metrics: Vec<CityDensity> = by_city
        .into_iter()
        .map(|(city, cells)| {
            let total_events: u64 = cells.iter().map(|c| c.event_count).sum();
            let total_users: u64 = cells.iter().map(|c| c.unique_users).sum();
            let densities: Vec<f64> = cells.iter().map(|c| c.event_density).collect();
            let avg_density = densities.iter().sum::<f64>() / densities.len() as f64;
            let max_density = densities.iter().copied().fold(f64::MIN, f64::max);
            let hex_count = cells.len();
            CityDensity {
                city: city.to_string(),
                total_events,
                total_users,
                avg_density,
                max_density,
                std_density: sample_stddev(&densities, avg_density),
                hex_count,
                events_per_hex: total_events as f64 / hex_count as f64,
            }
        })
        .collect();

    metrics.sort_by(|a, b| {
        b.avg_density
            .total_cmp(&a.avg_density)
            .then_with(|| a.city.cmp(&b.city))
    });
    metrics
}

fn sample_stddev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Great-circle distance between two WGS84 coordinates.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Urban-core vs suburban split per city. Events whose city has no configured
/// center are left out of this view; they stay in the base table.
pub fn urban_suburban(
    events: &[Event],
    centers: &HashMap<String, (f64, f64)>,
    urban_radius_km: f64,
) -> Vec<AreaComparison> {
    struct Accum<'a> {
        event_count: u64,
        users: HashSet<&'a str>,
        duration_sum: f64,
    }

    let mut groups: HashMap<(&str, AreaType), Accum> = HashMap::new();
    for event in events {
        let Some((center_lat, center_lon)) = centers.get(&event.city) else {
            continue;
        };
        let distance = haversine_km(event.latitude, event.longitude, *center_lat, *center_lon);
        let area_type = if distance <= urban_radius_km {
            AreaType::Urban
        } else {
            AreaType::Suburban
        };

        let accum = groups
            .entry((event.city.as_str(), area_type))
            .or_insert_with(|| Accum {
                event_count: 0,
                users: HashSet::new(),
                duration_sum: 0.0,
            });
        accum.event_count += 1;
        accum.users.insert(event.user_id.as_str());
        accum.duration_sum += event.session_duration as f64;
    }

    let mut comparisons: Vec<AreaComparison> = groups
        .into_iter()
        .map(|((city, area_type), accum)| AreaComparison {
            city: city.to_string(),
            area_type,
            event_count: accum.event_count,
            unique_users: accum.users.len() as u64,
            avg_session_duration: accum.duration_sum / accum.event_count as f64,
        })
        .collect();

    comparisons.sort_by(|a, b| a.city.cmp(&b.city).then(a.area_type.cmp(&b.area_type)));
    comparisons
}

/// Retention keyed by H3 cell, plus per-city means of the per-cell
/// percentages. The city label for each cell comes from the hexagon table.
pub fn retention_by_region(
    events: &[Event],
    cells: &[CellIndex],
    hexes: &[HexCell],
) -> (Vec<GroupRetention<CellIndex>>, Vec<CityRetentionMean>) {
    let cell_retention = retention::retention_by(events, |idx, _| Some(cells[idx]));

    let cell_city: HashMap<CellIndex, &str> =
        hexes.iter().map(|h| (h.cell, h.city.as_str())).collect();

    let mut by_city: HashMap<&str, Vec<&GroupRetention<CellIndex>>> = HashMap::new();
    for group in &cell_retention {
        if let Some(city) = cell_city.get(&group.key) {
            by_city.entry(city).or_default().push(group);
        }
    }

    let mut means: Vec<CityRetentionMean> = by_city
        .into_iter()
        .map(|(city, groups)| {
            let n = groups.len() as f64;
            CityRetentionMean {
                city: city.to_string(),
                d1_pct: groups.iter().map(|g| g.d1_pct()).sum::<f64>() / n,
                d7_pct: groups.iter().map(|g| g.d7_pct()).sum::<f64>() / n,
                d30_pct: groups.iter().map(|g| g.d30_pct()).sum::<f64>() / n,
            }
        })
        .collect();
    means.sort_by(|a, b| a.city.cmp(&b.city));

    (cell_retention, means)
}

/// The summary record persisted after each spatial run.
pub fn summarize(hexes: &[HexCell], hotspot_count: usize) -> SpatialSummary {
    let densities: Vec<f64> = hexes.iter().map(|h| h.event_density).collect();
    let avg = if densities.is_empty() {
        0.0
    } else {
        densities.iter().sum::<f64>() / densities.len() as f64
    };
    let max = densities.iter().copied().fold(0.0, f64::max);

    let mut cities: Vec<String> = hexes
        .iter()
        .map(|h| h.city.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    cities.sort();

    SpatialSummary {
        total_hexagons: hexes.len(),
        total_hotspots: hotspot_count,
        avg_event_density: avg,
        max_event_density: max,
        cities_analyzed: cities,
    }
}

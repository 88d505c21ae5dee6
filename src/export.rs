//! File artifacts: the event CSV, GeoJSON layers and JSON summaries.

use std::path::Path;

use anyhow::{bail, Context};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use h3o::CellIndex;
use serde_json::json;

use crate::models::{DataSummary, Event, HexCell, SpatialSummary};

pub fn write_events_csv(path: &Path, events: &[Event]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for event in events {
        writer.serialize(event)?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn read_events_csv(path: &Path) -> anyhow::Result<Vec<Event>> {
    if !path.exists() {
        bail!(
            "event table not found: {} (run `geopulse generate` first)",
            path.display()
        );
    }
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut events = Vec::new();
    for row in reader.deserialize::<Event>() {
        events.push(row.with_context(|| format!("malformed event row in {}", path.display()))?);
    }
    Ok(events)
}

pub fn write_data_summary(path: &Path, summary: &DataSummary) -> anyhow::Result<()> {
    let raw = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn write_spatial_summary(path: &Path, summary: &SpatialSummary) -> anyhow::Result<()> {
    let raw = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn read_spatial_summary(path: &Path) -> anyhow::Result<SpatialSummary> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid spatial summary {}", path.display()))
}

/// Write hexagons as a GeoJSON FeatureCollection; each feature carries the
/// cell boundary polygon plus all per-cell attributes.
pub fn write_hex_geojson(path: &Path, hexes: &[HexCell]) -> anyhow::Result<()> {
    let features: Vec<Feature> = hexes.iter().map(hex_feature).collect();
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    std::fs::write(path, GeoJson::from(collection).to_string())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn hex_feature(hex: &HexCell) -> Feature {
    // GeoJSON rings are [lon, lat] and must close on the first vertex.
    let mut ring: Vec<Vec<f64>> = hex
        .cell
        .boundary()
        .iter()
        .map(|vertex| vec![vertex.lng(), vertex.lat()])
        .collect();
    if let Some(first) = ring.first().cloned() {
        ring.push(first);
    }

    let mut properties = JsonObject::new();
    properties.insert("h3_index".to_string(), json!(hex.cell.to_string()));
    properties.insert("city".to_string(), json!(hex.city));
    properties.insert("event_count".to_string(), json!(hex.event_count));
    properties.insert("unique_users".to_string(), json!(hex.unique_users));
    properties.insert(
        "avg_session_duration".to_string(),
        json!(hex.avg_session_duration),
    );
    properties.insert("center_lat".to_string(), json!(hex.center_lat));
    properties.insert("center_lon".to_string(), json!(hex.center_lon));
    properties.insert("area_km2".to_string(), json!(hex.area_km2));
    properties.insert("event_density".to_string(), json!(hex.event_density));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Reload a hexagon layer written by [`write_hex_geojson`].
pub fn read_hex_geojson(path: &Path) -> anyhow::Result<Vec<HexCell>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let geojson: GeoJson = raw
        .parse()
        .with_context(|| format!("invalid GeoJSON in {}", path.display()))?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        bail!("{} is not a GeoJSON FeatureCollection", path.display());
    };

    let mut hexes = Vec::with_capacity(collection.features.len());
    for feature in &collection.features {
        let props = feature
            .properties
            .as_ref()
            .context("hexagon feature without properties")?;
        let cell: CellIndex = prop_str(props, "h3_index")?
            .parse()
            .context("invalid h3_index property")?;
        hexes.push(HexCell {
            cell,
            city: prop_str(props, "city")?.to_string(),
            event_count: prop_u64(props, "event_count")?,
            unique_users: prop_u64(props, "unique_users")?,
            avg_session_duration: prop_f64(props, "avg_session_duration")?,
            center_lat: prop_f64(props, "center_lat")?,
            center_lon: prop_f64(props, "center_lon")?,
            area_km2: prop_f64(props, "area_km2")?,
            event_density: prop_f64(props, "event_density")?,
        });
    }
    Ok(hexes)
}

fn prop_str<'a>(props: &'a JsonObject, key: &str) -> anyhow::Result<&'a str> {
    props
        .get(key)
        .and_then(serde_json::Value::as_str)
        .with_context(|| format!("missing string property {key}"))
}

fn prop_f64(props: &JsonObject, key: &str) -> anyhow::Result<f64> {
    props
        .get(key)
        .and_then(serde_json::Value::as_f64)
        .with_context(|| format!("missing numeric property {key}"))
}

fn prop_u64(props: &JsonObject, key: &str) -> anyhow::Result<u64> {
    props
        .get(key)
        .and_then(serde_json::Value::as_u64)
        .with_context(|| format!("missing integer property {key}"))
}

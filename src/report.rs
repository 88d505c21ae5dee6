use std::fmt::Write;

use crate::models::{DataSummary, GroupRetention, SpatialSummary};
use crate::queries::{CityDuration, CityEventCount, EventTypeShare};

/// Assemble the markdown analytics report from the query catalogue outputs.
pub fn build_report(
    summary: &DataSummary,
    by_city: &[CityEventCount],
    retention: &[GroupRetention<String>],
    event_types: &[EventTypeShare],
    durations: &[CityDuration],
    spatial: Option<&SpatialSummary>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Location Event Analytics Report");
    let _ = writeln!(
        output,
        "{} events from {} users across {} cities",
        summary.total_events,
        summary.unique_users,
        summary.cities.len()
    );
    if let Some(range) = &summary.date_range {
        let _ = writeln!(
            output,
            "Date range: {} to {}",
            range.start.date(),
            range.end.date()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Events by City");
    if by_city.is_empty() {
        let _ = writeln!(output, "No events recorded.");
    } else {
        for row in by_city.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {} events ({:.1}%)",
                row.city, row.total_events, row.percentage
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Retention by City");
    if retention.is_empty() {
        let _ = writeln!(output, "No cohorts in this dataset.");
    } else {
        let _ = writeln!(output, "| City | Users | D1 | D7 | D30 |");
        let _ = writeln!(output, "|---|---|---|---|---|");
        for group in retention {
            let _ = writeln!(
                output,
                "| {} | {} | {:.1}% | {:.1}% | {:.1}% |",
                group.key,
                group.total_users,
                group.d1_pct(),
                group.d7_pct(),
                group.d30_pct()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Event Type Mix");
    if event_types.is_empty() {
        let _ = writeln!(output, "No events recorded.");
    } else {
        for row in event_types {
            let _ = writeln!(
                output,
                "- {}: {} events ({:.1}%)",
                row.event_type, row.total_events, row.percentage
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Session Duration by City");
    if durations.is_empty() {
        let _ = writeln!(output, "No events recorded.");
    } else {
        for row in durations.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {:.1}s average ({:.1} min)",
                row.city, row.avg_seconds, row.avg_minutes
            );
        }
    }

    if let Some(spatial) = spatial {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Spatial Highlights");
        let _ = writeln!(
            output,
            "- {} hexagons analyzed, {} hotspots",
            spatial.total_hexagons, spatial.total_hotspots
        );
        let _ = writeln!(
            output,
            "- Event density: {:.1} events/km2 average, {:.1} peak",
            spatial.avg_event_density, spatial.max_event_density
        );
        let _ = writeln!(
            output,
            "- Cities analyzed: {}",
            spatial.cities_analyzed.join(", ")
        );
    }

    output
}

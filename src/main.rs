use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use h3o::Resolution;

mod config;
mod db;
mod export;
mod generator;
mod models;
mod queries;
mod report;
mod retention;
mod spatial;

use config::GeneratorConfig;

#[derive(Parser)]
#[command(name = "geopulse")]
#[command(about = "Batch analytics over synthetic location-based user events", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the synthetic event table
    Generate {
        /// JSON config overriding the built-in generator defaults
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        events: Option<usize>,
        #[arg(long)]
        users: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "location_events.csv")]
        out: PathBuf,
        #[arg(long, default_value = "data_summary.json")]
        summary: PathBuf,
    },
    /// Run the analytical query catalogue over the event table
    Queries {
        #[arg(long, default_value = "location_events.csv")]
        csv: PathBuf,
        /// Database file; in-memory when omitted
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Hexagonal spatial analysis and GeoJSON export
    Spatial {
        #[arg(long, default_value = "location_events.csv")]
        csv: PathBuf,
        #[arg(long, default_value_t = 8)]
        resolution: u8,
        #[arg(long, default_value_t = 90.0)]
        percentile: f64,
        #[arg(long, default_value_t = 2.5)]
        urban_radius_km: f64,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Write a markdown analytics report
    Report {
        #[arg(long, default_value = "location_events.csv")]
        csv: PathBuf,
        #[arg(long, default_value = "spatial_summary.json")]
        spatial_summary: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            config,
            events,
            users,
            seed,
            out,
            summary,
        } => {
            let mut generator_config = match config {
                Some(path) => GeneratorConfig::from_file(&path)?,
                None => GeneratorConfig::default(),
            };
            if let Some(n) = events {
                generator_config.num_events = n;
            }
            if let Some(n) = users {
                generator_config.num_users = n;
            }
            if let Some(s) = seed {
                generator_config.seed = s;
            }

            let events = generator::generate_events(&generator_config)?;
            export::write_events_csv(&out, &events)?;
            let summary_data = models::DataSummary::from_events(&events);
            export::write_data_summary(&summary, &summary_data)?;

            println!(
                "Generated {} events for {} users across {} cities (seed {}).",
                summary_data.total_events,
                summary_data.unique_users,
                summary_data.cities.len(),
                generator_config.seed
            );
            println!("Event table written to {}.", out.display());
            println!("Summary written to {}.", summary.display());
        }
        Commands::Queries { csv, db, top } => {
            let conn = db::open(db.as_deref())?;
            let count = db::load_events(&conn, &csv)?;
            println!("Loaded {count} events from {}.", csv.display());

            println!("\nTotal events by city:");
            for row in queries::events_by_city(&conn)? {
                println!(
                    "  {:<15} {:>8} ({:>5.1}%)",
                    row.city, row.total_events, row.percentage
                );
            }

            println!("\nUnique users by city:");
            for row in queries::unique_users_by_city(&conn)? {
                println!(
                    "  {:<15} {:>8} ({:>5.1}%)",
                    row.city, row.unique_users, row.percentage
                );
            }

            println!("\nSession duration by city:");
            for row in queries::session_duration_by_city(&conn)? {
                let stddev = row
                    .stddev_seconds
                    .map(|s| format!("{s:.1}"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:<15} {:>7.1}s avg ({:>4.1} min), stddev {}",
                    row.city, row.avg_seconds, row.avg_minutes, stddev
                );
            }

            println!("\nEvents per user by city:");
            for row in queries::events_per_user_by_city(&conn)? {
                println!(
                    "  {:<15} {:>8} events / {:>6} users = {:>5.2}",
                    row.city, row.total_events, row.unique_users, row.events_per_user
                );
            }

            println!("\nRetention by city:");
            let events = export::read_events_csv(&csv)?;
            for group in retention::retention_by_city(&events) {
                println!(
                    "  {:<15} {:>5} users  D1 {:>5.1}%  D7 {:>5.1}%  D30 {:>5.1}%",
                    group.key,
                    group.total_users,
                    group.d1_pct(),
                    group.d7_pct(),
                    group.d30_pct()
                );
            }

            println!("\nPeak usage hour by city:");
            for row in queries::peak_hours_by_city(&conn)? {
                println!(
                    "  {:<15} {:>2}:00 ({} events)",
                    row.city, row.hour, row.event_count
                );
            }

            println!("\nEvent type distribution:");
            for row in queries::event_type_distribution(&conn)? {
                println!(
                    "  {:<15} {:>8} ({:>5.1}%)",
                    row.event_type, row.total_events, row.percentage
                );
            }

            println!("\nTop {top} most active locations:");
            for row in queries::top_locations(&conn, top)? {
                println!(
                    "  ({:>8.3}, {:>9.3}) {:<15} {:>6} events, {:>5} users",
                    row.lat, row.lon, row.city, row.event_count, row.unique_users
                );
            }

            println!("\nSession duration distribution:");
            for row in queries::duration_buckets(&conn)? {
                println!(
                    "  {:<8} {:>8} ({:>5.1}%)",
                    row.bucket, row.event_count, row.percentage
                );
            }

            println!("\nDay of week patterns:");
            for row in queries::day_of_week_patterns(&conn)? {
                println!(
                    "  {:<10} {:>8} events, {:>6} users, {:>6.1}s avg session",
                    row.day_of_week, row.event_count, row.unique_users, row.avg_session_duration
                );
            }

            println!("\nUser segments by city:");
            for row in queries::engagement_segments(&conn)? {
                println!(
                    "  {:<15} {:<7} {:>6} users, {:>7} events, {:>6.1}s avg session",
                    row.city,
                    row.user_engagement,
                    row.user_count,
                    row.total_events,
                    row.avg_session_duration
                );
            }
        }
        Commands::Spatial {
            csv,
            resolution,
            percentile,
            urban_radius_km,
            out_dir,
        } => {
            let events = export::read_events_csv(&csv)?;
            let resolution =
                Resolution::try_from(resolution).context("invalid H3 resolution")?;

            let cells = spatial::assign_cells(&events, resolution)?;
            let hexes = spatial::aggregate_cells(&events, &cells);
            println!(
                "Created {} hexagonal bins from {} events at resolution {}.",
                hexes.len(),
                events.len(),
                u8::from(resolution)
            );

            let (threshold, spots) = spatial::hotspots(&hexes, percentile);
            println!(
                "\nFound {} hotspots (density >= {:.1} events/km2, p{percentile:.0}):",
                spots.len(),
                threshold
            );
            for spot in spots.iter().take(5) {
                println!(
                    "  {:<15} {:>8.1} events/km2 ({} events)",
                    spot.city, spot.event_density, spot.event_count
                );
            }

            println!("\nEngagement density by city:");
            for row in spatial::city_density(&hexes) {
                println!(
                    "  {:<15} avg {:>7.1} events/km2, max {:>7.1}, {} hexes",
                    row.city, row.avg_density, row.max_density, row.hex_count
                );
            }

            println!("\nUrban vs suburban (within {urban_radius_km} km of center):");
            let comparison = spatial::urban_suburban(
                &events,
                &config::default_urban_centers(),
                urban_radius_km,
            );
            if comparison.is_empty() {
                println!("  No cities with configured centers in this dataset.");
            }
            for row in &comparison {
                println!(
                    "  {:<15} {:<9} {:>7} events, {:>6} users, {:>6.1}s avg session",
                    row.city,
                    row.area_type.as_str(),
                    row.event_count,
                    row.unique_users,
                    row.avg_session_duration
                );
            }

            let (cell_retention, city_means) =
                spatial::retention_by_region(&events, &cells, &hexes);
            println!(
                "\nAverage retention by region ({} cells):",
                cell_retention.len()
            );
            for mean in &city_means {
                println!(
                    "  {:<15} D1 {:>5.1}%  D7 {:>5.1}%  D30 {:>5.1}%",
                    mean.city, mean.d1_pct, mean.d7_pct, mean.d30_pct
                );
            }

            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            let hex_path = out_dir.join("hex_analysis.geojson");
            let hotspot_path = out_dir.join("hotspots.geojson");
            let summary_path = out_dir.join("spatial_summary.json");

            export::write_hex_geojson(&hex_path, &hexes)?;
            export::write_hex_geojson(&hotspot_path, &spots)?;
            let summary = spatial::summarize(&hexes, spots.len());
            export::write_spatial_summary(&summary_path, &summary)?;

            println!("\nHexagon layer written to {}.", hex_path.display());
            println!("Hotspot layer written to {}.", hotspot_path.display());
            println!("Spatial summary written to {}.", summary_path.display());
        }
        Commands::Report {
            csv,
            spatial_summary,
            out,
        } => {
            let events = export::read_events_csv(&csv)?;
            let conn = db::open(None)?;
            db::load_events(&conn, &csv)?;

            let summary_data = models::DataSummary::from_events(&events);
            let by_city = queries::events_by_city(&conn)?;
            let event_types = queries::event_type_distribution(&conn)?;
            let durations = queries::session_duration_by_city(&conn)?;
            let city_retention = retention::retention_by_city(&events);
            let spatial_data = if spatial_summary.exists() {
                Some(export::read_spatial_summary(&spatial_summary)?)
            } else {
                None
            };

            let markdown = report::build_report(
                &summary_data,
                &by_city,
                &city_retention,
                &event_types,
                &durations,
                spatial_data.as_ref(),
            );
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

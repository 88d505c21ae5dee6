//! The fixed catalogue of analytical queries over the `events` table.
//!
//! Every function is a pure read; an empty table yields an empty result,
//! never an error. Aggregation happens inside DuckDB in a single pass.

use anyhow::Context;
use duckdb::Connection;

#[derive(Debug, Clone)]
pub struct CityEventCount {
    pub city: String,
    pub total_events: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone)]
pub struct CityUserCount {
    pub city: String,
    pub unique_users: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone)]
pub struct CityDuration {
    pub city: String,
    pub avg_seconds: f64,
    pub avg_minutes: f64,
    /// NULL when a city has a single event.
    pub stddev_seconds: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CityEventsPerUser {
    pub city: String,
    pub total_events: i64,
    pub unique_users: i64,
    pub events_per_user: f64,
}

#[derive(Debug, Clone)]
pub struct PeakHour {
    pub city: String,
    pub hour: i64,
    pub event_count: i64,
}

#[derive(Debug, Clone)]
pub struct HourlyBucket {
    pub hour: i64,
    pub event_count: i64,
    pub unique_users: i64,
}

#[derive(Debug, Clone)]
pub struct EventTypeShare {
    pub event_type: String,
    pub total_events: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone)]
pub struct CityEventTypeShare {
    pub city: String,
    pub event_type: String,
    pub event_count: i64,
    pub pct_in_city: f64,
}

#[derive(Debug, Clone)]
pub struct TopLocation {
    pub lat: f64,
    pub lon: f64,
    pub city: String,
    pub event_count: i64,
    pub unique_users: i64,
}

#[derive(Debug, Clone)]
pub struct DurationBucket {
    pub bucket: String,
    pub event_count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone)]
pub struct DayOfWeekPattern {
    pub day_of_week: String,
    pub day_num: i64,
    pub event_count: i64,
    pub unique_users: i64,
    pub avg_session_duration: f64,
}

#[derive(Debug, Clone)]
pub struct EngagementSegment {
    pub city: String,
    pub user_engagement: String,
    pub user_count: i64,
    pub total_events: i64,
    pub avg_session_duration: f64,
}

#[derive(Debug, Clone)]
pub struct DailyTrend {
    pub date: String,
    pub city: String,
    pub daily_events: i64,
    pub daily_active_users: i64,
}

pub fn events_by_city(conn: &Connection) -> anyhow::Result<Vec<CityEventCount>> {
    let mut stmt = conn.prepare(
        "SELECT city,
                COUNT(*) AS total_events,
                ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (), 2) AS percentage
         FROM events
         GROUP BY city
         ORDER BY total_events DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CityEventCount {
                city: row.get(0)?,
                total_events: row.get(1)?,
                percentage: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("events_by_city")?;
    Ok(rows)
}

pub fn unique_users_by_city(conn: &Connection) -> anyhow::Result<Vec<CityUserCount>> {
    let mut stmt = conn.prepare(
        "SELECT city,
                COUNT(DISTINCT user_id) AS unique_users,
                ROUND(COUNT(DISTINCT user_id) * 100.0 /
                      (SELECT COUNT(DISTINCT user_id) FROM events), 2) AS percentage
         FROM events
         GROUP BY city
         ORDER BY unique_users DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CityUserCount {
                city: row.get(0)?,
                unique_users: row.get(1)?,
                percentage: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("unique_users_by_city")?;
    Ok(rows)
}

pub fn session_duration_by_city(conn: &Connection) -> anyhow::Result<Vec<CityDuration>> {
    let mut stmt = conn.prepare(
        "SELECT city,
                ROUND(AVG(session_duration), 2) AS avg_seconds,
                ROUND(AVG(session_duration) / 60.0, 2) AS avg_minutes,
                ROUND(STDDEV(session_duration), 2) AS stddev_seconds
         FROM events
         GROUP BY city
         ORDER BY avg_seconds DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CityDuration {
                city: row.get(0)?,
                avg_seconds: row.get(1)?,
                avg_minutes: row.get(2)?,
                stddev_seconds: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("session_duration_by_city")?;
    Ok(rows)
}

pub fn events_per_user_by_city(conn: &Connection) -> anyhow::Result<Vec<CityEventsPerUser>> {
    let mut stmt = conn.prepare(
        "SELECT city,
                COUNT(*) AS total_events,
                COUNT(DISTINCT user_id) AS unique_users,
                ROUND(COUNT(*) * 1.0 / COUNT(DISTINCT user_id), 2) AS events_per_user
         FROM events
         GROUP BY city
         ORDER BY events_per_user DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CityEventsPerUser {
                city: row.get(0)?,
                total_events: row.get(1)?,
                unique_users: row.get(2)?,
                events_per_user: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("events_per_user_by_city")?;
    Ok(rows)
}

/// The busiest hour of day for each city.
pub fn peak_hours_by_city(conn: &Connection) -> anyhow::Result<Vec<PeakHour>> {
    let mut stmt = conn.prepare(
        "SELECT city, hour, event_count FROM (
             SELECT city,
                    EXTRACT(HOUR FROM timestamp) AS hour,
                    COUNT(*) AS event_count,
                    ROW_NUMBER() OVER (
                        PARTITION BY city ORDER BY COUNT(*) DESC, hour
                    ) AS rn
             FROM events
             GROUP BY city, hour
         )
         WHERE rn = 1
         ORDER BY city",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PeakHour {
                city: row.get(0)?,
                hour: row.get(1)?,
                event_count: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("peak_hours_by_city")?;
    Ok(rows)
}

pub fn hourly_distribution(conn: &Connection) -> anyhow::Result<Vec<HourlyBucket>> {
    let mut stmt = conn.prepare(
        "SELECT EXTRACT(HOUR FROM timestamp) AS hour,
                COUNT(*) AS event_count,
                COUNT(DISTINCT user_id) AS unique_users
         FROM events
         GROUP BY hour
         ORDER BY hour",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(HourlyBucket {
                hour: row.get(0)?,
                event_count: row.get(1)?,
                unique_users: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("hourly_distribution")?;
    Ok(rows)
}

pub fn event_type_distribution(conn: &Connection) -> anyhow::Result<Vec<EventTypeShare>> {
    let mut stmt = conn.prepare(
        "SELECT event_type,
                COUNT(*) AS total_events,
                ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (), 2) AS percentage
         FROM events
         GROUP BY event_type
         ORDER BY total_events DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(EventTypeShare {
                event_type: row.get(0)?,
                total_events: row.get(1)?,
                percentage: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("event_type_distribution")?;
    Ok(rows)
}

pub fn event_types_by_city(conn: &Connection) -> anyhow::Result<Vec<CityEventTypeShare>> {
    let mut stmt = conn.prepare(
        "SELECT city,
                event_type,
                COUNT(*) AS event_count,
                ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (PARTITION BY city), 2)
                    AS pct_in_city
         FROM events
         GROUP BY city, event_type
         ORDER BY city, event_count DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CityEventTypeShare {
                city: row.get(0)?,
                event_type: row.get(1)?,
                event_count: row.get(2)?,
                pct_in_city: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("event_types_by_city")?;
    Ok(rows)
}

/// Most active coordinate buckets (3-decimal lat/lon, ~110 m).
pub fn top_locations(conn: &Connection, limit: usize) -> anyhow::Result<Vec<TopLocation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT ROUND(latitude, 3) AS lat,
                ROUND(longitude, 3) AS lon,
                city,
                COUNT(*) AS event_count,
                COUNT(DISTINCT user_id) AS unique_users
         FROM events
         GROUP BY lat, lon, city
         ORDER BY event_count DESC
         LIMIT {limit}"
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TopLocation {
                lat: row.get(0)?,
                lon: row.get(1)?,
                city: row.get(2)?,
                event_count: row.get(3)?,
                unique_users: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("top_locations")?;
    Ok(rows)
}

pub fn duration_buckets(conn: &Connection) -> anyhow::Result<Vec<DurationBucket>> {
    let mut stmt = conn.prepare(
        "SELECT CASE
                    WHEN session_duration < 60 THEN '0-1 min'
                    WHEN session_duration < 180 THEN '1-3 min'
                    WHEN session_duration < 300 THEN '3-5 min'
                    WHEN session_duration < 600 THEN '5-10 min'
                    ELSE '10+ min'
                END AS duration_bucket,
                COUNT(*) AS event_count,
                ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (), 2) AS percentage
         FROM events
         GROUP BY duration_bucket
         ORDER BY CASE duration_bucket
                      WHEN '0-1 min' THEN 1
                      WHEN '1-3 min' THEN 2
                      WHEN '3-5 min' THEN 3
                      WHEN '5-10 min' THEN 4
                      ELSE 5
                  END",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(DurationBucket {
                bucket: row.get(0)?,
                event_count: row.get(1)?,
                percentage: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("duration_buckets")?;
    Ok(rows)
}

pub fn day_of_week_patterns(conn: &Connection) -> anyhow::Result<Vec<DayOfWeekPattern>> {
    let mut stmt = conn.prepare(
        "SELECT DAYNAME(timestamp) AS day_of_week,
                DAYOFWEEK(timestamp) AS day_num,
                COUNT(*) AS event_count,
                COUNT(DISTINCT user_id) AS unique_users,
                ROUND(AVG(session_duration), 2) AS avg_session_duration
         FROM events
         GROUP BY day_of_week, day_num
         ORDER BY day_num",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(DayOfWeekPattern {
                day_of_week: row.get(0)?,
                day_num: row.get(1)?,
                event_count: row.get(2)?,
                unique_users: row.get(3)?,
                avg_session_duration: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("day_of_week_patterns")?;
    Ok(rows)
}

pub fn engagement_segments(conn: &Connection) -> anyhow::Result<Vec<EngagementSegment>> {
    let mut stmt = conn.prepare(
        "SELECT city,
                user_engagement,
                COUNT(DISTINCT user_id) AS user_count,
                COUNT(*) AS total_events,
                ROUND(AVG(session_duration), 2) AS avg_session_duration
         FROM events
         GROUP BY city, user_engagement
         ORDER BY city, user_count DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(EngagementSegment {
                city: row.get(0)?,
                user_engagement: row.get(1)?,
                user_count: row.get(2)?,
                total_events: row.get(3)?,
                avg_session_duration: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("engagement_segments")?;
    Ok(rows)
}

pub fn daily_trends(conn: &Connection) -> anyhow::Result<Vec<DailyTrend>> {
    let mut stmt = conn.prepare(
        "SELECT strftime(DATE_TRUNC('day', timestamp), '%Y-%m-%d') AS date,
                city,
                COUNT(*) AS daily_events,
                COUNT(DISTINCT user_id) AS daily_active_users
         FROM events
         GROUP BY date, city
         ORDER BY date, city",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(DailyTrend {
                date: row.get(0)?,
                city: row.get(1)?,
                daily_events: row.get(2)?,
                daily_active_users: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("daily_trends")?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute_batch(
            "CREATE TABLE events (
                 event_id VARCHAR,
                 user_id VARCHAR,
                 timestamp TIMESTAMP,
                 latitude DOUBLE,
                 longitude DOUBLE,
                 event_type VARCHAR,
                 session_duration BIGINT,
                 city VARCHAR,
                 user_engagement VARCHAR
             );",
        )
        .expect("schema");
        conn
    }

    #[allow(clippy::too_many_arguments)]
    fn insert(
        conn: &Connection,
        event_id: &str,
        user_id: &str,
        timestamp: &str,
        lat: f64,
        lon: f64,
        event_type: &str,
        duration: i64,
        city: &str,
    ) {
        conn.execute(
            "INSERT INTO events VALUES
             (?, ?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, 'medium')",
            duckdb::params![event_id, user_id, timestamp, lat, lon, event_type, duration, city],
        )
        .expect("insert");
    }

    #[test]
    fn city_counts_and_shares() {
        let conn = setup();
        insert(&conn, "e1", "u1", "2024-01-01 10:00:00", 42.36, -71.06, "search", 45, "Boston");
        insert(&conn, "e2", "u1", "2024-01-02 11:00:00", 42.36, -71.06, "search", 50, "Boston");
        insert(&conn, "e3", "u2", "2024-01-01 10:30:00", 25.76, -80.19, "navigation", 300, "Miami");
        insert(&conn, "e4", "u3", "2024-01-03 20:00:00", 42.37, -71.05, "place_view", 80, "Boston");

        let by_city = events_by_city(&conn).expect("query");
        assert_eq!(by_city.len(), 2);
        assert_eq!(by_city[0].city, "Boston");
        assert_eq!(by_city[0].total_events, 3);
        assert!((by_city[0].percentage - 75.0).abs() < 1e-9);

        let users = unique_users_by_city(&conn).expect("query");
        assert_eq!(users[0].city, "Boston");
        assert_eq!(users[0].unique_users, 2);

        let per_user = events_per_user_by_city(&conn).expect("query");
        let boston = per_user.iter().find(|r| r.city == "Boston").expect("row");
        assert!((boston.events_per_user - 1.5).abs() < 1e-9);
    }

    #[test]
    fn empty_table_returns_empty_results() {
        let conn = setup();
        assert!(events_by_city(&conn).expect("query").is_empty());
        assert!(unique_users_by_city(&conn).expect("query").is_empty());
        assert!(session_duration_by_city(&conn).expect("query").is_empty());
        assert!(peak_hours_by_city(&conn).expect("query").is_empty());
        assert!(hourly_distribution(&conn).expect("query").is_empty());
        assert!(event_type_distribution(&conn).expect("query").is_empty());
        assert!(top_locations(&conn, 10).expect("query").is_empty());
        assert!(duration_buckets(&conn).expect("query").is_empty());
        assert!(day_of_week_patterns(&conn).expect("query").is_empty());
        assert!(daily_trends(&conn).expect("query").is_empty());
    }

    #[test]
    fn stddev_is_null_for_single_event_city() {
        let conn = setup();
        insert(&conn, "e1", "u1", "2024-01-01 10:00:00", 42.36, -71.06, "search", 45, "Boston");
        let durations = session_duration_by_city(&conn).expect("query");
        assert_eq!(durations.len(), 1);
        assert!(durations[0].stddev_seconds.is_none());
        assert!((durations[0].avg_seconds - 45.0).abs() < 1e-9);
    }

    #[test]
    fn peak_hour_picks_the_busiest_hour() {
        let conn = setup();
        insert(&conn, "e1", "u1", "2024-01-01 09:00:00", 42.36, -71.06, "search", 45, "Boston");
        insert(&conn, "e2", "u2", "2024-01-01 18:10:00", 42.36, -71.06, "search", 45, "Boston");
        insert(&conn, "e3", "u3", "2024-01-02 18:45:00", 42.36, -71.06, "search", 45, "Boston");

        let peaks = peak_hours_by_city(&conn).expect("query");
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].hour, 18);
        assert_eq!(peaks[0].event_count, 2);
    }

    #[test]
    fn duration_buckets_order_and_label() {
        let conn = setup();
        insert(&conn, "e1", "u1", "2024-01-01 10:00:00", 42.36, -71.06, "search", 30, "Boston");
        insert(&conn, "e2", "u1", "2024-01-01 11:00:00", 42.36, -71.06, "navigation", 400, "Boston");
        insert(&conn, "e3", "u1", "2024-01-01 12:00:00", 42.36, -71.06, "navigation", 700, "Boston");

        let buckets = duration_buckets(&conn).expect("query");
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].bucket, "0-1 min");
        assert_eq!(buckets[1].bucket, "5-10 min");
        assert_eq!(buckets[2].bucket, "10+ min");
        let total_pct: f64 = buckets.iter().map(|b| b.percentage).sum();
        assert!((total_pct - 100.0).abs() < 0.1);
    }

    #[test]
    fn event_type_shares_within_city_sum_to_100() {
        let conn = setup();
        insert(&conn, "e1", "u1", "2024-01-01 10:00:00", 42.36, -71.06, "search", 45, "Boston");
        insert(&conn, "e2", "u1", "2024-01-01 11:00:00", 42.36, -71.06, "navigation", 200, "Boston");
        insert(&conn, "e3", "u2", "2024-01-01 12:00:00", 25.76, -80.19, "search", 45, "Miami");

        let by_city = event_types_by_city(&conn).expect("query");
        let boston_pct: f64 = by_city
            .iter()
            .filter(|r| r.city == "Boston")
            .map(|r| r.pct_in_city)
            .sum();
        assert!((boston_pct - 100.0).abs() < 0.1);
    }

    #[test]
    fn top_locations_honors_limit() {
        let conn = setup();
        for i in 0..5 {
            insert(
                &conn,
                &format!("e{i}"),
                "u1",
                "2024-01-01 10:00:00",
                42.0 + i as f64,
                -71.0,
                "search",
                45,
                "Boston",
            );
        }
        let top = top_locations(&conn, 3).expect("query");
        assert_eq!(top.len(), 3);
    }

    #[test]
    fn daily_trends_bucket_by_date() {
        let conn = setup();
        insert(&conn, "e1", "u1", "2024-01-01 10:00:00", 42.36, -71.06, "search", 45, "Boston");
        insert(&conn, "e2", "u2", "2024-01-01 23:00:00", 42.36, -71.06, "search", 45, "Boston");
        insert(&conn, "e3", "u1", "2024-01-02 01:00:00", 42.36, -71.06, "search", 45, "Boston");

        let trends = daily_trends(&conn).expect("query");
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].date, "2024-01-01");
        assert_eq!(trends[0].daily_events, 2);
        assert_eq!(trends[0].daily_active_users, 2);
    }
}

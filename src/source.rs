//! Where leaderboard snapshots come from.
//!
//! [`SnapshotSource`] is the async seam the fetch loop pulls from.
//! [`VehicleFeedSource`] reads the raw vehicle-location XML feed and
//! aggregates it locally; [`LeaderboardApiSource`] reads an already
//! aggregated JSON leaderboard.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::entity::RouteRecord;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::parser::{VehicleLocations, parse_vehicle_locations};
use crate::stats::{RouteFilter, aggregate_routes};

/// TTC vehicle locations on the umoiq public XML feed.
pub const DEFAULT_FEED_URL: &str =
    "https://webservices.umoiq.com/service/publicXMLFeed?command=vehicleLocations&a=ttc";

/// Produces one ranked snapshot per call.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RouteRecord>>;
}

#[async_trait]
impl<T: SnapshotSource + ?Sized> SnapshotSource for Box<T> {
    async fn fetch(&self) -> Result<Vec<RouteRecord>> {
        (**self).fetch().await
    }
}

/// Fetches the vehicle-location XML feed and averages speeds per route.
pub struct VehicleFeedSource<C> {
    client: C,
    url: String,
    filter: RouteFilter,
}

impl<C: HttpClient> VehicleFeedSource<C> {
    pub fn new(client: C, url: impl Into<String>, filter: RouteFilter) -> Self {
        Self {
            client,
            url: url.into(),
            filter,
        }
    }

    /// Fetches and parses the feed without aggregating.
    pub async fn fetch_vehicles(&self) -> Result<VehicleLocations> {
        let bytes = fetch_bytes(&self.client, &self.url).await?;
        let xml = std::str::from_utf8(&bytes).context("vehicle feed is not valid UTF-8")?;
        parse_vehicle_locations(xml)
    }
}

#[async_trait]
impl<C: HttpClient> SnapshotSource for VehicleFeedSource<C> {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<RouteRecord>> {
        let locations = self.fetch_vehicles().await?;
        let records = aggregate_routes(&locations.vehicles, &self.filter, Utc::now());
        debug!(
            vehicles = locations.vehicles.len(),
            routes = records.len(),
            "Vehicle feed aggregated"
        );
        Ok(records)
    }
}

/// Fetches an aggregated leaderboard served as JSON.
pub struct LeaderboardApiSource<C> {
    client: C,
    url: String,
}

impl<C: HttpClient> LeaderboardApiSource<C> {
    pub fn new(client: C, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> SnapshotSource for LeaderboardApiSource<C> {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<RouteRecord>> {
        let bytes = fetch_bytes(&self.client, &self.url).await?;
        parse_leaderboard_json(&bytes)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardPayload {
    routes: Option<Vec<serde_json::Value>>,
    average_speeds: Option<Vec<serde_json::Value>>,
}

/// Decodes `{ "routes": [...] }`, falling back to the older
/// `{ "averageSpeeds": [["504", 12.3], ...] }` shape. A payload with
/// neither yields no records.
///
/// Route entries that do not decode are skipped individually.
pub fn parse_leaderboard_json(bytes: &[u8]) -> Result<Vec<RouteRecord>> {
    let payload: LeaderboardPayload =
        serde_json::from_slice(bytes).context("leaderboard payload is not valid JSON")?;

    if let Some(routes) = payload.routes {
        let records = routes
            .into_iter()
            .enumerate()
            .filter_map(|(i, value)| match serde_json::from_value::<RouteRecord>(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(index = i, error = %e, "Skipping undecodable route entry");
                    None
                }
            })
            .collect();
        return Ok(records);
    }

    let records = payload
        .average_speeds
        .unwrap_or_default()
        .into_iter()
        .map(|pair| RouteRecord {
            route_number: pair.get(0).and_then(|v| v.as_str()).map(str::to_string),
            avg_speed: pair.get(1).and_then(|v| v.as_f64()),
            ..Default::default()
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_routes_payload() {
        let json = br#"{
            "routes": [
                {
                    "routeNumber": "504",
                    "avgSpeed": 14.2,
                    "totalTrams": 20,
                    "lastUpdated": "2024-05-01T12:00:00.000Z"
                },
                { "routeNumber": "501", "avgSpeed": 9.1, "minReportAgeSec": null }
            ]
        }"#;
        let records = parse_leaderboard_json(json).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].route_number.as_deref(), Some("504"));
        assert_eq!(records[0].attributes.total_trams, Some(20));
        assert_eq!(records[1].avg_speed, Some(9.1));
    }

    #[test]
    fn test_parse_legacy_average_speeds() {
        let json = br#"{ "averageSpeeds": [["504", 12.3], ["510", 8], ["bad"]] }"#;
        let records = parse_leaderboard_json(json).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0], RouteRecord::new("504", 12.3));
        assert_eq!(records[1], RouteRecord::new("510", 8.0));
        assert_eq!(records[2].route_number.as_deref(), Some("bad"));
        assert_eq!(records[2].avg_speed, None);
    }

    #[test]
    fn test_routes_preferred_over_legacy() {
        let json = br#"{ "routes": [], "averageSpeeds": [["504", 12.3]] }"#;
        assert!(parse_leaderboard_json(json).unwrap().is_empty());
    }

    #[test]
    fn test_undecodable_entry_skipped() {
        let json = br#"{ "routes": [
            { "routeNumber": "504", "avgSpeed": "fast" },
            { "routeNumber": "505", "avgSpeed": 11.0 }
        ] }"#;
        let records = parse_leaderboard_json(json).unwrap();
        assert_eq!(records, vec![RouteRecord::new("505", 11.0)]);
    }

    #[test]
    fn test_empty_object_and_invalid_json() {
        assert!(parse_leaderboard_json(b"{}").unwrap().is_empty());
        assert!(parse_leaderboard_json(b"<html>").is_err());
    }
}

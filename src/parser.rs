//! XML parser for the NextBus-style `vehicleLocations` feed.
//!
//! Attributes are read as raw strings and converted leniently: a value that
//! does not parse only blanks that field on that vehicle.

use anyhow::{Result, bail};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(rename = "vehicle", default)]
    vehicles: Vec<RawVehicle>,
    #[serde(rename = "lastTime")]
    last_time: Option<RawLastTime>,
    #[serde(rename = "Error")]
    error: Option<RawError>,
}

#[derive(Debug, Default, Deserialize)]
struct RawVehicle {
    #[serde(rename = "@id")]
    id: Option<String>,
    #[serde(rename = "@routeTag")]
    route_tag: Option<String>,
    #[serde(rename = "@dirTag")]
    dir_tag: Option<String>,
    #[serde(rename = "@lat")]
    lat: Option<String>,
    #[serde(rename = "@lon")]
    lon: Option<String>,
    #[serde(rename = "@secsSinceReport")]
    secs_since_report: Option<String>,
    #[serde(rename = "@predictable")]
    predictable: Option<String>,
    #[serde(rename = "@heading")]
    heading: Option<String>,
    #[serde(rename = "@speedKmHr")]
    speed_km_hr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLastTime {
    #[serde(rename = "@time")]
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawError {
    #[serde(rename = "@shouldRetry")]
    should_retry: Option<String>,
    #[serde(rename = "$text", default)]
    message: String,
}

/// A single vehicle report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vehicle {
    pub id: Option<String>,
    pub route_tag: Option<String>,
    pub dir_tag: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub secs_since_report: Option<u32>,
    pub predictable: Option<bool>,
    pub heading: Option<f64>,
    pub speed_km_hr: Option<f64>,
    /// Attributes as they appeared in the feed, before any conversion.
    pub raw: Vec<(&'static str, String)>,
}

impl Vehicle {
    /// Names of the feed attributes this vehicle carried, including ones
    /// whose values did not parse.
    pub fn attribute_names(&self) -> Vec<&'static str> {
        self.raw.iter().map(|(name, _)| *name).collect()
    }
}

impl From<RawVehicle> for Vehicle {
    fn from(raw: RawVehicle) -> Self {
        let present = [
            ("id", &raw.id),
            ("routeTag", &raw.route_tag),
            ("dirTag", &raw.dir_tag),
            ("lat", &raw.lat),
            ("lon", &raw.lon),
            ("secsSinceReport", &raw.secs_since_report),
            ("predictable", &raw.predictable),
            ("heading", &raw.heading),
            ("speedKmHr", &raw.speed_km_hr),
        ];
        let attributes = present
            .into_iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| (name, v.clone())))
            .collect();

        Vehicle {
            id: non_empty(raw.id),
            route_tag: non_empty(raw.route_tag),
            dir_tag: non_empty(raw.dir_tag),
            lat: raw.lat.as_deref().and_then(parse_number),
            lon: raw.lon.as_deref().and_then(parse_number),
            secs_since_report: raw
                .secs_since_report
                .as_deref()
                .and_then(parse_number)
                .filter(|v| *v >= 0.0)
                .map(|v| v as u32),
            predictable: raw.predictable.as_deref().and_then(|p| p.parse().ok()),
            heading: raw.heading.as_deref().and_then(parse_number),
            speed_km_hr: raw.speed_km_hr.as_deref().and_then(parse_number),
            raw: attributes,
        }
    }
}

/// Parsed `vehicleLocations` payload.
#[derive(Debug, Clone, Default)]
pub struct VehicleLocations {
    pub vehicles: Vec<Vehicle>,
    /// Feed's `lastTime` marker in epoch milliseconds.
    pub last_time: Option<i64>,
}

/// Parses a `vehicleLocations` XML document.
///
/// # Errors
///
/// Returns an error if the document is not well-formed or if the feed
/// answered with an `<Error>` element instead of vehicles.
pub fn parse_vehicle_locations(xml: &str) -> Result<VehicleLocations> {
    let body: Body = quick_xml::de::from_str(xml)?;

    if let Some(err) = body.error {
        let retry = err.should_retry.as_deref() == Some("true");
        bail!(
            "feed returned an error (should_retry={}): {}",
            retry,
            err.message.trim()
        );
    }

    Ok(VehicleLocations {
        vehicles: body.vehicles.into_iter().map(Vehicle::from).collect(),
        last_time: body
            .last_time
            .and_then(|t| t.time)
            .and_then(|t| t.trim().parse().ok()),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

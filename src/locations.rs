//! Per-vehicle position listing.
//!
//! Unlike [`crate::stats`], nothing here is filtered by route or averaged:
//! every vehicle that reported a position is listed as-is.

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use crate::parser::Vehicle;

const UNKNOWN: &str = "unknown";

/// A vehicle with known coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleLocation {
    /// Stable key for the row: the vehicle id, or `route-lat-lon` when the
    /// feed gave no usable id.
    pub render_key: String,
    pub id: String,
    pub route_tag: String,
    pub lat: f64,
    pub lon: f64,
    pub speed: Option<f64>,
    pub secs_since_report: Option<u32>,
}

impl VehicleLocation {
    /// `None` when the vehicle has no latitude or longitude.
    pub fn from_vehicle(vehicle: &Vehicle) -> Option<Self> {
        let (lat, lon) = (vehicle.lat?, vehicle.lon?);
        let id = vehicle.id.as_deref().unwrap_or(UNKNOWN);
        let route_tag = vehicle.route_tag.as_deref().unwrap_or(UNKNOWN);

        let render_key = if id == UNKNOWN {
            format!("{route_tag}-{lat}-{lon}")
        } else {
            id.to_string()
        };

        Some(Self {
            render_key,
            id: id.to_string(),
            route_tag: route_tag.to_string(),
            lat,
            lon,
            speed: vehicle.speed_km_hr,
            secs_since_report: vehicle.secs_since_report,
        })
    }
}

/// Vehicles with coordinates, in feed order.
pub fn locate_vehicles(vehicles: &[Vehicle]) -> Vec<VehicleLocation> {
    vehicles.iter().filter_map(VehicleLocation::from_vehicle).collect()
}

/// The first vehicle's attributes exactly as the feed sent them.
pub fn sample_vehicle(vehicles: &[Vehicle]) -> Option<BTreeMap<&'static str, &str>> {
    let first = vehicles.first()?;
    Some(
        first
            .raw
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect(),
    )
}

/// One table line: id, route, lat, lon, speed and report age.
pub fn format_location_row(location: &VehicleLocation) -> String {
    let speed = location
        .speed
        .map_or_else(|| "n/a".to_string(), |s| s.to_string());
    let age = location
        .secs_since_report
        .map_or_else(|| "n/a".to_string(), |a| a.to_string());

    format!(
        "{:<8} {:<7} {:>10.5} {:>10.5} {:>6} {:>6}",
        location.id, location.route_tag, location.lat, location.lon, speed, age
    )
}

/// Writes a header and one row per location.
pub fn write_locations<W: Write>(
    out: &mut W,
    locations: &[VehicleLocation],
) -> std::io::Result<()> {
    writeln!(
        out,
        "{:<8} {:<7} {:>10} {:>10} {:>6} {:>6}",
        "vehicle", "route", "lat", "lon", "speed", "age"
    )?;
    for location in locations {
        writeln!(out, "{}", format_location_row(location))?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(
        id: Option<&str>,
        route: Option<&str>,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Vehicle {
        Vehicle {
            id: id.map(str::to_string),
            route_tag: route.map(str::to_string),
            lat,
            lon,
            ..Default::default()
        }
    }

    #[test]
    fn test_vehicles_without_coordinates_are_skipped() {
        let vehicles = vec![
            vehicle(Some("1"), Some("504"), Some(43.6), None),
            vehicle(Some("2"), Some("504"), None, Some(-79.4)),
            vehicle(Some("3"), Some("504"), Some(43.6), Some(-79.4)),
        ];
        let located = locate_vehicles(&vehicles);

        assert_eq!(located.len(), 1);
        assert_eq!(located[0].render_key, "3");
    }

    #[test]
    fn test_missing_id_falls_back_to_route_and_position() {
        let located = locate_vehicles(&[
            vehicle(None, Some("505"), Some(43.65), Some(-79.4)),
            vehicle(None, None, Some(43.7), Some(-79.5)),
            vehicle(Some("unknown"), Some("501"), Some(43.6), Some(-79.3)),
        ]);

        assert_eq!(located[0].id, "unknown");
        assert_eq!(located[0].render_key, "505-43.65--79.4");
        assert_eq!(located[1].route_tag, "unknown");
        assert_eq!(located[1].render_key, "unknown-43.7--79.5");
        assert_eq!(located[2].render_key, "501-43.6--79.3");
    }

    #[test]
    fn test_row_marks_missing_speed_and_age() {
        let mut v = vehicle(Some("4401"), Some("504"), Some(43.649), Some(-79.3871));
        let bare = format_location_row(&VehicleLocation::from_vehicle(&v).unwrap());
        assert!(bare.contains("43.64900"));
        assert!(bare.contains("-79.38710"));
        assert_eq!(bare.matches("n/a").count(), 2);

        v.speed_km_hr = Some(18.0);
        v.secs_since_report = Some(7);
        let full = format_location_row(&VehicleLocation::from_vehicle(&v).unwrap());
        assert!(full.starts_with("4401     504"));
        assert!(full.ends_with("    18      7"));
    }

    #[test]
    fn test_sample_is_first_vehicle_raw_attributes() {
        let mut first = vehicle(Some("9"), Some("505"), None, None);
        first.raw = vec![("id", "9".to_string()), ("lat", "north".to_string())];
        let second = vehicle(Some("10"), Some("505"), None, None);

        let vehicles = [first, second];
        let sample = sample_vehicle(&vehicles).unwrap();
        assert_eq!(sample.get("lat"), Some(&"north"));
        assert_eq!(sample.len(), 2);
        assert!(sample_vehicle(&[]).is_none());
    }

    #[test]
    fn test_write_locations_header_and_rows() {
        let located =
            locate_vehicles(&[vehicle(Some("4401"), Some("504"), Some(43.6), Some(-79.4))]);
        let mut out = Vec::new();
        write_locations(&mut out, &located).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("vehicle"));
        assert!(lines[1].starts_with("4401"));
    }
}

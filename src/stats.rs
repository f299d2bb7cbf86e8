//! Per-route speed aggregation over a vehicle-location snapshot.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::entity::{LatestVehicle, RouteAttributes, RouteRecord};
use crate::parser::Vehicle;

/// Which route tags count towards the leaderboard.
///
/// The default keeps three-character tags starting with `5`, the TTC
/// streetcar routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFilter {
    pub prefixes: Vec<String>,
    pub tag_len: usize,
}

impl Default for RouteFilter {
    fn default() -> Self {
        Self {
            prefixes: vec!["5".to_string()],
            tag_len: 3,
        }
    }
}

impl RouteFilter {
    pub fn matches(&self, route_tag: &str) -> bool {
        route_tag.chars().count() == self.tag_len
            && self.prefixes.iter().any(|p| route_tag.starts_with(p.as_str()))
    }
}

#[derive(Debug)]
struct RouteStats {
    total_speed: f64,
    total_trams: u32,
    min_speed: f64,
    max_speed: f64,
    min_report_age_sec: Option<u32>,
}

impl RouteStats {
    fn new(speed: f64, report_age: Option<u32>) -> Self {
        Self {
            total_speed: 0.0,
            total_trams: 0,
            min_speed: speed,
            max_speed: speed,
            min_report_age_sec: report_age,
        }
    }

    fn add(&mut self, speed: f64, report_age: Option<u32>) {
        self.total_speed += speed;
        self.total_trams += 1;
        self.min_speed = self.min_speed.min(speed);
        self.max_speed = self.max_speed.max(speed);
        if let Some(age) = report_age {
            self.min_report_age_sec = Some(self.min_report_age_sec.map_or(age, |m| m.min(age)));
        }
    }

    fn avg_speed(&self) -> f64 {
        round_tenth(self.total_speed / f64::from(self.total_trams))
    }
}

/// Aggregates vehicles into one record per matching route, fastest first.
///
/// Vehicles without a finite speed are skipped. Speeds are truncated to
/// whole km/h before averaging and the average is rounded to one decimal.
pub fn aggregate_routes(
    vehicles: &[Vehicle],
    filter: &RouteFilter,
    now: DateTime<Utc>,
) -> Vec<RouteRecord> {
    let mut routes: BTreeMap<&str, RouteStats> = BTreeMap::new();

    for v in vehicles {
        let Some(route) = v.route_tag.as_deref() else {
            continue;
        };
        if !filter.matches(route) {
            continue;
        }
        let Some(speed) = v.speed_km_hr.map(f64::trunc) else {
            continue;
        };

        routes
            .entry(route)
            .or_insert_with(|| RouteStats::new(speed, v.secs_since_report))
            .add(speed, v.secs_since_report);
    }

    let latest = latest_by_route(vehicles);

    let mut records: Vec<RouteRecord> = routes
        .into_iter()
        .map(|(route, stats)| RouteRecord {
            route_number: Some(route.to_string()),
            avg_speed: Some(stats.avg_speed()),
            attributes: RouteAttributes {
                total_trams: Some(stats.total_trams),
                min_speed: Some(stats.min_speed),
                max_speed: Some(stats.max_speed),
                min_report_age_sec: stats.min_report_age_sec,
                last_updated: Some(now),
                latest_vehicle: latest.get(route).cloned(),
            },
        })
        .collect();

    records.sort_by(|a, b| {
        let a = a.avg_speed.unwrap_or_default();
        let b = b.avg_speed.unwrap_or_default();
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    });

    records
}

/// Most recently reporting vehicle with coordinates, per route tag. The
/// first vehicle seen wins until one with a smaller report age turns up.
pub fn latest_by_route(vehicles: &[Vehicle]) -> BTreeMap<&str, LatestVehicle> {
    let mut latest: BTreeMap<&str, (Option<u32>, LatestVehicle)> = BTreeMap::new();

    for v in vehicles {
        let (Some(route), Some(lat), Some(lon)) = (v.route_tag.as_deref(), v.lat, v.lon) else {
            continue;
        };
        let candidate = LatestVehicle {
            id: v.id.clone().unwrap_or_else(|| "unknown".to_string()),
            lat,
            lon,
        };

        match latest.get_mut(route) {
            None => {
                latest.insert(route, (v.secs_since_report, candidate));
            }
            Some((age, current)) => {
                let newer = match (v.secs_since_report, *age) {
                    (Some(_), None) => true,
                    (Some(new_age), Some(old_age)) => new_age < old_age,
                    (None, _) => false,
                };
                if newer {
                    *age = v.secs_since_report;
                    *current = candidate;
                }
            }
        }
    }

    latest
        .into_iter()
        .map(|(route, (_, vehicle))| (route, vehicle))
        .collect()
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

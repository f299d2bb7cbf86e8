//! Ranked route entities and the wire records they are validated from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of the most recently reporting vehicle on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestVehicle {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
}

/// Secondary fields carried alongside a ranked route. Never inspected by the
/// queue, reconciler or pacer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAttributes {
    pub total_trams: Option<u32>,
    pub min_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub min_report_age_sec: Option<u32>,
    pub last_updated: Option<DateTime<Utc>>,
    pub latest_vehicle: Option<LatestVehicle>,
}

/// A route in the leaderboard, identified by `key` and ranked by `value`
/// (average speed in km/h).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntity {
    pub key: String,
    pub value: f64,
    pub attributes: RouteAttributes,
}

impl RankedEntity {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
            attributes: RouteAttributes::default(),
        }
    }

    pub fn with_attributes(mut self, attributes: RouteAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Per-route record as produced by the aggregation step or served by the
/// leaderboard JSON API. Required fields are optional here so that a single
/// bad record can be rejected without failing the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    pub route_number: Option<String>,
    pub avg_speed: Option<f64>,
    #[serde(flatten)]
    pub attributes: RouteAttributes,
}

impl RouteRecord {
    pub fn new(route_number: impl Into<String>, avg_speed: f64) -> Self {
        Self {
            route_number: Some(route_number.into()),
            avg_speed: Some(avg_speed),
            attributes: RouteAttributes::default(),
        }
    }
}

/// Why a fetched record was excluded from reconciliation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("record has no route number")]
    MissingKey,
    #[error("route {key} has no average speed")]
    MissingValue { key: String },
    #[error("route {key} has non-finite average speed {value}")]
    NonFiniteValue { key: String, value: f64 },
}

impl TryFrom<RouteRecord> for RankedEntity {
    type Error = RecordError;

    fn try_from(record: RouteRecord) -> Result<Self, Self::Error> {
        let key = match record.route_number {
            Some(key) if !key.trim().is_empty() => key,
            _ => return Err(RecordError::MissingKey),
        };
        let value = match record.avg_speed {
            Some(value) if value.is_finite() => value,
            Some(value) => return Err(RecordError::NonFiniteValue { key, value }),
            None => return Err(RecordError::MissingValue { key }),
        };

        Ok(RankedEntity {
            key,
            value,
            attributes: record.attributes,
        })
    }
}

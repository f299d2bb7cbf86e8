//! Presentation sinks for published leaderboards.
//!
//! A [`Sink`] is handed every board the pacer publishes. Sinks only read
//! the board; they never feed anything back into the pacer.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use tracing::{debug, error};

use crate::entity::RankedEntity;
use crate::pacer::Board;
use crate::routes::{is_night_route, route_name};

/// Receives each published board.
pub trait Sink {
    fn publish(&mut self, board: &Board);
}

impl<F> Sink for F
where
    F: FnMut(&Board),
{
    fn publish(&mut self, board: &Board) {
        self(board)
    }
}

/// Forwards each board to several sinks in order.
#[derive(Default)]
pub struct Fanout(pub Vec<Box<dyn Sink>>);

impl Fanout {
    pub fn push(&mut self, sink: impl Sink + 'static) {
        self.0.push(Box::new(sink));
    }
}

impl Sink for Fanout {
    fn publish(&mut self, board: &Board) {
        for sink in self.0.iter_mut() {
            sink.publish(board);
        }
    }
}

/// Renders the board as ranked text rows.
pub struct TerminalSink<W: Write> {
    out: W,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, board: &Board) -> std::io::Result<()> {
        if board.is_empty() {
            writeln!(self.out, "Loading...")?;
        } else {
            for (rank, entity) in board.iter().enumerate() {
                writeln!(self.out, "{}", format_row(rank + 1, entity))?;
            }
        }
        writeln!(self.out)?;
        self.out.flush()
    }
}

impl<W: Write> Sink for TerminalSink<W> {
    fn publish(&mut self, board: &Board) {
        if let Err(e) = self.render(board) {
            error!(error = %e, "Failed to render leaderboard");
        }
    }
}

/// One leaderboard line, e.g.
/// `  1. 504 | King          14.2 km/h  trams: 20  min: 0.0 km/h  max: 31.0 km/h`.
pub fn format_row(rank: usize, entity: &RankedEntity) -> String {
    let name = route_name(&entity.key).unwrap_or("");
    let marker = if is_night_route(&entity.key) { "*" } else { " " };
    let mut line = format!(
        "{rank:>3}. {}{marker}| {name:<13} {:>5.1} km/h",
        entity.key, entity.value
    );

    let attrs = &entity.attributes;
    if let Some(trams) = attrs.total_trams {
        line.push_str(&format!("  trams: {trams}"));
    }
    if let Some(min) = attrs.min_speed {
        line.push_str(&format!("  min: {min:.1} km/h"));
    }
    if let Some(max) = attrs.max_speed {
        line.push_str(&format!("  max: {max:.1} km/h"));
    }
    match attrs.min_report_age_sec {
        Some(age) => line.push_str(&format!("  min report age: {age}s")),
        None if attrs.total_trams.is_some() => line.push_str("  min report age: n/a"),
        None => {}
    }
    if let Some(updated) = attrs.last_updated {
        let local: DateTime<Local> = updated.into();
        line.push_str(&format!("  updated: {}", local.format("%H:%M:%S")));
    }
    if let Some(latest) = &attrs.latest_vehicle {
        line.push_str(&format!(
            "  latest: {:.5}, {:.5} ({})",
            latest.lat, latest.lon, latest.id
        ));
    }

    line
}

/// Flat CSV row for one route on one published board.
#[derive(Debug, Serialize)]
struct BoardRow<'a> {
    published_at: DateTime<Utc>,
    rank: usize,
    route_number: &'a str,
    route_name: &'a str,
    avg_speed: f64,
    total_trams: Option<u32>,
    min_speed: Option<f64>,
    max_speed: Option<f64>,
    min_report_age_sec: Option<u32>,
    last_updated: Option<DateTime<Utc>>,
    latest_vehicle_id: Option<&'a str>,
    latest_lat: Option<f64>,
    latest_lon: Option<f64>,
}

/// Appends every published board to a CSV file, one row per route.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sink for CsvSink {
    fn publish(&mut self, board: &Board) {
        if let Err(e) = append_board(&self.path, board, Utc::now()) {
            error!(path = %self.path.display(), error = %e, "Failed to append leaderboard CSV");
        }
    }
}

/// Appends `board` as CSV rows stamped with `published_at`.
///
/// Creates the file with headers if it does not already exist.
pub fn append_board(
    path: &Path,
    board: &[RankedEntity],
    published_at: DateTime<Utc>,
) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, rows = board.len(), "Appending CSV rows");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for (rank, entity) in board.iter().enumerate() {
        let latest = entity.attributes.latest_vehicle.as_ref();
        writer.serialize(BoardRow {
            published_at,
            rank: rank + 1,
            route_number: &entity.key,
            route_name: route_name(&entity.key).unwrap_or(""),
            avg_speed: entity.value,
            total_trams: entity.attributes.total_trams,
            min_speed: entity.attributes.min_speed,
            max_speed: entity.attributes.max_speed,
            min_report_age_sec: entity.attributes.min_report_age_sec,
            last_updated: entity.attributes.last_updated,
            latest_vehicle_id: latest.map(|v| v.id.as_str()),
            latest_lat: latest.map(|v| v.lat),
            latest_lon: latest.map(|v| v.lon),
        })?;
    }
    writer.flush()?;

    Ok(())
}

/// Prints `value` to stdout as pretty JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

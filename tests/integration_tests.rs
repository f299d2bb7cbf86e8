use chrono::Utc;
use route_leaderboard::entity::RouteRecord;
use route_leaderboard::locations::{format_location_row, locate_vehicles, sample_vehicle};
use route_leaderboard::pacer::{Pacer, Step};
use route_leaderboard::parser::parse_vehicle_locations;
use route_leaderboard::queue::UpdateQueue;
use route_leaderboard::reconcile::reconcile;
use route_leaderboard::stats::{RouteFilter, aggregate_routes};

fn fixture_records() -> Vec<RouteRecord> {
    let xml = include_str!("fixtures/vehicle_locations.xml");
    let locations = parse_vehicle_locations(xml).expect("Failed to parse feed");
    aggregate_routes(&locations.vehicles, &RouteFilter::default(), Utc::now())
}

#[test]
fn test_feed_aggregates_streetcar_routes() {
    let records = fixture_records();

    let summary: Vec<_> = records
        .iter()
        .map(|r| (r.route_number.as_deref().unwrap(), r.avg_speed.unwrap()))
        .collect();
    // 501 keeps only its one vehicle with a numeric speed; 29 and 306 are filtered out.
    assert_eq!(summary, vec![("501", 21.0), ("510", 11.0), ("504", 10.0)]);

    let king = &records[2];
    assert_eq!(king.attributes.total_trams, Some(3));
    assert_eq!(king.attributes.min_report_age_sec, Some(3));
    assert_eq!(
        king.attributes.latest_vehicle.as_ref().map(|v| v.id.as_str()),
        Some("4402")
    );
}

#[test]
fn test_full_pipeline_drains_into_ranked_board() {
    let mut queue = UpdateQueue::new();
    let mut pacer = Pacer::new();

    let out = reconcile(fixture_records(), &pacer.board());
    assert_eq!(out.changed.len(), 3);
    queue.upsert_all(out.changed);

    let mut steps = 0;
    while let Step::Applied { order_changed, .. } = pacer.step(&mut queue) {
        assert!(order_changed);
        steps += 1;
    }
    assert_eq!(steps, 3);

    let keys: Vec<_> = pacer.board().iter().map(|e| e.key.clone()).collect();
    assert_eq!(keys, vec!["501", "510", "504"]);

    // The same snapshot again produces nothing to animate.
    let again = reconcile(fixture_records(), &pacer.board());
    assert!(again.changed.is_empty());
    assert_eq!(again.unchanged, 3);
}

#[test]
fn test_night_routes_ranked_when_requested() {
    let xml = include_str!("fixtures/vehicle_locations.xml");
    let locations = parse_vehicle_locations(xml).unwrap();
    let filter = RouteFilter {
        prefixes: vec!["5".to_string(), "3".to_string()],
        ..RouteFilter::default()
    };
    let records = aggregate_routes(&locations.vehicles, &filter, Utc::now());

    assert_eq!(records[0].route_number.as_deref(), Some("306"));
    assert_eq!(records.len(), 4);
}

#[test]
fn test_vehicle_listing_from_feed() {
    let xml = include_str!("fixtures/vehicle_locations.xml");
    let locations = parse_vehicle_locations(xml).unwrap();
    assert_eq!(locations.vehicles.len(), 11);

    // Route 29's second car has no position and is left out.
    let located = locate_vehicles(&locations.vehicles);
    assert_eq!(located.len(), 10);
    assert!(located.iter().all(|v| v.render_key != "8171"));

    let anonymous = located.last().unwrap();
    assert_eq!(anonymous.id, "unknown");
    assert_eq!(anonymous.route_tag, "unknown");
    assert_eq!(anonymous.render_key, "unknown-43.661--79.3833");

    // 4511 has no report age and 4421's speed did not parse.
    let rows: Vec<_> = located.iter().map(format_location_row).collect();
    assert!(rows[4].starts_with("4511     510"));
    assert!(rows[4].contains("43.64020"));
    assert!(rows[4].ends_with("n/a"));
    assert!(rows[6].contains("n/a"));

    let sample = sample_vehicle(&locations.vehicles).unwrap();
    assert_eq!(sample.get("id"), Some(&"4401"));
    assert_eq!(sample.get("speedKmHr"), Some(&"18"));
    assert_eq!(sample.len(), 9);
}

//! TTC streetcar route names.

/// Route number to street name, daytime (5xx) and overnight (3xx) services.
pub static ROUTE_NAMES: &[(&str, &str)] = &[
    ("501", "Queen"),
    ("503", "Kingston"),
    ("504", "King"),
    ("505", "Dundas"),
    ("506", "Carlton"),
    ("507", "Long Branch"),
    ("508", "Lake Shore"),
    ("509", "Harbourfront"),
    ("510", "Spadina"),
    ("511", "Bathurst"),
    ("512", "St. Clair"),
    ("301", "Queen"),
    ("304", "King"),
    ("305", "Dundas"),
    ("306", "Carlton"),
    ("310", "Spadina"),
    ("312", "St. Clair"),
];

pub fn route_name(route_number: &str) -> Option<&'static str> {
    ROUTE_NAMES
        .iter()
        .find(|(number, _)| *number == route_number)
        .map(|(_, name)| *name)
}

/// Overnight (Blue Night) routes are numbered in the 300s.
pub fn is_night_route(route_number: &str) -> bool {
    route_number.starts_with('3')
}

//! Real Paris locations (approximate building coordinates).

use tour_planner::Coordinate;
use tour_planner::itinerary::Site;

#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lon: f64) -> Self {
        Self { name, lat, lon }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

pub const PARIS: &[Location] = &[
    Location::new("Hotel de Ville", 48.8564, 2.3525),
    Location::new("Gare de Lyon", 48.8443, 2.3744),
    Location::new("Gare du Nord", 48.8809, 2.3553),
    Location::new("Place de la Republique", 48.8674, 2.3636),
    Location::new("Bastille", 48.8532, 2.3691),
    Location::new("Pantheon", 48.8462, 2.3464),
    Location::new("Gare Montparnasse", 48.8412, 2.3206),
    Location::new("Invalides", 48.8566, 2.3126),
    Location::new("Opera Garnier", 48.8720, 2.3316),
    Location::new("Gare Saint-Lazare", 48.8763, 2.3254),
    Location::new("Place d'Italie", 48.8310, 2.3555),
    Location::new("Nation", 48.8483, 2.3959),
];

pub fn paris_sites(count: usize) -> Vec<Site> {
    PARIS
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, location)| Site::new(format!("site-{}", i), location.name, location.lat, location.lon))
        .collect()
}

pub fn paris_coordinates(count: usize) -> Vec<Coordinate> {
    PARIS.iter().take(count).map(Location::coordinate).collect()
}

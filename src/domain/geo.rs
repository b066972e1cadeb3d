//! Great-circle distance between two coordinates
//!
//! Uses the spherical law of cosines. The central angle is converted to
//! nautical miles (one arc-minute per mile) and then to statute miles.

use crate::domain::types::Location;

/// Statute miles in one nautical mile
pub const STATUTE_MILES_PER_NAUTICAL_MILE: f64 = 1.15077945;

/// Distance between two locations in statute miles
pub fn distance(a: Location, b: Location) -> f64 {
    if a == b {
        return 0.0;
    }

    let lat1 = a.latitude.to_radians();
    let lon1 = a.longitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let lon2 = b.longitude.to_radians();

    // Rounding can push the cosine just outside [-1, 1] for (near-)identical points
    let cos_angle = (lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * (lon1 - lon2).cos())
        .clamp(-1.0, 1.0);
    let angle = cos_angle.acos();

    let nautical_miles = 60.0 * angle.to_degrees();
    STATUTE_MILES_PER_NAUTICAL_MILE * nautical_miles
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISNEYLAND: Location = Location::new(33.817595, -117.922008);
    const SAN_DIEGO_ZOO: Location = Location::new(32.735317, -117.149048);
    const BRONX_ZOO: Location = Location::new(40.852905, -73.872971);

    #[test]
    fn test_identical_points_are_zero() {
        assert_eq!(distance(DISNEYLAND, DISNEYLAND), 0.0);
        assert_eq!(distance(BRONX_ZOO, BRONX_ZOO), 0.0);
    }

    #[test]
    fn test_nearly_identical_points_do_not_nan() {
        let a = Location::new(38.897095, -77.006332);
        let b = Location::new(38.897095, -77.006332 + 1e-12);
        let d = distance(a, b);
        assert!(!d.is_nan());
        assert!(d < 1e-3);
    }

    #[test]
    fn test_symmetry() {
        let pairs = [(DISNEYLAND, SAN_DIEGO_ZOO), (DISNEYLAND, BRONX_ZOO), (SAN_DIEGO_ZOO, BRONX_ZOO)];
        for (a, b) in pairs {
            assert_eq!(distance(a, b), distance(b, a));
        }
    }

    #[test]
    fn test_known_distance() {
        // Anaheim to San Diego is roughly 85 miles as the crow flies
        let d = distance(DISNEYLAND, SAN_DIEGO_ZOO);
        assert!(d > 80.0 && d < 95.0, "got {d}");

        // Coast to coast
        let d = distance(DISNEYLAND, BRONX_ZOO);
        assert!(d > 2350.0 && d < 2500.0, "got {d}");
    }

    #[test]
    fn test_antipodal_points_do_not_nan() {
        let d = distance(Location::new(0.0, 0.0), Location::new(0.0, 180.0));
        assert!(!d.is_nan());
        // Half the circumference: 180 degrees * 60 nm
        assert!((d - 180.0 * 60.0 * STATUTE_MILES_PER_NAUTICAL_MILE).abs() < 1e-6);
    }
}

/*!
 * Geographic calculations.
 *
 * There is nothing fancy here, the grids this crate works with are regular latitude-longitude
 * grids, so only a few simple (approximate) calculations are needed.
 */

/// The nominal length of one degree of latitude (and of longitude) in kilometers.
///
/// The MERG and TRMM archives this crate was built around cover the tropics and subtropics, and
/// the same constant is used in both directions to get a nominal cell size.
pub const KM_PER_DEGREE: f64 = 111.0;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    /// Test if two coordinates are within `eps` degrees of each other in both directions.
    pub fn is_close(&self, other: Coord, eps: f64) -> bool {
        (self.lat - other.lat).abs() <= eps && (self.lon - other.lon).abs() <= eps
    }
}

/// A latitude-longitude aligned box described by its lower left and upper right corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub ll: Coord,
    pub ur: Coord,
}

impl BoundingBox {
    /// A box that covers the whole globe.
    pub const GLOBE: BoundingBox = BoundingBox {
        ll: Coord {
            lat: -90.0,
            lon: -180.0,
        },
        ur: Coord {
            lat: 90.0,
            lon: 180.0,
        },
    };

    /// Check if a coordinate falls inside (or on the boundary of) this box.
    pub fn contains(&self, coord: Coord) -> bool {
        coord.lat >= self.ll.lat
            && coord.lat <= self.ur.lat
            && coord.lon >= self.ll.lon
            && coord.lon <= self.ur.lon
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::GLOBE
    }
}

/**
 * the simple great circle distance calculation.
 *
 * #Arguments
 * * lat1 - the latitude of the first point in degrees.
 * * lon1 - the longitude of the first point in degrees.
 * * lat2 - the latitude of the second point in degrees.
 * * lon2 - the longitude of the second point in degrees.
 *
 * #Returns
 * The distance between the points in kilometers.
 */
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0090;

    let lat1_r = lat1.to_radians();
    let lon1_r = lon1.to_radians();
    let lat2_r = lat2.to_radians();
    let lon2_r = lon2.to_radians();

    let dlat2 = (lat2_r - lat1_r) / 2.0;
    let dlon2 = (lon2_r - lon1_r) / 2.0;

    let sin2_dlat = f64::powi(f64::sin(dlat2), 2);
    let sin2_dlon = f64::powi(f64::sin(dlon2), 2);

    let arc = 2.0
        * f64::asin(f64::sqrt(
            sin2_dlat + sin2_dlon * f64::cos(lat1_r) * f64::cos(lat2_r),
        ));

    arc * EARTH_RADIUS_KM
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_great_circle_distance_along_meridian() {
        // One degree of latitude is very nearly 111.2 km on a sphere with the mean Earth radius.
        let dist = great_circle_distance(10.0, 20.0, 11.0, 20.0);
        assert!((dist - 111.19).abs() < 0.01, "{}", dist);

        assert_eq!(great_circle_distance(45.0, -120.0, 45.0, -120.0), 0.0);
    }

    #[test]
    fn test_great_circle_distance_is_symmetric() {
        let there = great_circle_distance(12.0, -3.0, 15.5, 2.25);
        let back = great_circle_distance(15.5, 2.25, 12.0, -3.0);
        assert!((there - back).abs() < 1.0e-9);
    }

    #[test]
    fn test_bounding_box_contains() {
        let bbox = BoundingBox {
            ll: Coord { lat: 5.0, lon: -5.0 },
            ur: Coord { lat: 19.0, lon: 5.0 },
        };

        assert!(bbox.contains(Coord { lat: 10.0, lon: 0.0 }));
        assert!(bbox.contains(Coord { lat: 5.0, lon: 5.0 }));
        assert!(!bbox.contains(Coord { lat: 4.9, lon: 0.0 }));
        assert!(!bbox.contains(Coord { lat: 10.0, lon: 5.1 }));
        assert!(BoundingBox::GLOBE.contains(Coord { lat: -89.0, lon: 179.0 }));
    }
}

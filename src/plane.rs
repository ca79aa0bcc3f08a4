//! Local tangent plane arithmetic.
//!
//! Offsets are east/north metres from an origin. The approximation ignores
//! ellipsoidal curvature beyond the cosine-of-latitude term and holds for
//! offsets of a few kilometres.

use crate::state::GeoPoint;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uom::si::{f64::Length, length::meter};

/// Metres per degree of latitude.
pub const METRES_PER_DEGREE_LAT: f64 = 111_132.92;

/// Metres per degree of longitude at the equator.
pub const METRES_PER_DEGREE_LON: f64 = 111_319.9;

/// East/north displacement in a local tangent plane.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnuOffset {
    east: Length,
    north: Length,
}

impl EnuOffset {
    pub fn new(east: Length, north: Length) -> Self {
        Self { east, north }
    }

    pub fn from_metres(east: f64, north: f64) -> Self {
        Self::new(Length::new::<meter>(east), Length::new::<meter>(north))
    }

    pub fn east(&self) -> Length {
        self.east
    }

    pub fn north(&self) -> Length {
        self.north
    }

    pub fn east_m(&self) -> f64 {
        self.east.get::<meter>()
    }

    pub fn north_m(&self) -> f64 {
        self.north.get::<meter>()
    }
}

/// Scale factors turning metre offsets into degree offsets around `origin_lat_deg`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PlaneScale {
    lon_per_metre: f64,
    lat_per_metre: f64,
}

impl PlaneScale {
    pub(crate) fn at(origin_lat_deg: f64) -> Self {
        Self {
            lon_per_metre: 1.0 / (METRES_PER_DEGREE_LON * origin_lat_deg.to_radians().cos()),
            lat_per_metre: 1.0 / METRES_PER_DEGREE_LAT,
        }
    }

    /// Degree offsets (lon, lat) for metre offsets (east, north).
    #[inline]
    pub(crate) fn to_degrees(self, east: f64, north: f64) -> (f64, f64) {
        (east * self.lon_per_metre, north * self.lat_per_metre)
    }

    /// Metre offsets (east, north) for degree offsets (lon, lat).
    #[inline]
    pub(crate) fn to_metres(self, d_lon: f64, d_lat: f64) -> (f64, f64) {
        (d_lon / self.lon_per_metre, d_lat / self.lat_per_metre)
    }
}

/// Move `origin` by `offset`.
pub fn metres_to_lon_lat(offset: EnuOffset, origin: GeoPoint) -> GeoPoint {
    let (d_lon, d_lat) =
        PlaneScale::at(origin.lat_deg()).to_degrees(offset.east_m(), offset.north_m());
    GeoPoint::from_degrees(origin.lon_deg() + d_lon, origin.lat_deg() + d_lat)
}

/// Inverse of [`metres_to_lon_lat`]: the offset of `point` from `origin`.
pub fn lon_lat_to_metres(point: GeoPoint, origin: GeoPoint) -> EnuOffset {
    let (east, north) = PlaneScale::at(origin.lat_deg()).to_metres(
        point.lon_deg() - origin.lon_deg(),
        point.lat_deg() - origin.lat_deg(),
    );
    EnuOffset::from_metres(east, north)
}

use crate::error::Error;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use sguaba::systems::Wgs84;
use uom::{
    ConstZero,
    si::{
        angle::degree,
        f64::{Angle, Length, Time},
    },
};

/// Wrap `degrees` onto [0, 360).
pub fn wrap_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);

    // rem_euclid rounds tiny negative inputs up to exactly 360.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Wrap a heading onto [0, 360) degrees.
pub fn wrap_heading(angle: Angle) -> Angle {
    Angle::new::<degree>(wrap_degrees(angle.get::<degree>()))
}

/// A longitude/latitude pair on the WGS84 ellipsoid.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    longitude: Angle,
    latitude: Angle,
}

impl GeoPoint {
    pub fn new(longitude: Angle, latitude: Angle) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    pub fn from_degrees(longitude: f64, latitude: f64) -> Self {
        Self::new(
            Angle::new::<degree>(longitude),
            Angle::new::<degree>(latitude),
        )
    }

    pub fn longitude(&self) -> Angle {
        self.longitude
    }

    pub fn latitude(&self) -> Angle {
        self.latitude
    }

    pub fn lon_deg(&self) -> f64 {
        self.longitude.get::<degree>()
    }

    pub fn lat_deg(&self) -> f64 {
        self.latitude.get::<degree>()
    }

    pub fn is_finite(&self) -> bool {
        self.lon_deg().is_finite() && self.lat_deg().is_finite()
    }

    /// Lift the point onto the ellipsoid surface as a [`Wgs84`] position.
    pub fn to_wgs84(&self) -> Result<Wgs84, Error> {
        if !self.is_finite() {
            return Err(Error::MissingSensorData {
                field: "longitude/latitude",
            });
        }

        if !(-90.0..=90.0).contains(&self.lat_deg()) {
            return Err(Error::InvalidInput(format!(
                "latitude {} is outside -90 to 90",
                self.lat_deg()
            )));
        }

        Ok(Wgs84::builder()
            .latitude(self.latitude)
            .expect("latitude was checked to be between -90 and 90")
            .longitude(self.longitude)
            .altitude(Length::ZERO)
            .build())
    }
}

/// Platform attitude in degrees.
///
/// Yaw is a compass heading clockwise from north and is kept on [0, 360).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attitude {
    roll: Angle,
    pitch: Angle,
    yaw: Angle,
}

impl Attitude {
    pub fn new(roll: Angle, pitch: Angle, yaw: Angle) -> Self {
        Self {
            roll,
            pitch,
            yaw: wrap_heading(yaw),
        }
    }

    pub fn from_degrees(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(
            Angle::new::<degree>(roll),
            Angle::new::<degree>(pitch),
            Angle::new::<degree>(yaw),
        )
    }

    pub fn level() -> Self {
        Self::new(Angle::ZERO, Angle::ZERO, Angle::ZERO)
    }

    pub fn roll(&self) -> Angle {
        self.roll
    }

    pub fn pitch(&self) -> Angle {
        self.pitch
    }

    pub fn yaw(&self) -> Angle {
        self.yaw
    }

    /// Returns a copy with the heading replaced.
    pub fn with_yaw(self, yaw: Angle) -> Self {
        Self::new(self.roll, self.pitch, yaw)
    }

    pub fn is_finite(&self) -> bool {
        self.roll.get::<degree>().is_finite()
            && self.pitch.get::<degree>().is_finite()
            && self.yaw.get::<degree>().is_finite()
    }
}

/// Receiver-reported quality of a GPS fix. Either value may be absent from the log.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsQuality {
    pub satellites: Option<u8>,
    /// Horizontal dilution of precision.
    pub hdop: Option<f64>,
}

/// One telemetry sample of the platform.
///
/// Altitude is above the ground plane the camera looks at, not above a datum.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlatformState {
    timestamp: Time,
    position: GeoPoint,
    altitude: Length,
    attitude: Attitude,
    #[cfg_attr(feature = "serde", serde(default))]
    gps_quality: GpsQuality,
}

impl PlatformState {
    pub fn new(timestamp: Time, position: GeoPoint, altitude: Length, attitude: Attitude) -> Self {
        Self {
            timestamp,
            position,
            altitude,
            attitude,
            gps_quality: GpsQuality::default(),
        }
    }

    pub fn with_gps_quality(self, gps_quality: GpsQuality) -> Self {
        Self {
            gps_quality,
            ..self
        }
    }

    pub fn timestamp(&self) -> Time {
        self.timestamp
    }

    pub fn position(&self) -> GeoPoint {
        self.position
    }

    pub fn altitude(&self) -> Length {
        self.altitude
    }

    pub fn attitude(&self) -> Attitude {
        self.attitude
    }

    pub fn gps_quality(&self) -> GpsQuality {
        self.gps_quality
    }

    pub fn with_position(self, position: GeoPoint) -> Self {
        Self { position, ..self }
    }

    pub fn with_yaw(self, yaw: Angle) -> Self {
        Self {
            attitude: self.attitude.with_yaw(yaw),
            ..self
        }
    }

    /// Checks the fields needed to georeference an image taken from this state.
    pub fn check_georeferenceable(&self) -> Result<(), Error> {
        use uom::si::length::meter;

        if !self.altitude.get::<meter>().is_finite() {
            return Err(Error::MissingSensorData { field: "altitude" });
        }

        if !self.position.is_finite() {
            return Err(Error::MissingSensorData {
                field: "longitude/latitude",
            });
        }

        if !self.attitude.is_finite() {
            return Err(Error::MissingSensorData { field: "attitude" });
        }

        Ok(())
    }
}

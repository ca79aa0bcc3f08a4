use crate::{
    error::Error,
    state::{GeoPoint, wrap_heading},
};
use chrono::prelude::*;
use sguaba::{Bearing, system};
use uom::{
    ConstZero,
    si::{angle::degree, f64::Angle},
};

system!(struct ObserverEnu using ENU);

/// Where the sun stands for an observer on the ground at a given instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolarModel {
    /// The location of the sun's center as seen from the observer.
    solar_bearing: Bearing<ObserverEnu>,
}

impl SolarModel {
    /// Solar position at `position` and `time`, via the NREL solar position algorithm.
    ///
    /// `time` may be in any timezone; it is converted to UTC.
    pub fn at<Tz: TimeZone>(position: GeoPoint, time: &DateTime<Tz>) -> Result<Self, Error> {
        let position = position.to_wgs84()?;
        let solar_pos = spa::solar_position::<spa::StdFloatOps>(
            time.with_timezone(&Utc),
            position.latitude().get::<degree>(),
            position.longitude().get::<degree>(),
        )
        .map_err(|err| Error::InvalidInput(format!("solar position failed: {err:?}")))?;

        Self::from_angles(solar_pos.azimuth, solar_pos.zenith_angle)
    }

    /// Build from an azimuth (clockwise from north) and a zenith angle, both in degrees.
    pub fn from_angles(azimuth_deg: f64, zenith_deg: f64) -> Result<Self, Error> {
        if !azimuth_deg.is_finite() || !(0.0..=180.0).contains(&zenith_deg) {
            return Err(Error::InvalidInput(format!(
                "solar azimuth {azimuth_deg} or zenith {zenith_deg} is out of range"
            )));
        }

        Ok(Self {
            solar_bearing: Bearing::<ObserverEnu>::builder()
                .azimuth(Angle::new::<degree>(azimuth_deg))
                // The elevation is taken from the horizontal plane towards up.
                .elevation(Angle::HALF_TURN / 2. - Angle::new::<degree>(zenith_deg))
                .expect("zenith was checked to be on the range 0 to 180")
                .build(),
        })
    }

    /// Solar azimuth clockwise from true north, on [0, 360).
    pub fn azimuth(&self) -> Angle {
        wrap_heading(self.solar_bearing.azimuth())
    }

    pub fn elevation(&self) -> Angle {
        self.solar_bearing.elevation()
    }

    pub fn is_above_horizon(&self) -> bool {
        self.elevation() > Angle::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::FixedOffset;

    #[test]
    fn stores_azimuth_and_elevation() {
        let model = SolarModel::from_angles(135.0, 30.0).unwrap();
        assert_relative_eq!(model.azimuth().get::<degree>(), 135.0, epsilon = 1e-9);
        assert_relative_eq!(model.elevation().get::<degree>(), 60.0, epsilon = 1e-9);
        assert!(model.is_above_horizon());
    }

    #[test]
    fn rejects_bad_zenith() {
        assert!(SolarModel::from_angles(10.0, 190.0).is_err());
        assert!(SolarModel::from_angles(f64::NAN, 10.0).is_err());
    }

    #[test]
    fn noon_sun_is_south_in_the_north() {
        // Local solar noon near Greenwich at the June solstice.
        let time = Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap();
        let model = SolarModel::at(GeoPoint::from_degrees(0.0, 51.5), &time).unwrap();

        assert!((model.azimuth().get::<degree>() - 180.0).abs() < 5.0);
        assert!((model.elevation().get::<degree>() - 62.0).abs() < 1.0);
    }

    #[test]
    fn timezone_does_not_change_the_sun() {
        let utc = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let local = utc.with_timezone(&FixedOffset::east_opt(2 * 3600).unwrap());
        let position = GeoPoint::from_degrees(23.7, 37.9);

        assert_eq!(
            SolarModel::at(position, &utc).unwrap(),
            SolarModel::at(position, &local).unwrap()
        );
    }

    #[test]
    fn invalid_position_fails() {
        let time = Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap();
        assert!(
            SolarModel::at(GeoPoint::from_degrees(0.0, f64::NAN), &time).is_err()
        );
    }
}

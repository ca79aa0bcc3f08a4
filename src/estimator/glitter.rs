use super::{Estimator, Observation};
use crate::{
    ellipse::Ellipse,
    error::Error,
    image::IntensityImage,
    model::SolarModel,
    state::{GeoPoint, wrap_degrees},
};
use chrono::{DateTime, TimeZone};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::path::Path;
use uom::si::{angle::degree, f64::Angle};

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GlitterParams {
    /// Frames whose brightest pixel is below this are too dark to hold glitter.
    pub brightness_floor: u8,

    /// Mask threshold as a fraction of the brightest pixel.
    pub threshold_fraction: f64,

    /// Gaussian blur sigma in pixels. 30.5 matches a 201 px kernel.
    pub blur_sigma: f64,
}

impl Default for GlitterParams {
    fn default() -> Self {
        Self {
            brightness_floor: 100,
            threshold_fraction: 0.5,
            blur_sigma: 30.5,
        }
    }
}

/// A successful glitter fit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlitterEstimate {
    yaw: Angle,
    solar_azimuth: Angle,
    ellipse: Ellipse,
}

impl GlitterEstimate {
    /// Platform heading implied by the glitter, on [0, 360).
    pub fn yaw(&self) -> Angle {
        self.yaw
    }

    pub fn solar_azimuth(&self) -> Angle {
        self.solar_azimuth
    }

    pub fn ellipse(&self) -> &Ellipse {
        &self.ellipse
    }
}

/// Estimates platform yaw from the sun's specular reflection.
///
/// The glitter patch is elongated towards the sun, so the major axis of an
/// ellipse fitted to it points along the solar azimuth. With the axis angle
/// measured clockwise from image up, yaw is `solar_azimuth - axis_angle`.
/// The axis has no direction, which leaves a 180 degree ambiguity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlitterYawEstimator {
    params: GlitterParams,
}

impl GlitterYawEstimator {
    pub fn new(params: GlitterParams) -> Result<Self, Error> {
        if !(params.threshold_fraction > 0.0 && params.threshold_fraction <= 1.0) {
            return Err(Error::InvalidInput(format!(
                "glitter threshold fraction {} is not in (0, 1]",
                params.threshold_fraction
            )));
        }

        if !(params.blur_sigma.is_finite() && params.blur_sigma > 0.0) {
            return Err(Error::InvalidInput(format!(
                "glitter blur sigma {} must be positive",
                params.blur_sigma
            )));
        }

        Ok(Self { params })
    }

    pub fn params(&self) -> &GlitterParams {
        &self.params
    }

    /// Fit an ellipse to the largest bright region of `image`.
    pub fn fit_glitter(&self, image: &IntensityImage) -> Result<Ellipse, Error> {
        let max = image.max_intensity();
        if max < self.params.brightness_floor {
            log::debug!(
                "brightest pixel {max} is below the glitter floor {}",
                self.params.brightness_floor
            );
            return Err(Error::GlitterNotFound);
        }

        let level = self.params.threshold_fraction * max as f64;
        let contours = image
            .blur(self.params.blur_sigma as f32)
            .threshold(level)
            .contours();

        let Some(largest) = contours.first() else {
            log::debug!("no contour above {level:.1}");
            return Err(Error::GlitterNotFound);
        };

        let points: Vec<(f64, f64)> = largest
            .points()
            .iter()
            .map(|&(x, y)| (x as f64, y as f64))
            .collect();

        Ellipse::fit(&points).ok_or(Error::GlitterNotFound)
    }

    /// Estimate yaw, reporting why it failed.
    pub fn try_estimate<Tz: TimeZone>(
        &self,
        image: &IntensityImage,
        capture_time: &DateTime<Tz>,
        position: GeoPoint,
    ) -> Result<GlitterEstimate, Error> {
        let ellipse = self.fit_glitter(image)?;
        let solar_azimuth = SolarModel::at(position, capture_time)?.azimuth();
        let yaw = wrap_degrees(solar_azimuth.get::<degree>() - ellipse.angle());

        log::debug!(
            "glitter axis {:.1} deg, solar azimuth {:.1} deg, yaw {yaw:.1} deg",
            ellipse.angle(),
            solar_azimuth.get::<degree>()
        );

        Ok(GlitterEstimate {
            yaw: Angle::new::<degree>(yaw),
            solar_azimuth,
            ellipse,
        })
    }

    /// Yaw on [0, 360), or `None` when the frame holds no usable glitter.
    pub fn estimate_yaw<Tz: TimeZone>(
        &self,
        image: &IntensityImage,
        capture_time: &DateTime<Tz>,
        position: GeoPoint,
    ) -> Option<Angle> {
        match self.try_estimate(image, capture_time, position) {
            Ok(estimate) => Some(estimate.yaw()),
            Err(err) => {
                log::info!("glitter yaw unavailable: {err}");
                None
            }
        }
    }

    /// Decode `path` and estimate yaw from it.
    pub fn try_estimate_path<Tz: TimeZone>(
        &self,
        path: impl AsRef<Path>,
        capture_time: &DateTime<Tz>,
        position: GeoPoint,
    ) -> Result<GlitterEstimate, Error> {
        let image = IntensityImage::open(path)?;
        self.try_estimate(&image, capture_time, position)
    }
}

impl Estimator for GlitterYawEstimator {
    type Output = Option<Angle>;

    fn estimate(&self, observation: &Observation<'_>) -> Self::Output {
        self.estimate_yaw(
            observation.image,
            &observation.capture_time,
            observation.position,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use image::{GrayImage, Luma};

    fn bright_ellipse(angle: f64) -> IntensityImage {
        let (sin, cos) = angle.to_radians().sin_cos();
        IntensityImage::from_gray(GrayImage::from_fn(240, 180, |x, y| {
            let (dx, dy) = (x as f64 - 120.0, y as f64 - 90.0);
            let along = dx * sin - dy * cos;
            let across = dx * cos + dy * sin;
            let inside = (along / 70.0).powi(2) + (across / 25.0).powi(2) <= 1.0;
            Luma([if inside { 250 } else { 15 }])
        }))
    }

    fn estimator() -> GlitterYawEstimator {
        GlitterYawEstimator::new(GlitterParams {
            blur_sigma: 3.0,
            ..Default::default()
        })
        .unwrap()
    }

    fn heading_distance(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(360.0);
        d.min(360.0 - d)
    }

    #[test]
    fn dark_frame_has_no_glitter() {
        let image = IntensityImage::from_gray(GrayImage::new(64, 48));
        assert!(matches!(
            estimator().fit_glitter(&image),
            Err(Error::GlitterNotFound)
        ));
    }

    #[test]
    fn saturated_frame_has_no_contour() {
        let image = IntensityImage::from_gray(GrayImage::from_pixel(64, 48, Luma([240])));
        assert!(matches!(
            estimator().fit_glitter(&image),
            Err(Error::GlitterNotFound)
        ));
    }

    #[test]
    fn fits_axis_of_bright_patch() {
        for angle in [20.0, 75.0, 140.0] {
            let ellipse = estimator().fit_glitter(&bright_ellipse(angle)).unwrap();
            let error = (ellipse.angle() - angle).abs();
            assert!(
                error.min(180.0 - error) < 2.0,
                "{angle}: {}",
                ellipse.angle()
            );
            assert!(ellipse.semi_major() > 2.0 * ellipse.semi_minor());
        }
    }

    #[test]
    fn yaw_is_azimuth_minus_axis() {
        let time = Utc.with_ymd_and_hms(2023, 7, 14, 9, 0, 0).unwrap();
        let position = GeoPoint::from_degrees(-2.1, 41.4);
        let azimuth = SolarModel::at(position, &time)
            .unwrap()
            .azimuth()
            .get::<degree>();

        let estimate = estimator()
            .try_estimate(&bright_ellipse(40.0), &time, position)
            .unwrap();
        assert!(
            heading_distance(estimate.yaw().get::<degree>(), azimuth - 40.0) < 5.0
        );
        assert!((0.0..360.0).contains(&estimate.yaw().get::<degree>()));
    }

    #[test]
    fn rejects_bad_params() {
        let params = GlitterParams {
            threshold_fraction: 1.5,
            ..Default::default()
        };
        assert!(GlitterYawEstimator::new(params).is_err());
    }

    #[test]
    fn unreadable_path() {
        let time = Utc.with_ymd_and_hms(2023, 7, 14, 9, 0, 0).unwrap();
        assert!(matches!(
            estimator().try_estimate_path("missing.jpg", &time, GeoPoint::from_degrees(0.0, 0.0)),
            Err(Error::ImageUnreadable(_))
        ));
    }
}

mod glitter;

use crate::{image::IntensityImage, state::GeoPoint};
use chrono::{DateTime, Utc};
pub use glitter::{GlitterEstimate, GlitterParams, GlitterYawEstimator};

/// What an estimator sees of one frame.
#[derive(Clone, Copy, Debug)]
pub struct Observation<'a> {
    pub image: &'a IntensityImage,
    pub capture_time: DateTime<Utc>,
    pub position: GeoPoint,
}

pub trait Estimator {
    type Output;
    fn estimate(&self, observation: &Observation<'_>) -> Self::Output;
}

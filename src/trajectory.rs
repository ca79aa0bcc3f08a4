use crate::{
    error::Error,
    state::{GeoPoint, PlatformState},
};
use uom::si::{f64::Time, time::second};

/// A time-ordered sequence of platform states from one mission.
///
/// Timestamps are finite and non-decreasing. Repeated timestamps are allowed.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    samples: Vec<PlatformState>,
}

impl Trajectory {
    pub fn new(samples: Vec<PlatformState>) -> Result<Self, Error> {
        let mut previous: Option<f64> = None;
        for (index, sample) in samples.iter().enumerate() {
            let current = sample.timestamp().get::<second>();
            if !current.is_finite() {
                return Err(Error::MissingSensorData { field: "timestamp" });
            }

            if let Some(previous) = previous
                && current < previous
            {
                return Err(Error::NonMonotonicTrajectory {
                    index,
                    previous,
                    current,
                });
            }

            previous = Some(current);
        }

        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[PlatformState] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Position of the first sample, the anchor of the local tangent plane.
    pub fn origin(&self) -> Option<GeoPoint> {
        self.samples.first().map(PlatformState::position)
    }

    /// Elapsed time since the previous sample; zero for the first.
    pub fn intervals(&self) -> impl Iterator<Item = Time> + '_ {
        let first = self.samples.first().map(PlatformState::timestamp);
        self.samples
            .iter()
            .scan(first, |previous, sample| {
                let interval = previous.map(|previous| sample.timestamp() - previous);
                *previous = Some(sample.timestamp());
                interval
            })
    }

    pub fn into_samples(self) -> Vec<PlatformState> {
        self.samples
    }
}

impl TryFrom<Vec<PlatformState>> for Trajectory {
    type Error = Error;

    fn try_from(samples: Vec<PlatformState>) -> Result<Self, Self::Error> {
        Self::new(samples)
    }
}

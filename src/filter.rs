//! Constant-velocity Kalman smoothing of platform position.
//!
//! The state is `[east, north, east_velocity, north_velocity]` in a local
//! tangent plane anchored at the first sample. Each sample advances the state
//! with a pure [`KalmanState::step`], so a pass is a fold over the trajectory.

use crate::{
    error::Error,
    plane::{EnuOffset, lon_lat_to_metres, metres_to_lon_lat},
    state::{GeoPoint, PlatformState},
    trajectory::Trajectory,
};
use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uom::{
    ConstZero,
    si::{
        f64::{Time, Velocity},
        time::second,
        velocity::meter_per_second,
    },
};

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SmootherParams {
    /// Standard deviation of unmodelled acceleration.
    pub acceleration_noise_mps2: f64,

    /// Standard deviation of a GPS fix, per axis.
    pub gps_noise_m: f64,

    /// Standard deviation of the initial (zero) velocity guess.
    pub initial_velocity_std_mps: f64,
}

impl Default for SmootherParams {
    fn default() -> Self {
        Self {
            acceleration_noise_mps2: 0.1,
            gps_noise_m: 3.0,
            initial_velocity_std_mps: 10.0,
        }
    }
}

/// Variances derived from [`SmootherParams`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseModel {
    acceleration_var: f64,
    measurement_var: f64,
    initial_velocity_var: f64,
}

impl NoiseModel {
    pub fn new(params: &SmootherParams) -> Result<Self, Error> {
        let check = |name: &str, value: f64| match value.is_finite() && value > 0.0 {
            true => Ok(value * value),
            false => Err(Error::InvalidInput(format!(
                "{name} must be positive and finite, got {value}"
            ))),
        };

        Ok(Self {
            acceleration_var: check("acceleration noise", params.acceleration_noise_mps2)?,
            measurement_var: check("gps noise", params.gps_noise_m)?,
            initial_velocity_var: check("initial velocity std", params.initial_velocity_std_mps)?,
        })
    }

    /// Discrete white-noise acceleration covariance for one axis pair.
    fn process(&self, dt: f64) -> Matrix4<f64> {
        let (dt2, dt3, dt4) = (dt * dt, dt * dt * dt, dt * dt * dt * dt);
        let (pp, pv, vv) = (dt4 / 4.0, dt3 / 2.0, dt2);

        #[rustfmt::skip]
        let q = Matrix4::new(
            pp,  0.0, pv,  0.0,
            0.0, pp,  0.0, pv,
            pv,  0.0, vv,  0.0,
            0.0, pv,  0.0, vv,
        );

        q * self.acceleration_var
    }

    fn measurement(&self) -> Matrix2<f64> {
        Matrix2::identity() * self.measurement_var
    }
}

/// Position/velocity estimate and its covariance.
///
/// Serializable so a filter can be checkpointed between passes.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KalmanState {
    x: Vector4<f64>,
    p: Matrix4<f64>,
}

impl KalmanState {
    /// At the plane origin with zero velocity.
    pub fn seed(noise: &NoiseModel) -> Self {
        Self {
            x: Vector4::zeros(),
            p: Matrix4::from_diagonal(&Vector4::new(
                noise.measurement_var,
                noise.measurement_var,
                noise.initial_velocity_var,
                noise.initial_velocity_var,
            )),
        }
    }

    pub fn offset(&self) -> EnuOffset {
        EnuOffset::from_metres(self.x[0], self.x[1])
    }

    /// East and north velocity in m/s.
    pub fn velocity(&self) -> (f64, f64) {
        (self.x[2], self.x[3])
    }

    pub fn speed(&self) -> Velocity {
        Velocity::new::<meter_per_second>(self.x[2].hypot(self.x[3]))
    }

    pub fn covariance(&self) -> &Matrix4<f64> {
        &self.p
    }

    /// Advance by `dt` seconds. A zero `dt` leaves the state untouched.
    pub fn predict(&self, dt: f64, noise: &NoiseModel) -> Self {
        if dt == 0.0 {
            return *self;
        }

        let mut f = Matrix4::identity();
        f[(0, 2)] = dt;
        f[(1, 3)] = dt;

        Self {
            x: f * self.x,
            p: f * self.p * f.transpose() + noise.process(dt),
        }
    }

    /// Correct with a measured offset.
    pub fn update(&self, z: Vector2<f64>, noise: &NoiseModel) -> Self {
        #[rustfmt::skip]
        let h = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );
        let r = noise.measurement();

        let s = h * self.p * h.transpose() + r;
        let Some(s_inv) = s.try_inverse() else {
            log::warn!("innovation covariance is singular, skipping update");
            return *self;
        };

        let k = self.p * h.transpose() * s_inv;
        let innovation = z - h * self.x;

        // Joseph form keeps the covariance symmetric.
        let i_kh = Matrix4::identity() - k * h;
        Self {
            x: self.x + k * innovation,
            p: i_kh * self.p * i_kh.transpose() + k * r * k.transpose(),
        }
    }

    /// One predict/update cycle. A missing measurement only predicts.
    pub fn step(&self, measurement: Option<EnuOffset>, dt: f64, noise: &NoiseModel) -> Self {
        let predicted = self.predict(dt, noise);
        match measurement {
            Some(offset) => {
                predicted.update(Vector2::new(offset.east_m(), offset.north_m()), noise)
            }
            None => predicted,
        }
    }
}

/// One smoothed trajectory sample.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SmoothedSample {
    /// The input sample with its position replaced by the estimate.
    state: PlatformState,
    raw_position: GeoPoint,
    /// Estimate minus measurement; `None` when the fix was missing.
    correction: Option<EnuOffset>,
    speed: Velocity,
    interval: Time,
}

impl SmoothedSample {
    pub fn state(&self) -> &PlatformState {
        &self.state
    }

    pub fn raw_position(&self) -> GeoPoint {
        self.raw_position
    }

    pub fn correction(&self) -> Option<EnuOffset> {
        self.correction
    }

    pub fn speed(&self) -> Velocity {
        self.speed
    }

    /// Time since the previous sample.
    pub fn interval(&self) -> Time {
        self.interval
    }
}

/// Runs the Kalman recurrence over whole trajectories.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Smoother {
    noise: NoiseModel,
}

impl Smoother {
    pub fn new(params: &SmootherParams) -> Result<Self, Error> {
        Ok(Self {
            noise: NoiseModel::new(params)?,
        })
    }

    pub fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    fn sample(
        input: &PlatformState,
        filter: &KalmanState,
        measured: Option<EnuOffset>,
        origin: GeoPoint,
        interval: Time,
    ) -> SmoothedSample {
        let estimate = filter.offset();
        SmoothedSample {
            state: input.with_position(metres_to_lon_lat(estimate, origin)),
            raw_position: input.position(),
            correction: measured.map(|measured| {
                EnuOffset::from_metres(
                    estimate.east_m() - measured.east_m(),
                    estimate.north_m() - measured.north_m(),
                )
            }),
            speed: filter.speed(),
            interval,
        }
    }

    /// Smooth one trajectory. Samples are strictly sequential.
    ///
    /// The first sample seeds the filter and must have a finite position.
    /// Later samples without a finite position only advance the prediction.
    pub fn smooth(&self, trajectory: &Trajectory) -> Result<Vec<SmoothedSample>, Error> {
        let Some(first) = trajectory.samples().first() else {
            return Ok(Vec::new());
        };

        let origin = first.position();
        if !origin.is_finite() {
            return Err(Error::MissingSensorData {
                field: "longitude/latitude",
            });
        }

        let seed = KalmanState::seed(&self.noise);
        let head = Self::sample(
            first,
            &seed,
            Some(EnuOffset::from_metres(0.0, 0.0)),
            origin,
            Time::ZERO,
        );

        let tail = trajectory
            .samples()
            .iter()
            .zip(trajectory.intervals())
            .skip(1)
            .scan(seed, |filter, (input, interval)| {
                let measured = input
                    .position()
                    .is_finite()
                    .then(|| lon_lat_to_metres(input.position(), origin));
                if measured.is_none() {
                    log::info!(
                        "no position fix at {} s, predicting only",
                        input.timestamp().get::<second>()
                    );
                }

                *filter = filter.step(measured, interval.get::<second>(), &self.noise);
                log::debug!(
                    "kalman step: dt={} s east={:.2} m north={:.2} m",
                    interval.get::<second>(),
                    filter.offset().east_m(),
                    filter.offset().north_m()
                );

                Some(Self::sample(input, filter, measured, origin, interval))
            });

        Ok(std::iter::once(head).chain(tail).collect())
    }
}

/// Smooth independent trajectories in parallel.
pub fn par_smooth(
    smoother: &Smoother,
    trajectories: &[Trajectory],
) -> Vec<Result<Vec<SmoothedSample>, Error>> {
    trajectories
        .par_iter()
        .map(|trajectory| smoother.smooth(trajectory))
        .collect()
}


#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn filter_state_survives_a_checkpoint() {
        let noise = NoiseModel::new(&SmootherParams::default()).unwrap();
        let state = KalmanState::seed(&noise)
            .update(Vector2::new(4.0, -1.0), &noise)
            .predict(1.5, &noise);

        let json = serde_json::to_string(&state).unwrap();
        let restored: KalmanState = serde_json::from_str(&json).unwrap();
        assert_relative_eq!(
            restored.offset().east_m(),
            state.offset().east_m(),
            epsilon = 1e-12
        );
        assert_relative_eq!(restored.velocity().0, state.velocity().0, epsilon = 1e-12);
        assert_relative_eq!(*restored.covariance(), *state.covariance(), epsilon = 1e-9);
    }
}

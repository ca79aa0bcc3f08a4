//! Composition of platform attitude with the camera mount.

use crate::{camera::CameraMount, state::Attitude, state::wrap_heading};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uom::si::{
    angle::{degree, radian},
    f64::Angle,
};

/// Net pitch, roll and yaw of the camera's optical axis for one image.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetOrientation {
    pitch: Angle,
    roll: Angle,
    yaw: Angle,
}

impl NetOrientation {
    pub fn new(pitch: Angle, roll: Angle, yaw: Angle) -> Self {
        Self {
            pitch,
            roll,
            yaw: wrap_heading(yaw),
        }
    }

    pub fn pitch(&self) -> Angle {
        self.pitch
    }

    pub fn roll(&self) -> Angle {
        self.roll
    }

    /// Heading of the image's up direction, on [0, 360).
    pub fn yaw(&self) -> Angle {
        self.yaw
    }
}

/// Rotate the platform's pitch and roll into the camera frame and add the
/// mount offsets.
///
/// ```text
/// pitch = mount_pitch + cos(mount_yaw) * platform_pitch - sin(mount_yaw) * platform_roll
/// roll  =               sin(mount_yaw) * platform_pitch + cos(mount_yaw) * platform_roll
/// yaw   = (platform_yaw + mount_yaw) mod 360
/// ```
///
/// NaN attitude propagates into the result.
pub fn compose(
    platform_roll: Angle,
    platform_pitch: Angle,
    platform_yaw: Angle,
    mount_pitch_offset: Angle,
    mount_yaw_offset: Angle,
) -> NetOrientation {
    let (sin, cos) = mount_yaw_offset.get::<radian>().sin_cos();
    let pitch = platform_pitch.get::<degree>();
    let roll = platform_roll.get::<degree>();

    NetOrientation::new(
        mount_pitch_offset + Angle::new::<degree>(cos * pitch - sin * roll),
        Angle::new::<degree>(sin * pitch + cos * roll),
        platform_yaw + mount_yaw_offset,
    )
}

/// [`compose`] for a platform attitude and a camera mount.
pub fn compose_mount(attitude: &Attitude, mount: &CameraMount) -> NetOrientation {
    compose(
        attitude.roll(),
        attitude.pitch(),
        attitude.yaw(),
        mount.pitch_offset(),
        mount.yaw_offset(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::relative_eq;
    use quickcheck::quickcheck;

    fn deg(value: f64) -> Angle {
        Angle::new::<degree>(value)
    }

    quickcheck! {
        fn zero_mount_yaw_is_identity(
            roll_seed: i16,
            pitch_seed: i16,
            yaw_seed: i32,
            mount_pitch_seed: i8
        ) -> bool {
            let roll = roll_seed as f64 / 100.0;
            let pitch = pitch_seed as f64 / 100.0;
            let yaw = yaw_seed as f64 / 1000.0;
            let mount_pitch = mount_pitch_seed as f64;

            let net = compose(deg(roll), deg(pitch), deg(yaw), deg(mount_pitch), deg(0.0));

            relative_eq!(net.pitch().get::<degree>(), mount_pitch + pitch, epsilon = 1e-9)
                && relative_eq!(net.roll().get::<degree>(), roll, epsilon = 1e-9)
                && heading_distance(net.yaw().get::<degree>(), yaw) < 1e-9
        }
    }

    fn heading_distance(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(360.0);
        d.min(360.0 - d)
    }

    #[test]
    fn yaw_wraps_across_full_turns() {
        let net = compose(deg(0.0), deg(0.0), deg(-90.0), deg(0.0), deg(450.0));
        let yaw = net.yaw().get::<degree>();
        assert!((0.0..360.0).contains(&yaw));
        assert!(heading_distance(yaw, 0.0) < 1e-9);
    }

    #[test]
    fn side_mount_swaps_pitch_and_roll() {
        // A camera facing right sees platform pitch as roll and platform roll as negative pitch.
        let net = compose(deg(5.0), deg(10.0), deg(0.0), deg(-30.0), deg(90.0));
        assert!(relative_eq!(
            net.pitch().get::<degree>(),
            -35.0,
            epsilon = 1e-9
        ));
        assert!(relative_eq!(
            net.roll().get::<degree>(),
            10.0,
            epsilon = 1e-9
        ));
        assert!(relative_eq!(
            net.yaw().get::<degree>(),
            90.0,
            epsilon = 1e-9
        ));
    }

    #[test]
    fn nan_attitude_propagates() {
        let net = compose(deg(f64::NAN), deg(0.0), deg(0.0), deg(-90.0), deg(30.0));
        assert!(net.roll().get::<degree>().is_nan());
        assert!(net.pitch().get::<degree>().is_nan());
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A telemetry field required for this operation is not finite.
    #[error("missing sensor data: {field} is not finite")]
    MissingSensorData { field: &'static str },

    /// Trajectory timestamps went backwards.
    #[error(
        "trajectory timestamps must be non-decreasing: sample {index} at {current} s precedes {previous} s"
    )]
    NonMonotonicTrajectory {
        index: usize,
        previous: f64,
        current: f64,
    },

    /// Every pixel of the frame points at or above the horizon.
    #[error("degenerate projection: all {pixels} pixels reach the horizon")]
    DegenerateProjection { pixels: usize },

    #[error("no glitter region found")]
    GlitterNotFound,

    #[error("image unreadable: {0}")]
    ImageUnreadable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("output failed: {0}")]
    Output(String),
}

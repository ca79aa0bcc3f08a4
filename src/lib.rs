// #![warn(missing_docs)]

//! Per-pixel georeferencing of oblique airborne imagery.
//!
//! Telemetry is smoothed with a constant-velocity Kalman filter, each image
//! is projected onto a flat ground plane through its camera mount, and the
//! platform heading can be recovered from the sun's glitter on water.

#[allow(missing_docs)]
pub mod error;

pub mod camera;
pub mod config;
pub mod ellipse;
pub mod estimator;
pub mod filter;
pub mod georeference;
pub mod image;
pub mod model;
pub mod orientation;
pub mod output;
pub mod pipeline;
pub mod plane;
pub mod projection;
pub mod state;
pub mod trajectory;

pub mod prelude {
    pub use crate::{
        camera::{CameraMount, MountParams, PixelCoordinate, PixelGrid},
        config::Config,
        error::Error,
        estimator::{Estimator, GlitterParams, GlitterYawEstimator, Observation},
        filter::{SmoothedSample, Smoother, SmootherParams, par_smooth},
        georeference::{GeoFrame, ReferencePoints, georeference},
        image::IntensityImage,
        model::SolarModel,
        orientation::{NetOrientation, compose, compose_mount},
        output::{Capabilities, FrameWriter, GroundControlPoint, ImageRecord, OutputStage},
        pipeline::{ImageInput, Pipeline, ProcessedImage, YawSource},
        plane::{EnuOffset, lon_lat_to_metres, metres_to_lon_lat},
        projection::{DegeneratePolicy, PixelProjector, ProjectionParams},
        state::{Attitude, GeoPoint, GpsQuality, PlatformState, wrap_degrees},
        trajectory::Trajectory,
    };
}

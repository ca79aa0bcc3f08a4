//! Hand-off of georeferenced frames to external writers.
//!
//! Raster writers and the warp utility live outside this crate. Which of them
//! exist is declared once in [`Capabilities`] and injected into the
//! [`OutputStage`].

use crate::{
    camera::{CameraMount, PixelCoordinate},
    error::Error,
    georeference::{GeoFrame, ReferencePoints},
    pipeline::YawSource,
    state::{GeoPoint, PlatformState},
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uom::si::angle::degree;

/// Optional output collaborators available in this deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Capabilities {
    /// A writer for per-pixel lon/lat grids.
    pub grid_writer: bool,

    /// The external warp utility that resamples the image from control points.
    pub warp: bool,
}

/// A pixel tied to its ground position, for warping.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroundControlPoint {
    pub pixel: PixelCoordinate,
    pub point: GeoPoint,
}

/// Control points at the four corners of `frame`, skipping excluded corners.
pub fn ground_control_points(frame: &GeoFrame) -> Vec<GroundControlPoint> {
    let (last_row, last_col) = (frame.rows() - 1, frame.cols() - 1);
    let reference = frame.reference_points();
    [
        (reference.top_left, PixelCoordinate::new(0, 0)),
        (reference.top_right, PixelCoordinate::new(0, last_col)),
        (reference.bottom_left, PixelCoordinate::new(last_row, 0)),
        (reference.bottom_right, PixelCoordinate::new(last_row, last_col)),
    ]
    .into_iter()
    .filter_map(|(point, pixel)| point.map(|point| GroundControlPoint { pixel, point }))
    .collect()
}

/// Metadata written next to each georeferenced raster.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageRecord {
    pub source: String,
    pub state: PlatformState,
    pub mount: CameraMount,
    pub horizontal_fov_deg: f64,
    pub vertical_fov_deg: f64,
    pub aspect_ratio: f64,
    pub pixel_width: usize,
    pub pixel_height: usize,
    pub reference: ReferencePoints,
    pub yaw_source: YawSource,
}

impl ImageRecord {
    pub fn new(
        source: impl Into<String>,
        state: PlatformState,
        mount: CameraMount,
        frame: &GeoFrame,
        yaw_source: YawSource,
    ) -> Self {
        Self {
            source: source.into(),
            state,
            mount,
            horizontal_fov_deg: mount.horizontal_fov().get::<degree>(),
            vertical_fov_deg: mount.vertical_fov().get::<degree>(),
            aspect_ratio: mount.grid().aspect_ratio(),
            pixel_width: frame.cols(),
            pixel_height: frame.rows(),
            reference: *frame.reference_points(),
            yaw_source,
        }
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|err| Error::Output(err.to_string()))
    }
}

/// An external consumer of georeferenced frames.
pub trait FrameWriter: Send + Sync {
    fn write(
        &self,
        record: &ImageRecord,
        frame: &GeoFrame,
        control_points: &[GroundControlPoint],
    ) -> Result<(), Error>;
}

/// What [`OutputStage::emit`] handed to which collaborator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Emitted {
    pub grid: bool,
    pub warp: bool,
}

/// Routes frames to the writers the deployment has.
#[derive(Default)]
pub struct OutputStage {
    capabilities: Capabilities,
    grid_writer: Option<Box<dyn FrameWriter>>,
    warper: Option<Box<dyn FrameWriter>>,
}

impl OutputStage {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            grid_writer: None,
            warper: None,
        }
    }

    pub fn with_grid_writer(mut self, writer: impl FrameWriter + 'static) -> Self {
        self.grid_writer = Some(Box::new(writer));
        self
    }

    pub fn with_warper(mut self, warper: impl FrameWriter + 'static) -> Self {
        self.warper = Some(Box::new(warper));
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn enabled<'a>(
        &'a self,
        name: &str,
        enabled: bool,
        writer: &'a Option<Box<dyn FrameWriter>>,
    ) -> Option<&'a dyn FrameWriter> {
        match (enabled, writer) {
            (true, Some(writer)) => Some(writer.as_ref()),
            (true, None) => {
                log::warn!("{name} is enabled but no writer was attached");
                None
            }
            (false, _) => {
                log::info!("{name} is not available, skipping");
                None
            }
        }
    }

    /// Hand `frame` to every enabled collaborator.
    pub fn emit(&self, record: &ImageRecord, frame: &GeoFrame) -> Result<Emitted, Error> {
        let control_points = ground_control_points(frame);
        let mut emitted = Emitted::default();

        if let Some(writer) = self.enabled(
            "grid writer",
            self.capabilities.grid_writer,
            &self.grid_writer,
        ) {
            writer.write(record, frame, &control_points)?;
            emitted.grid = true;
        }

        if let Some(warper) = self.enabled("warp", self.capabilities.warp, &self.warper) {
            if control_points.len() < 4 {
                log::warn!(
                    "{}: only {} corners reach the ground, skipping warp",
                    record.source,
                    control_points.len()
                );
            } else {
                warper.write(record, frame, &control_points)?;
                emitted.warp = true;
            }
        }

        Ok(emitted)
    }
}

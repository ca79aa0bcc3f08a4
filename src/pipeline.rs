//! Batch processing of a mission: smoothing, optional glitter yaw, georeferencing, output.

use crate::{
    camera::{CameraMount, PixelGrid},
    config::Config,
    error::Error,
    estimator::{GlitterEstimate, GlitterYawEstimator},
    filter::{SmoothedSample, Smoother},
    georeference::{GeoFrame, georeference},
    image::IntensityImage,
    output::{Emitted, ImageRecord, OutputStage},
    projection::ProjectionParams,
    state::PlatformState,
    trajectory::Trajectory,
};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Where the yaw used for georeferencing came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum YawSource {
    #[default]
    Telemetry,
    Glitter,
}

/// One image and the platform state it was taken from.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageInput {
    pub name: String,
    pub state: PlatformState,
    /// Decoded pixels, needed only for glitter yaw and to size the grid.
    pub image: Option<IntensityImage>,
    pub capture_time: Option<DateTime<Utc>>,
}

impl ImageInput {
    pub fn new(name: impl Into<String>, state: PlatformState) -> Self {
        Self {
            name: name.into(),
            state,
            image: None,
            capture_time: None,
        }
    }

    /// Use the smoothed position of `sample`.
    pub fn from_sample(name: impl Into<String>, sample: &SmoothedSample) -> Self {
        Self::new(name, *sample.state())
    }

    pub fn with_image(mut self, image: IntensityImage, capture_time: DateTime<Utc>) -> Self {
        self.image = Some(image);
        self.capture_time = Some(capture_time);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProcessedImage {
    pub record: ImageRecord,
    pub frame: GeoFrame,
    pub glitter: Option<GlitterEstimate>,
    pub emitted: Emitted,
}

pub struct Pipeline {
    mount: CameraMount,
    projection: ProjectionParams,
    smoother: Smoother,
    glitter: Option<GlitterYawEstimator>,
    output: OutputStage,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let glitter = match config.enable_glitter {
            true => Some(GlitterYawEstimator::new(config.glitter)?),
            false => None,
        };

        Ok(Self {
            mount: CameraMount::try_from(config.mount)?,
            projection: config.projection,
            smoother: Smoother::new(&config.smoother)?,
            glitter,
            output: OutputStage::new(config.capabilities),
        })
    }

    /// Attach the output collaborators. The stage's capabilities replace the configured ones.
    pub fn with_output(self, output: OutputStage) -> Self {
        Self { output, ..self }
    }

    pub fn mount(&self) -> &CameraMount {
        &self.mount
    }

    /// Smooth the mission trajectory. A bad trajectory fails the whole pass.
    pub fn smooth(&self, trajectory: &Trajectory) -> Result<Vec<SmoothedSample>, Error> {
        self.smoother.smooth(trajectory)
    }

    fn glitter_yaw(&self, input: &ImageInput) -> Option<GlitterEstimate> {
        let estimator = self.glitter.as_ref()?;
        let (Some(image), Some(time)) = (&input.image, &input.capture_time) else {
            log::info!(
                "{}: no image or capture time, keeping telemetry yaw",
                input.name
            );
            return None;
        };

        match estimator.try_estimate(image, time, input.state.position()) {
            Ok(estimate) => Some(estimate),
            Err(err) => {
                log::info!("{}: {err}, keeping telemetry yaw", input.name);
                None
            }
        }
    }

    /// The mount resized to the decoded image, when there is one.
    fn mount_for(&self, input: &ImageInput) -> CameraMount {
        let grid = input
            .image
            .as_ref()
            .map(|image| image.dimensions())
            .and_then(|(cols, rows)| PixelGrid::new(cols as usize, rows as usize));

        match grid {
            Some(grid) if grid != self.mount.grid() => {
                log::debug!(
                    "{}: image is {}x{}, not the configured sensor size",
                    input.name,
                    grid.cols(),
                    grid.rows()
                );
                self.mount.with_grid(grid)
            }
            _ => self.mount,
        }
    }

    /// Georeference one image and hand it to the output stage.
    pub fn process(&self, input: &ImageInput) -> Result<ProcessedImage, Error> {
        // Fail before any image work when telemetry is incomplete.
        input.state.check_georeferenceable()?;

        let glitter = self.glitter_yaw(input);
        let (state, yaw_source) = match &glitter {
            Some(estimate) => (input.state.with_yaw(estimate.yaw()), YawSource::Glitter),
            None => (input.state, YawSource::Telemetry),
        };

        let mount = self.mount_for(input);
        let frame = georeference(&state, &mount, &self.projection)?;
        let record = ImageRecord::new(input.name.clone(), state, mount, &frame, yaw_source);
        let emitted = self.output.emit(&record, &frame)?;

        Ok(ProcessedImage {
            record,
            frame,
            glitter,
            emitted,
        })
    }

    /// Process images in parallel. A failed image is logged and does not stop the others.
    pub fn par_process(&self, inputs: &[ImageInput]) -> Vec<Result<ProcessedImage, Error>> {
        inputs
            .par_iter()
            .map(|input| {
                self.process(input).inspect_err(|err| {
                    log::warn!("skipping {}: {err}", input.name);
                })
            })
            .collect()
    }
}

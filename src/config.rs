use crate::{
    camera::MountParams,
    estimator::GlitterParams,
    filter::SmootherParams,
    output::Capabilities,
    projection::ProjectionParams,
};
#[cfg(feature = "serde")]
use crate::error::Error;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serde")]
use std::{fs, path::Path};

/// Everything a mission run needs besides its data.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    pub mount: MountParams,

    #[cfg_attr(feature = "serde", serde(default))]
    pub smoother: SmootherParams,

    #[cfg_attr(feature = "serde", serde(default))]
    pub projection: ProjectionParams,

    /// Replace telemetry yaw with the glitter estimate when one is found.
    #[cfg_attr(feature = "serde", serde(default))]
    pub enable_glitter: bool,

    #[cfg_attr(feature = "serde", serde(default))]
    pub glitter: GlitterParams,

    #[cfg_attr(feature = "serde", serde(default))]
    pub capabilities: Capabilities,
}

impl Config {
    /// Defaults for everything but the mount.
    pub fn new(mount: MountParams) -> Self {
        Self {
            mount,
            smoother: SmootherParams::default(),
            projection: ProjectionParams::default(),
            enable_glitter: false,
            glitter: GlitterParams::default(),
            capabilities: Capabilities::default(),
        }
    }

    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|err| Error::InvalidInput(format!("config: {err}")))
    }

    #[cfg(feature = "serde")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            Error::InvalidInput(format!("failed to read config {}: {err}", path.display()))
        })?;
        Self::from_json_str(&contents)
    }
}

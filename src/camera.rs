use crate::error::Error;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uom::si::{angle::degree, f64::Angle};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelCoordinate {
    row: usize,
    col: usize,
}

impl PixelCoordinate {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }
}

impl AsRef<PixelCoordinate> for PixelCoordinate {
    fn as_ref(&self) -> &PixelCoordinate {
        self
    }
}

/// Pixel dimensions of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelGrid {
    cols: usize,
    rows: usize,
}

impl PixelGrid {
    /// Returns `None` when either dimension is zero.
    pub fn new(cols: usize, rows: usize) -> Option<Self> {
        match cols > 0 && rows > 0 {
            true => Some(Self { cols, rows }),
            false => None,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn pixel_count(&self) -> usize {
        self.cols * self.rows
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.cols as f64 / self.rows as f64
    }

    pub fn contains_pixel(&self, coord: impl AsRef<PixelCoordinate>) -> bool {
        (0..self.rows).contains(&coord.as_ref().row())
            && (0..self.cols).contains(&coord.as_ref().col())
    }

    /// Row-major iterator over every pixel.
    pub fn pixels(&self) -> impl Iterator<Item = PixelCoordinate> + use<> {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| (0..cols).map(move |col| PixelCoordinate::new(row, col)))
    }

    pub(crate) fn index(&self, coord: impl AsRef<PixelCoordinate>) -> Option<usize> {
        match self.contains_pixel(&coord) {
            true => Some(coord.as_ref().row() * self.cols + coord.as_ref().col()),
            false => None,
        }
    }
}

/// Serializable camera-mount parameters.
///
/// Pitch and yaw offsets differ between airframes and have no default.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MountParams {
    /// Gimbal pitch: 0 looks at the horizon, -90 looks straight down.
    pub pitch_offset_deg: f64,

    /// Azimuthal offset of the optical axis from the platform's forward axis,
    /// clockwise.
    pub yaw_offset_deg: f64,

    #[cfg_attr(feature = "serde", serde(default = "MountParams::default_hfov"))]
    pub horizontal_fov_deg: f64,

    #[cfg_attr(feature = "serde", serde(default = "MountParams::default_cols"))]
    pub pixel_width: usize,

    #[cfg_attr(feature = "serde", serde(default = "MountParams::default_rows"))]
    pub pixel_height: usize,
}

impl MountParams {
    pub const DEFAULT_HORIZONTAL_FOV_DEG: f64 = 82.0;
    pub const DEFAULT_PIXEL_WIDTH: usize = 1600;
    pub const DEFAULT_PIXEL_HEIGHT: usize = 1300;

    /// Mount parameters with the default lens and sensor.
    pub fn with_offsets(pitch_offset_deg: f64, yaw_offset_deg: f64) -> Self {
        Self {
            pitch_offset_deg,
            yaw_offset_deg,
            horizontal_fov_deg: Self::DEFAULT_HORIZONTAL_FOV_DEG,
            pixel_width: Self::DEFAULT_PIXEL_WIDTH,
            pixel_height: Self::DEFAULT_PIXEL_HEIGHT,
        }
    }

    #[cfg(feature = "serde")]
    fn default_hfov() -> f64 {
        Self::DEFAULT_HORIZONTAL_FOV_DEG
    }

    #[cfg(feature = "serde")]
    fn default_cols() -> usize {
        Self::DEFAULT_PIXEL_WIDTH
    }

    #[cfg(feature = "serde")]
    fn default_rows() -> usize {
        Self::DEFAULT_PIXEL_HEIGHT
    }
}

/// Fixed orientation and optics of the camera relative to the platform body.
///
/// Shared read-only by every image of a mission.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CameraMount {
    pitch_offset: Angle,
    yaw_offset: Angle,
    horizontal_fov: Angle,
    grid: PixelGrid,
}

impl CameraMount {
    pub fn new(
        pitch_offset: Angle,
        yaw_offset: Angle,
        horizontal_fov: Angle,
        grid: PixelGrid,
    ) -> Result<Self, Error> {
        let fov = horizontal_fov.get::<degree>();
        if !(fov > 0.0 && fov < 180.0) {
            return Err(Error::InvalidInput(format!(
                "horizontal field of view {fov} deg is not between 0 and 180"
            )));
        }

        if !pitch_offset.get::<degree>().is_finite() || !yaw_offset.get::<degree>().is_finite() {
            return Err(Error::InvalidInput("mount offsets must be finite".into()));
        }

        Ok(Self {
            pitch_offset,
            yaw_offset,
            horizontal_fov,
            grid,
        })
    }

    pub fn pitch_offset(&self) -> Angle {
        self.pitch_offset
    }

    pub fn yaw_offset(&self) -> Angle {
        self.yaw_offset
    }

    pub fn horizontal_fov(&self) -> Angle {
        self.horizontal_fov
    }

    /// Vertical field of view derived from the grid's aspect ratio.
    pub fn vertical_fov(&self) -> Angle {
        self.horizontal_fov / self.grid.aspect_ratio()
    }

    pub fn grid(&self) -> PixelGrid {
        self.grid
    }

    /// Returns a copy for images whose decoded size differs from the configured sensor.
    pub fn with_grid(self, grid: PixelGrid) -> Self {
        Self { grid, ..self }
    }
}

impl TryFrom<MountParams> for CameraMount {
    type Error = Error;

    fn try_from(params: MountParams) -> Result<Self, Self::Error> {
        let grid = PixelGrid::new(params.pixel_width, params.pixel_height).ok_or_else(|| {
            Error::InvalidInput(format!(
                "pixel grid {}x{} has a zero dimension",
                params.pixel_width, params.pixel_height
            ))
        })?;

        CameraMount::new(
            Angle::new::<degree>(params.pitch_offset_deg),
            Angle::new::<degree>(params.yaw_offset_deg),
            Angle::new::<degree>(params.horizontal_fov_deg),
            grid,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn vertical_fov_follows_aspect_ratio() {
        let mount = CameraMount::try_from(MountParams::with_offsets(-90.0, 0.0)).unwrap();
        assert_relative_eq!(
            mount.vertical_fov().get::<degree>(),
            82.0 * 1300.0 / 1600.0,
            epsilon = 1e-12
        );
    }

    #[rstest]
    #[case(0.0, 1600, 1300)]
    #[case(180.0, 1600, 1300)]
    #[case(f64::NAN, 1600, 1300)]
    #[case(82.0, 0, 1300)]
    #[case(82.0, 1600, 0)]
    fn invalid_mounts_are_rejected(#[case] fov: f64, #[case] cols: usize, #[case] rows: usize) {
        let params = MountParams {
            horizontal_fov_deg: fov,
            pixel_width: cols,
            pixel_height: rows,
            ..MountParams::with_offsets(-30.0, 90.0)
        };
        assert!(CameraMount::try_from(params).is_err());
    }

    #[test]
    fn pixels_are_row_major() {
        let grid = PixelGrid::new(3, 2).unwrap();
        let pixels: Vec<_> = grid.pixels().collect();
        assert_eq!(pixels.len(), 6);
        assert_eq!(pixels[1], PixelCoordinate::new(0, 1));
        assert_eq!(pixels[3], PixelCoordinate::new(1, 0));
        assert_eq!(grid.index(PixelCoordinate::new(1, 2)), Some(5));
        assert_eq!(grid.index(PixelCoordinate::new(2, 0)), None);
    }
}

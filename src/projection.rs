//! Flat-ground projection of image pixels.
//!
//! Each pixel gets an equal-angle offset from the continuous image centre:
//!
//! ```text
//! horizontal = (col - (cols - 1) / 2) * hfov / cols
//! vertical   = (row - (rows - 1) / 2) * vfov / rows
//! ```
//!
//! Rows are in sensor scan order here: row 0 is the edge nearest the nadir
//! when the camera is pitched down. The georeference stage flips the raster
//! into display order.
//!
//! Mount pitch follows the gimbal convention (0 at the horizon, -90 straight
//! down), so the vertical off-nadir angle is `90 + pitch + vertical`. The
//! horizontal off-nadir angle is `roll + horizontal`. Ground distance is
//! `altitude * tan(off_nadir)`, then the (x, y) pair is rotated clockwise by
//! the net yaw into east/north.

use crate::{
    camera::{CameraMount, PixelCoordinate, PixelGrid},
    orientation::NetOrientation,
    plane::EnuOffset,
};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uom::si::{
    angle::{degree, radian},
    f64::{Angle, Length},
    length::meter,
};

/// What to do with pixels whose off-nadir angle reaches the limit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DegeneratePolicy {
    /// Leave the pixel out: NaN in rasters, `None` for single points.
    #[default]
    Exclude,

    /// Clamp the off-nadir angle to the limit.
    Clamp,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProjectionParams {
    /// Off-nadir magnitude treated as the horizon.
    pub max_off_nadir_deg: f64,
    pub degenerate_policy: DegeneratePolicy,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            max_off_nadir_deg: 85.0,
            degenerate_policy: DegeneratePolicy::Exclude,
        }
    }
}

/// The five canonical points of an image footprint.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Footprint<T> {
    pub centre: T,
    pub top_left: T,
    pub top_right: T,
    pub bottom_left: T,
    pub bottom_right: T,
}

impl<T> Footprint<T> {
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Footprint<U> {
        Footprint {
            centre: f(self.centre),
            top_left: f(self.top_left),
            top_right: f(self.top_right),
            bottom_left: f(self.bottom_left),
            bottom_right: f(self.bottom_right),
        }
    }

    /// Corners in top-left, top-right, bottom-left, bottom-right order.
    pub fn corners(&self) -> [&T; 4] {
        [
            &self.top_left,
            &self.top_right,
            &self.bottom_left,
            &self.bottom_right,
        ]
    }
}

/// East/north ground offsets for every pixel, row-major in scan order.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundOffsets {
    grid: PixelGrid,
    east: Vec<f64>,
    north: Vec<f64>,
    degenerate_pixels: usize,
}

impl GroundOffsets {
    pub fn grid(&self) -> PixelGrid {
        self.grid
    }

    /// East offsets in metres; NaN marks excluded pixels.
    pub fn east(&self) -> &[f64] {
        &self.east
    }

    /// North offsets in metres; NaN marks excluded pixels.
    pub fn north(&self) -> &[f64] {
        &self.north
    }

    /// Number of pixels that reached the off-nadir limit.
    pub fn degenerate_pixels(&self) -> usize {
        self.degenerate_pixels
    }

    pub fn get(&self, pixel: impl AsRef<PixelCoordinate>) -> Option<EnuOffset> {
        let index = self.grid.index(pixel)?;
        let (east, north) = (self.east[index], self.north[index]);
        match east.is_finite() && north.is_finite() {
            true => Some(EnuOffset::from_metres(east, north)),
            false => None,
        }
    }

    pub(crate) fn into_parts(self) -> (PixelGrid, Vec<f64>, Vec<f64>, usize) {
        (self.grid, self.east, self.north, self.degenerate_pixels)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelProjector {
    altitude_m: f64,
    roll_deg: f64,
    pitch_deg: f64,
    yaw_sin: f64,
    yaw_cos: f64,
    h_step_deg: f64,
    v_step_deg: f64,
    grid: PixelGrid,
    params: ProjectionParams,
}

impl PixelProjector {
    pub fn new(
        orientation: &NetOrientation,
        altitude: Length,
        horizontal_fov: Angle,
        aspect_ratio: f64,
        grid: PixelGrid,
        params: ProjectionParams,
    ) -> Self {
        let hfov = horizontal_fov.get::<degree>();
        let vfov = hfov / aspect_ratio;
        let (yaw_sin, yaw_cos) = orientation.yaw().get::<radian>().sin_cos();

        Self {
            altitude_m: altitude.get::<meter>(),
            roll_deg: orientation.roll().get::<degree>(),
            pitch_deg: orientation.pitch().get::<degree>(),
            yaw_sin,
            yaw_cos,
            h_step_deg: hfov / grid.cols() as f64,
            v_step_deg: vfov / grid.rows() as f64,
            grid,
            params,
        }
    }

    pub fn for_mount(
        orientation: &NetOrientation,
        altitude: Length,
        mount: &CameraMount,
        params: ProjectionParams,
    ) -> Self {
        Self::new(
            orientation,
            altitude,
            mount.horizontal_fov(),
            mount.grid().aspect_ratio(),
            mount.grid(),
            params,
        )
    }

    pub fn grid(&self) -> PixelGrid {
        self.grid
    }

    fn centre(&self) -> (f64, f64) {
        (
            (self.grid.rows() - 1) as f64 / 2.0,
            (self.grid.cols() - 1) as f64 / 2.0,
        )
    }

    /// Angular offset (horizontal, vertical) of a possibly fractional pixel
    /// position from the image centre.
    pub fn angular_offset(&self, row: f64, col: f64) -> (Angle, Angle) {
        let (centre_row, centre_col) = self.centre();
        (
            Angle::new::<degree>((col - centre_col) * self.h_step_deg),
            Angle::new::<degree>((row - centre_row) * self.v_step_deg),
        )
    }

    fn horizontal_off_nadir(&self, col: f64) -> f64 {
        self.roll_deg + (col - self.centre().1) * self.h_step_deg
    }

    fn vertical_off_nadir(&self, row: f64) -> f64 {
        90.0 + self.pitch_deg + (row - self.centre().0) * self.v_step_deg
    }

    /// Whether an off-nadir angle reaches the limit.
    /// NaN angles count as degenerate.
    fn is_degenerate(&self, off_nadir_deg: f64) -> bool {
        off_nadir_deg.is_nan() || off_nadir_deg.abs() >= self.params.max_off_nadir_deg
    }

    /// Flat-ground distance along one axis, or `None` if excluded.
    fn ground_distance(&self, off_nadir_deg: f64) -> Option<f64> {
        let limit = self.params.max_off_nadir_deg;
        if !off_nadir_deg.is_finite() || !self.altitude_m.is_finite() {
            return None;
        }

        let angle = match self.is_degenerate(off_nadir_deg) {
            false => off_nadir_deg,
            true => match self.params.degenerate_policy {
                DegeneratePolicy::Exclude => return None,
                DegeneratePolicy::Clamp => off_nadir_deg.clamp(-limit, limit),
            },
        };

        Some(self.altitude_m * angle.to_radians().tan())
    }

    #[inline]
    fn rotate(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.yaw_cos + y * self.yaw_sin,
            -x * self.yaw_sin + y * self.yaw_cos,
        )
    }

    /// Ground offset of a fractional scan-order pixel position.
    pub fn offset_at(&self, row: f64, col: f64) -> Option<EnuOffset> {
        let x = self.ground_distance(self.horizontal_off_nadir(col))?;
        let y = self.ground_distance(self.vertical_off_nadir(row))?;
        let (east, north) = self.rotate(x, y);
        Some(EnuOffset::from_metres(east, north))
    }

    /// Ground offset of a scan-order pixel.
    pub fn project_pixel(&self, pixel: impl AsRef<PixelCoordinate>) -> Option<EnuOffset> {
        if !self.grid.contains_pixel(&pixel) {
            return None;
        }

        self.offset_at(pixel.as_ref().row() as f64, pixel.as_ref().col() as f64)
    }

    /// Footprint named in display orientation, evaluated without building the raster.
    ///
    /// The display top edge is the last scan row.
    pub fn reference_offsets(&self) -> Footprint<Option<EnuOffset>> {
        let (centre_row, centre_col) = self.centre();
        let last_row = (self.grid.rows() - 1) as f64;
        let last_col = (self.grid.cols() - 1) as f64;

        Footprint {
            centre: self.offset_at(centre_row, centre_col),
            top_left: self.offset_at(last_row, 0.0),
            top_right: self.offset_at(last_row, last_col),
            bottom_left: self.offset_at(0.0, 0.0),
            bottom_right: self.offset_at(0.0, last_col),
        }
    }

    /// Ground offsets of every pixel in scan order.
    pub fn ground_offsets(&self) -> GroundOffsets {
        let (rows, cols) = (self.grid.rows(), self.grid.cols());

        // Off-nadir angles separate by axis.
        let x: Vec<Option<f64>> = (0..cols)
            .map(|col| self.ground_distance(self.horizontal_off_nadir(col as f64)))
            .collect();
        let y: Vec<Option<f64>> = (0..rows)
            .map(|row| self.ground_distance(self.vertical_off_nadir(row as f64)))
            .collect();

        // Counted for both policies so clamped pixels are reported too.
        let bad_cols = (0..cols)
            .filter(|&col| self.is_degenerate(self.horizontal_off_nadir(col as f64)))
            .count();
        let bad_rows = (0..rows)
            .filter(|&row| self.is_degenerate(self.vertical_off_nadir(row as f64)))
            .count();
        let degenerate_pixels = bad_cols * rows + bad_rows * cols - bad_cols * bad_rows;

        let mut east = vec![f64::NAN; rows * cols];
        let mut north = vec![f64::NAN; rows * cols];
        east.par_chunks_mut(cols)
            .zip(north.par_chunks_mut(cols))
            .zip(y.par_iter())
            .for_each(|((east_row, north_row), y)| {
                let Some(y) = *y else {
                    return;
                };

                for (col, x) in x.iter().enumerate() {
                    if let Some(x) = *x {
                        let (e, n) = self.rotate(x, y);
                        east_row[col] = e;
                        north_row[col] = n;
                    }
                }
            });

        GroundOffsets {
            grid: self.grid,
            east,
            north,
            degenerate_pixels,
        }
    }

    pub fn project(&self) -> (GroundOffsets, Footprint<Option<EnuOffset>>) {
        (self.ground_offsets(), self.reference_offsets())
    }
}

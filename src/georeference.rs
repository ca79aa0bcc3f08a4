use crate::{
    camera::{CameraMount, PixelCoordinate, PixelGrid},
    error::Error,
    orientation::{NetOrientation, compose_mount},
    plane::{PlaneScale, metres_to_lon_lat},
    projection::{DegeneratePolicy, Footprint, PixelProjector, ProjectionParams},
    state::{GeoPoint, PlatformState},
};
use rayon::prelude::*;

/// Ground positions of the centre and corners of an image, in display orientation.
pub type ReferencePoints = Footprint<Option<GeoPoint>>;

/// Per-pixel longitude/latitude of one image.
///
/// Rasters are row-major in display orientation: row 0 is the top edge of the
/// image as shown, columns run left to right. With the camera facing north
/// that is north-to-south rows and west-to-east columns. Excluded pixels hold
/// NaN.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoFrame {
    grid: PixelGrid,
    lons: Vec<f64>,
    lats: Vec<f64>,
    reference: ReferencePoints,
    orientation: NetOrientation,
    degenerate_pixels: usize,
}

impl GeoFrame {
    pub fn grid(&self) -> PixelGrid {
        self.grid
    }

    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    pub fn cols(&self) -> usize {
        self.grid.cols()
    }

    /// Longitudes in decimal degrees.
    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    /// Latitudes in decimal degrees.
    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn lon_lat(&self, pixel: impl AsRef<PixelCoordinate>) -> Option<GeoPoint> {
        let index = self.grid.index(pixel)?;
        let point = GeoPoint::from_degrees(self.lons[index], self.lats[index]);
        point.is_finite().then_some(point)
    }

    pub fn reference_points(&self) -> &ReferencePoints {
        &self.reference
    }

    /// Net camera orientation the frame was computed with.
    pub fn orientation(&self) -> NetOrientation {
        self.orientation
    }

    /// Pixels that reached the off-nadir limit, whether excluded or clamped.
    pub fn degenerate_pixels(&self) -> usize {
        self.degenerate_pixels
    }

    /// Position of the raster's geometric centre.
    ///
    /// For an even dimension this averages the two middle pixels on that axis.
    pub fn midpoint(&self) -> Option<GeoPoint> {
        fn middle(len: usize) -> Vec<usize> {
            match len % 2 {
                1 => vec![len / 2],
                _ => vec![len / 2 - 1, len / 2],
            }
        }

        let rows = middle(self.rows());
        let cols = middle(self.cols());
        let mut lon = 0.0;
        let mut lat = 0.0;
        for &row in &rows {
            for &col in &cols {
                let point = self.lon_lat(PixelCoordinate::new(row, col))?;
                lon += point.lon_deg();
                lat += point.lat_deg();
            }
        }

        let count = (rows.len() * cols.len()) as f64;
        Some(GeoPoint::from_degrees(lon / count, lat / count))
    }
}

/// Reverse the row order of a row-major raster in place.
fn flip_rows(values: &mut [f64], cols: usize) {
    let rows = values.len() / cols;
    for row in 0..rows / 2 {
        let (upper, lower) = values.split_at_mut((rows - 1 - row) * cols);
        upper[row * cols..(row + 1) * cols].swap_with_slice(&mut lower[..cols]);
    }
}

/// Georeference one image taken from `state` through `mount`.
///
/// Altitude is the field most often missing; callers should check it before
/// building inputs, but a non-finite altitude, position or attitude is still
/// rejected here with [`Error::MissingSensorData`].
pub fn georeference(
    state: &PlatformState,
    mount: &CameraMount,
    params: &ProjectionParams,
) -> Result<GeoFrame, Error> {
    state.check_georeferenceable()?;

    let orientation = compose_mount(&state.attitude(), mount);
    let projector = PixelProjector::for_mount(&orientation, state.altitude(), mount, *params);
    let origin = state.position();

    let reference = projector
        .reference_offsets()
        .map(|offset| offset.map(|offset| metres_to_lon_lat(offset, origin)));

    let (grid, mut lons, mut lats, degenerate_pixels) = projector.ground_offsets().into_parts();
    let action = match params.degenerate_policy {
        DegeneratePolicy::Exclude => "excluded",
        DegeneratePolicy::Clamp => "clamped",
    };

    if degenerate_pixels == grid.pixel_count()
        && params.degenerate_policy == DegeneratePolicy::Exclude
    {
        return Err(Error::DegenerateProjection {
            pixels: degenerate_pixels,
        });
    }

    if degenerate_pixels > 0 {
        log::warn!(
            "{degenerate_pixels} of {} pixels hit the off-nadir limit of {} deg and were {action}",
            grid.pixel_count(),
            params.max_off_nadir_deg,
        );
    }

    // Offsets become coordinates in place.
    let scale = PlaneScale::at(origin.lat_deg());
    let (origin_lon, origin_lat) = (origin.lon_deg(), origin.lat_deg());
    lons.par_iter_mut()
        .zip(lats.par_iter_mut())
        .for_each(|(east, north)| {
            let (d_lon, d_lat) = scale.to_degrees(*east, *north);
            *east = origin_lon + d_lon;
            *north = origin_lat + d_lat;
        });

    flip_rows(&mut lons, grid.cols());
    flip_rows(&mut lats, grid.cols());

    Ok(GeoFrame {
        grid,
        lons,
        lats,
        reference,
        orientation,
        degenerate_pixels,
    })
}

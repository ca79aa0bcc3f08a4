use crate::error::Error;
use image::{DynamicImage, GrayImage, ImageReader, imageops};
use rayon::prelude::*;
use std::{cmp::Reverse, collections::VecDeque, path::Path};

/// A single-channel 8-bit intensity image.
#[derive(Clone, Debug, PartialEq)]
pub struct IntensityImage {
    pixels: GrayImage,
}

impl IntensityImage {
    pub fn from_gray(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    /// Create an intensity image from row-major bytes.
    pub fn from_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, Error> {
        let expected = width as usize * height as usize;
        if bytes.len() != expected {
            return Err(Error::InvalidInput(format!(
                "expected {expected} bytes for a {width}x{height} image, got {}",
                bytes.len()
            )));
        }

        GrayImage::from_raw(width, height, bytes.to_vec())
            .map(Self::from_gray)
            .ok_or_else(|| Error::InvalidInput("image buffer is too small".into()))
    }

    /// Decode any supported format from disk and convert it to luma.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let unreadable = |err: &dyn std::fmt::Display| {
            Error::ImageUnreadable(format!("{}: {err}", path.display()))
        };

        let image = ImageReader::open(path)
            .map_err(|err| unreadable(&err))?
            .with_guessed_format()
            .map_err(|err| unreadable(&err))?
            .decode()
            .map_err(|err| unreadable(&err))?;

        Ok(Self::from(image))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn max_intensity(&self) -> u8 {
        self.pixels.as_raw().par_iter().copied().max().unwrap_or(0)
    }

    /// Gaussian blur with standard deviation `sigma` in pixels.
    pub fn blur(&self, sigma: f32) -> Self {
        Self::from_gray(imageops::blur(&self.pixels, sigma))
    }

    /// Mark pixels strictly brighter than `level`.
    pub fn threshold(&self, level: f64) -> Mask {
        let (width, height) = self.dimensions();
        Mask {
            width,
            height,
            bits: self
                .pixels
                .as_raw()
                .par_iter()
                .map(|&value| value as f64 > level)
                .collect(),
        }
    }
}

impl From<DynamicImage> for IntensityImage {
    fn from(image: DynamicImage) -> Self {
        Self::from_gray(image.into_luma8())
    }
}

impl From<GrayImage> for IntensityImage {
    fn from(pixels: GrayImage) -> Self {
        Self::from_gray(pixels)
    }
}

/// A binary image.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns `None` outside the image.
    pub fn get(&self, x: i64, y: i64) -> Option<bool> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }

        Some(self.bits[(y * self.width as i64 + x) as usize])
    }

    pub fn count(&self) -> usize {
        self.bits.par_iter().filter(|&&bit| bit).count()
    }

    /// Whether a set pixel touches an unset 4-neighbour.
    ///
    /// The image border is not an edge: a region cut by the border stays open there.
    fn is_boundary(&self, x: i64, y: i64) -> bool {
        self.get(x, y) == Some(true)
            && [(1, 0), (-1, 0), (0, 1), (0, -1)]
                .into_iter()
                .any(|(dx, dy)| self.get(x + dx, y + dy) == Some(false))
    }

    /// Boundary pixels as a mask.
    pub fn boundary(&self) -> Mask {
        let width = self.width as i64;
        let bits = (0..self.bits.len())
            .into_par_iter()
            .map(|index| {
                let index = index as i64;
                self.is_boundary(index % width, index / width)
            })
            .collect();

        Mask {
            width: self.width,
            height: self.height,
            bits,
        }
    }

    /// 8-connected groups of boundary pixels, largest first.
    pub fn contours(&self) -> Vec<Contour> {
        let edges = self.boundary();
        let width = self.width as i64;
        let mut visited = vec![false; edges.bits.len()];
        let mut contours = Vec::new();

        for start in 0..edges.bits.len() {
            if !edges.bits[start] || visited[start] {
                continue;
            }

            visited[start] = true;
            let mut queue = VecDeque::from([start]);
            let mut points = Vec::new();
            while let Some(index) = queue.pop_front() {
                let (x, y) = (index as i64 % width, index as i64 / width);
                points.push((x as u32, y as u32));

                for dy in -1..=1 {
                    for dx in -1..=1 {
                        if edges.get(x + dx, y + dy) != Some(true) {
                            continue;
                        }

                        let neighbour = ((y + dy) * width + x + dx) as usize;
                        if !visited[neighbour] {
                            visited[neighbour] = true;
                            queue.push_back(neighbour);
                        }
                    }
                }
            }

            contours.push(Contour { points });
        }

        contours.sort_by_key(|contour| Reverse(contour.len()));
        contours
    }
}

/// Connected boundary pixels of one bright region, as `(x, y)` image coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Contour {
    points: Vec<(u32, u32)>,
}

impl Contour {
    pub fn points(&self) -> &[(u32, u32)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn squares() -> IntensityImage {
        // A 6x6 bright square and a 2x2 one.
        IntensityImage::from_gray(GrayImage::from_fn(20, 12, |x, y| {
            let big = (2..8).contains(&x) && (3..9).contains(&y);
            let small = (14..16).contains(&x) && (5..7).contains(&y);
            Luma([if big || small { 220 } else { 10 }])
        }))
    }

    #[test]
    fn from_bytes_checks_length() {
        assert!(IntensityImage::from_bytes(4, 2, &[0; 8]).is_ok());
        assert!(matches!(
            IntensityImage::from_bytes(4, 2, &[0; 7]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn max_intensity() {
        assert_eq!(squares().max_intensity(), 220);
        assert_eq!(
            IntensityImage::from_gray(GrayImage::new(3, 3)).max_intensity(),
            0
        );
    }

    #[test]
    fn threshold_is_strict() {
        let mask = squares().threshold(220.0);
        assert_eq!(mask.count(), 0);
        assert_eq!(squares().threshold(219.0).count(), 36 + 4);
    }

    #[test]
    fn boundary_of_square_is_its_ring() {
        let boundary = squares().threshold(100.0).boundary();
        // 6x6 ring has 20 pixels, the 2x2 square is all boundary.
        assert_eq!(boundary.count(), 20 + 4);
        assert_eq!(boundary.get(4, 5), Some(false));
        assert_eq!(boundary.get(2, 3), Some(true));
    }

    #[test]
    fn contours_are_sorted_by_size() {
        let contours = squares().threshold(100.0).contours();
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].len(), 20);
        assert_eq!(contours[1].len(), 4);
        assert!(contours[0].points().contains(&(7, 8)));
    }

    #[test]
    fn full_mask_has_no_contour() {
        let image = IntensityImage::from_gray(GrayImage::from_pixel(8, 8, Luma([200])));
        assert!(image.threshold(100.0).contours().is_empty());
    }

    #[test]
    fn blur_spreads_light() {
        let image = IntensityImage::from_gray(GrayImage::from_fn(31, 31, |x, y| {
            Luma([if x == 15 && y == 15 { 255 } else { 0 }])
        }));
        let blurred = image.blur(2.0);
        assert!(blurred.max_intensity() < 255);
        assert!(blurred.as_gray().get_pixel(16, 15)[0] > 0);
    }

    #[test]
    fn missing_file_is_unreadable() {
        assert!(matches!(
            IntensityImage::open("does/not/exist.png"),
            Err(Error::ImageUnreadable(_))
        ));
    }
}

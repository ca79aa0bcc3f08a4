//! Least-squares ellipse fitting.

use nalgebra::{DMatrix, DVector, Matrix2, Vector2};

/// An ellipse in image coordinates (x right, y down).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipse {
    centre: (f64, f64),
    semi_major: f64,
    semi_minor: f64,
    /// Major-axis direction in degrees clockwise from image up, on [0, 180).
    angle: f64,
}

impl Ellipse {
    pub fn centre(&self) -> (f64, f64) {
        self.centre
    }

    pub fn semi_major(&self) -> f64 {
        self.semi_major
    }

    pub fn semi_minor(&self) -> f64 {
        self.semi_minor
    }

    /// Major-axis orientation in degrees clockwise from image up, on [0, 180).
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Fit the conic `Ax² + Bxy + Cy² + Dx + Ey = 1` to `points` by least squares.
    ///
    /// Points are centred and scaled before fitting. Returns `None` for fewer
    /// than five points or when the best conic is not an ellipse.
    pub fn fit(points: &[(f64, f64)]) -> Option<Self> {
        if points.len() < 5 {
            return None;
        }

        let n = points.len() as f64;
        let (mean_x, mean_y) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
        let (mean_x, mean_y) = (mean_x / n, mean_y / n);
        let scale = (points
            .iter()
            .map(|(x, y)| (x - mean_x).powi(2) + (y - mean_y).powi(2))
            .sum::<f64>()
            / n)
            .sqrt();
        if !scale.is_finite() || scale == 0.0 {
            return None;
        }

        let design = DMatrix::from_fn(points.len(), 5, |row, col| {
            let (x, y) = points[row];
            let (u, v) = ((x - mean_x) / scale, (y - mean_y) / scale);
            match col {
                0 => u * u,
                1 => u * v,
                2 => v * v,
                3 => u,
                _ => v,
            }
        });
        let ones = DVector::from_element(points.len(), 1.0);
        let svd = design.svd(true, true);
        // Collinear or repeated points leave the conic underdetermined.
        if svd.singular_values.min() <= 1e-9 * svd.singular_values.max() {
            return None;
        }

        let coeffs = svd.solve(&ones, 1e-12).ok()?;
        let (a, b, c, d, e) = (coeffs[0], coeffs[1], coeffs[2], coeffs[3], coeffs[4]);

        let quadratic = Matrix2::new(a, b / 2.0, b / 2.0, c);
        let linear = Vector2::new(d, e);
        let centre = -0.5 * quadratic.try_inverse()? * linear;

        // Translated to its centre the conic reads qᵀMq = k.
        let k = 1.0 + centre.dot(&(quadratic * centre));
        let eigen = quadratic.symmetric_eigen();
        let (l0, l1) = (eigen.eigenvalues[0] / k, eigen.eigenvalues[1] / k);
        if !(l0 > 0.0 && l1 > 0.0) {
            return None;
        }

        // The major axis has the smaller curvature.
        let (major, minor, axis) = match l0 <= l1 {
            true => (l0, l1, eigen.eigenvectors.column(0).into_owned()),
            false => (l1, l0, eigen.eigenvectors.column(1).into_owned()),
        };

        let angle = axis[0].atan2(-axis[1]).to_degrees().rem_euclid(180.0);
        Some(Self {
            centre: (mean_x + centre[0] * scale, mean_y + centre[1] * scale),
            semi_major: scale / major.sqrt(),
            semi_minor: scale / minor.sqrt(),
            angle: if angle >= 180.0 { 0.0 } else { angle },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    /// Points on an ellipse whose major axis is `angle` degrees clockwise from up.
    fn ellipse_points(
        centre: (f64, f64),
        semi_major: f64,
        semi_minor: f64,
        angle: f64,
        count: usize,
    ) -> Vec<(f64, f64)> {
        let (sin, cos) = angle.to_radians().sin_cos();
        // Major axis direction (sin, -cos), minor axis (cos, sin).
        (0..count)
            .map(|i| {
                let t = i as f64 * std::f64::consts::TAU / count as f64;
                let (along, across) = (semi_major * t.cos(), semi_minor * t.sin());
                (
                    centre.0 + along * sin + across * cos,
                    centre.1 - along * cos + across * sin,
                )
            })
            .collect()
    }

    #[rstest]
    #[case(0.0)]
    #[case(30.0)]
    #[case(90.0)]
    #[case(135.0)]
    #[case(179.0)]
    fn recovers_exact_ellipse(#[case] angle: f64) {
        let points = ellipse_points((320.0, 240.0), 150.0, 50.0, angle, 64);
        let ellipse = Ellipse::fit(&points).unwrap();

        assert_relative_eq!(ellipse.centre().0, 320.0, epsilon = 1e-6);
        assert_relative_eq!(ellipse.centre().1, 240.0, epsilon = 1e-6);
        assert_relative_eq!(ellipse.semi_major(), 150.0, epsilon = 1e-6);
        assert_relative_eq!(ellipse.semi_minor(), 50.0, epsilon = 1e-6);
        let error = (ellipse.angle() - angle).abs();
        assert!(error.min(180.0 - error) < 1e-6);
    }

    #[test]
    fn too_few_points() {
        assert_eq!(
            Ellipse::fit(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]),
            None
        );
    }

    #[test]
    fn collinear_points_are_not_an_ellipse() {
        let points: Vec<_> = (0..20).map(|i| (i as f64, 2.0 * i as f64)).collect();
        assert_eq!(Ellipse::fit(&points), None);
    }

    #[test]
    fn circle_has_equal_axes() {
        let points = ellipse_points((10.0, 10.0), 5.0, 5.0, 0.0, 32);
        let ellipse = Ellipse::fit(&points).unwrap();
        assert_relative_eq!(ellipse.semi_major(), 5.0, epsilon = 1e-6);
        assert_relative_eq!(ellipse.semi_minor(), 5.0, epsilon = 1e-6);
    }
}

//! Define a centroid (center of mass) representing
//! a star detection in an image.
//! Centroids are the output of the detection step; they are drawn by the
//! overlay renderer and handed (implicitly, through the image) to the solver.
//!

use crate::Matrix2;

#[derive(Debug, Clone, PartialEq)]
pub struct Centroid {
    /// Position along rows (image y-axis), in pixels.
    /// Origin is the top-left pixel; +row points down.
    pub row: f32,
    /// Position along columns (image x-axis), in pixels.
    /// Origin is the top-left pixel; +col points right.
    pub col: f32,
    /// Optional "brightness" value used for sorting (brighter = higher).
    pub mass: Option<f32>,
    /// Optional intensity-weighted covariance
    /// [[c_colcol, c_colrow], [c_colrow, c_rowrow]] in pixels².
    pub cov: Option<Matrix2>,
}

impl Centroid {
    /// A bare `(row, col)` position with no brightness or shape information.
    pub fn new(row: f32, col: f32) -> Self {
        Self {
            row,
            col,
            mass: None,
            cov: None,
        }
    }

    /// Whether the centroid lies inside a `width × height` image.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.row >= 0.0 && self.col >= 0.0 && self.row < height as f32 && self.col < width as f32
    }
}

impl From<(f32, f32)> for Centroid {
    fn from((row, col): (f32, f32)) -> Self {
        Centroid::new(row, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_is_row_then_col() {
        let c = Centroid::from((10.0, 20.0));
        assert_eq!(c.row, 10.0);
        assert_eq!(c.col, 20.0);
    }

    #[test]
    fn bounds_check() {
        assert!(Centroid::new(0.0, 0.0).is_within(100, 50));
        assert!(Centroid::new(49.5, 99.5).is_within(100, 50));
        assert!(!Centroid::new(50.0, 10.0).is_within(100, 50));
        assert!(!Centroid::new(-0.1, 10.0).is_within(100, 50));
    }
}

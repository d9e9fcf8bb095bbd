//! Dominant slope of a lane polyline.
//!
//! The slope is the arctangent of the least-squares fit `y = a * x + b` through the valid
//! points, in image coordinates (y grows downward). Lanes left of the image centre rise to
//! the right and therefore have a negative angle; lanes right of centre are positive.

use crate::polyline::Polyline;

/// Default minimum endpoint distance, in pixels, for a lane to be considered.
pub const DEFAULT_MIN_LINE_LENGTH: f64 = 90.0;

/// Result of classifying a polyline by slope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slope {
    /// Angle of the fitted line in radians, in `(-pi/2, pi/2)`.
    Angle(f64),
    /// First and last point are closer than the minimum line length.
    TooShort,
    /// Every point shares the same x coordinate, so `y = a * x + b` has no solution.
    Vertical,
}

impl Slope {
    /// The angle, if the polyline produced one.
    pub const fn angle(self) -> Option<f64> {
        match self {
            Self::Angle(angle) => Some(angle),
            Self::TooShort | Self::Vertical => None,
        }
    }
}

/// Classify a polyline by its dominant slope.
///
/// The endpoint distance is checked first, so short polylines are rejected regardless of
/// their intermediate shape. A perfectly vertical polyline yields [`Slope::Vertical`].
pub fn compute_slope(polyline: &Polyline, min_length: f64) -> Slope {
    let (Some(first), Some(last)) = (polyline.first(), polyline.last()) else {
        return Slope::TooShort;
    };

    let dx = f64::from(first.x) - f64::from(last.x);
    let dy = f64::from(first.y) - f64::from(last.y);
    if dx.hypot(dy) < min_length {
        return Slope::TooShort;
    }

    match fit_line(polyline) {
        Some(coefficient) => Slope::Angle(coefficient.atan()),
        None => Slope::Vertical,
    }
}

/// Least-squares slope coefficient of `y` on `x`.
fn fit_line(polyline: &Polyline) -> Option<f64> {
    let n = polyline.len() as f64;
    let (sum_x, sum_y) = polyline
        .points()
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + f64::from(p.x), sy + f64::from(p.y)));
    let mean_x = sum_x / n;
    let mean_y = sum_y / n;

    let (covariance, variance) = polyline.points().iter().fold((0.0, 0.0), |(cov, var), p| {
        let dx = f64::from(p.x) - mean_x;
        let dy = f64::from(p.y) - mean_y;
        (dx.mul_add(dy, cov), dx.mul_add(dx, var))
    });

    if variance == 0.0 {
        return None;
    }
    Some(covariance / variance)
}

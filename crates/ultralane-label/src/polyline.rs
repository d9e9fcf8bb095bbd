//! Lane polylines built from TuSimple row-sampled annotations.

use crate::error::{LabelError, LabelResult};

/// Sentinel x coordinate marking a row where the lane is not visible.
pub const INVALID_POINT: i32 = -2;

/// A pixel coordinate on a lane annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An ordered sequence of valid lane points, top to bottom in annotation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polyline {
    points: Vec<Point>,
}

impl Polyline {
    /// Create a polyline from already validated points.
    pub const fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Build a polyline from one TuSimple lane and the shared row samples.
    ///
    /// Points equal to [`INVALID_POINT`] are dropped. Returns `Ok(None)` when every point
    /// is invalid, since such a lane carries no geometry.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::LaneLengthMismatch`] if `xs` and `h_samples` differ in length.
    pub fn from_tusimple(lane: usize, xs: &[i32], h_samples: &[i32]) -> LabelResult<Option<Self>> {
        if xs.len() != h_samples.len() {
            return Err(LabelError::LaneLengthMismatch {
                lane,
                lane_len: xs.len(),
                samples: h_samples.len(),
            });
        }

        let points: Vec<Point> = xs
            .iter()
            .zip(h_samples)
            .filter(|(&x, _)| x != INVALID_POINT)
            .map(|(&x, &y)| Point::new(x, y))
            .collect();

        if points.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self { points }))
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// The point at index `len / 2`, used to anchor display labels.
    pub fn middle(&self) -> Option<Point> {
        self.points.get(self.points.len() / 2).copied()
    }

    /// Consecutive point pairs forming the drawn segments.
    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.points.windows(2).map(|pair| (pair[0], pair[1]))
    }
}

/// Build all non-empty polylines of a record, in annotation order.
///
/// # Errors
///
/// Fails on the first lane whose length differs from `h_samples`.
pub fn polylines_from_tusimple(lanes: &[Vec<i32>], h_samples: &[i32]) -> LabelResult<Vec<Polyline>> {
    let mut polylines = Vec::with_capacity(lanes.len());
    for (index, lane) in lanes.iter().enumerate() {
        match Polyline::from_tusimple(index, lane, h_samples)? {
            Some(polyline) => polylines.push(polyline),
            None => tracing::trace!(lane = index, "lane has no valid point, skipped"),
        }
    }
    Ok(polylines)
}

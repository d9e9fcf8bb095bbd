//! Segmentation mask rasterization.
//!
//! Each selected polyline is drawn as a chain of thick segments with round joins: a pixel
//! belongs to the stroke when its centre lies within half the stroke width of a segment.
//! Lanes are drawn in ordinal order, so overlapping strokes keep the later ordinal.

use ab_glyph::{FontVec, PxScale};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_text_mut;

use crate::{
    error::{LabelError, LabelResult},
    polyline::{Point, Polyline},
    selector::{LaneOrdinal, LaneSelection},
};

/// Default stroke width in pixels.
pub const DEFAULT_LINE_THICKNESS: u32 = 16;

/// Multiplier applied to ordinals in display mode so lanes are visible in an image viewer.
pub const DISPLAY_SCALE: u8 = 60;

const TEXT_OFFSET: i32 = 20;
const TEXT_SCALE: f32 = 24.0;

/// Draws lane polylines into single-channel masks.
pub struct LaneRasterizer {
    thickness: u32,
    display: bool,
    font: Option<FontVec>,
}

impl Default for LaneRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_THICKNESS)
    }
}

impl LaneRasterizer {
    pub const fn new(thickness: u32) -> Self {
        Self {
            thickness,
            display: false,
            font: None,
        }
    }

    /// Scale mask values by [`DISPLAY_SCALE`] and write ordinal text when a font is set.
    #[must_use]
    pub const fn with_display(mut self, display: bool) -> Self {
        self.display = display;
        self
    }

    /// Use the given TrueType/OpenType font data for display-mode ordinal labels.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::FontLoadFailed`] if the data is not a valid font.
    pub fn with_font_data(mut self, data: Vec<u8>) -> LabelResult<Self> {
        let font = FontVec::try_from_vec(data).map_err(|e| LabelError::FontLoadFailed {
            reason: e.to_string(),
        })?;
        self.font = Some(font);
        Ok(self)
    }

    pub const fn thickness(&self) -> u32 {
        self.thickness
    }

    pub const fn is_display(&self) -> bool {
        self.display
    }

    /// Mask value written for `ordinal`.
    pub const fn pixel_value(&self, ordinal: LaneOrdinal) -> u8 {
        if self.display {
            ordinal.value() * DISPLAY_SCALE
        } else {
            ordinal.value()
        }
    }

    /// Draw one polyline into `mask`.
    pub fn draw_lane(&self, mask: &mut GrayImage, polyline: &Polyline, ordinal: LaneOrdinal) {
        let value = self.pixel_value(ordinal);

        if self.display {
            if let (Some(font), Some(middle)) = (&self.font, polyline.middle()) {
                draw_text_mut(
                    mask,
                    Luma([u8::MAX]),
                    middle.x,
                    middle.y.saturating_sub(TEXT_OFFSET),
                    PxScale::from(TEXT_SCALE),
                    font,
                    &ordinal.value().to_string(),
                );
            }
        }

        for (start, end) in polyline.segments() {
            draw_thick_segment(mask, start, end, self.thickness, value);
        }
    }

    /// Rasterize every selected lane into a fresh `width` x `height` mask.
    pub fn rasterize(
        &self,
        polylines: &[Polyline],
        selection: &LaneSelection,
        width: u32,
        height: u32,
    ) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for &(ordinal, index) in selection.assignments() {
            if let Some(polyline) = polylines.get(index) {
                self.draw_lane(&mut mask, polyline, ordinal);
            }
        }
        mask
    }
}

/// Paint every pixel whose centre is within `thickness / 2` of the segment `start`-`end`.
pub fn draw_thick_segment(mask: &mut GrayImage, start: Point, end: Point, thickness: u32, value: u8) {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let radius = f64::from(thickness) / 2.0;
    let reach = radius.ceil() as i64;
    let x_min = (i64::from(start.x.min(end.x)) - reach).max(0);
    let x_max = (i64::from(start.x.max(end.x)) + reach).min(i64::from(width) - 1);
    let y_min = (i64::from(start.y.min(end.y)) - reach).max(0);
    let y_max = (i64::from(start.y.max(end.y)) + reach).min(i64::from(height) - 1);

    let radius_sq = radius * radius;
    for y in y_min..=y_max {
        for x in x_min..=x_max {
            if distance_sq_to_segment(x as f64, y as f64, start, end) <= radius_sq {
                mask.put_pixel(x as u32, y as u32, Luma([value]));
            }
        }
    }
}

fn distance_sq_to_segment(px: f64, py: f64, start: Point, end: Point) -> f64 {
    let (ax, ay) = (f64::from(start.x), f64::from(start.y));
    let (bx, by) = (f64::from(end.x), f64::from(end.y));
    let (dx, dy) = (bx - ax, by - ay);
    let length_sq = dx.mul_add(dx, dy * dy);

    let t = if length_sq == 0.0 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / length_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (t.mul_add(dx, ax), t.mul_add(dy, ay));
    (px - cx).mul_add(px - cx, (py - cy) * (py - cy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::select_polylines;

    fn polyline(points: &[(i32, i32)]) -> Polyline {
        Polyline::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn horizontal_stroke_fills_half_width_band() {
        let rasterizer = LaneRasterizer::new(16);
        let mut mask = GrayImage::new(400, 100);
        rasterizer.draw_lane(
            &mut mask,
            &polyline(&[(100, 50), (300, 50)]),
            LaneOrdinal::OuterLeft,
        );

        for y in 42..=58 {
            for x in 100..=300 {
                assert_eq!(mask.get_pixel(x, y).0[0], 1, "pixel ({x}, {y})");
            }
        }
        for x in 100..=300 {
            assert_eq!(mask.get_pixel(x, 41).0[0], 0);
            assert_eq!(mask.get_pixel(x, 59).0[0], 0);
        }
        // Nothing beyond the round caps.
        for y in 0..100 {
            assert_eq!(mask.get_pixel(91, y).0[0], 0);
            assert_eq!(mask.get_pixel(309, y).0[0], 0);
        }
        assert!(mask.pixels().all(|p| p.0[0] <= 1));
    }

    #[test]
    fn stroke_is_clipped_at_borders() {
        let mut mask = GrayImage::new(20, 20);
        draw_thick_segment(&mut mask, Point::new(-5, 0), Point::new(25, 0), 16, 3);
        assert_eq!(mask.get_pixel(0, 0).0[0], 3);
        assert_eq!(mask.get_pixel(19, 8).0[0], 3);
        assert_eq!(mask.get_pixel(10, 9).0[0], 0);
    }

    #[test]
    fn display_mode_scales_values() {
        let rasterizer = LaneRasterizer::default().with_display(true);
        assert_eq!(rasterizer.pixel_value(LaneOrdinal::OuterRight), 240);
        let rasterizer = LaneRasterizer::default();
        assert_eq!(rasterizer.pixel_value(LaneOrdinal::OuterRight), 4);
    }

    #[test]
    fn later_ordinal_wins_on_overlap() {
        let lanes = vec![
            polyline(&[(300, 100), (100, 300)]),
            polyline(&[(300, 100), (500, 300)]),
        ];
        let selection = select_polylines(&lanes, 90.0);
        let mask = LaneRasterizer::default().rasterize(&lanes, &selection, 600, 400);
        // Shared start point: right lane (ordinal 3) is drawn after the left lane (ordinal 2).
        assert_eq!(mask.get_pixel(300, 100).0[0], 3);
        assert_eq!(mask.get_pixel(150, 250).0[0], 2);
    }

    #[test]
    fn empty_selection_leaves_background() {
        let lanes = vec![polyline(&[(0, 0), (10, 10)])];
        let selection = select_polylines(&lanes, 90.0);
        let mask = LaneRasterizer::default().rasterize(&lanes, &selection, 32, 32);
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn invalid_font_data_is_rejected() {
        let result = LaneRasterizer::default().with_font_data(vec![0, 1, 2, 3]);
        assert!(matches!(result, Err(LabelError::FontLoadFailed { .. })));
    }
}

//! Rotation augmentation for image/mask pairs.
//!
//! The image and mask share one affine transform. Bilinear interpolation blends lane ids on
//! the mask at stroke edges (a lane 3 border can pick up values 1 or 2), so the rotated mask
//! is passed through [`refine_mask`], which keeps only the local maximum around every lane
//! pixel.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};

use crate::{
    error::{LabelError, LabelResult},
    selector::LaneOrdinal,
};

/// Default half-size of the refine window, in pixels.
pub const DEFAULT_REFINE_RADIUS: u32 = 3;

/// Rotation about a centre point, in degrees. Positive angles turn counter-clockwise on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    angle_degrees: f32,
    center: Option<(f32, f32)>,
    scale: f32,
}

impl Rotation {
    /// Rotation about the image centre at unit scale.
    pub const fn new(angle_degrees: f32) -> Self {
        Self {
            angle_degrees,
            center: None,
            scale: 1.0,
        }
    }

    #[must_use]
    pub const fn with_center(mut self, x: f32, y: f32) -> Self {
        self.center = Some((x, y));
        self
    }

    #[must_use]
    pub const fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub const fn angle_degrees(&self) -> f32 {
        self.angle_degrees
    }

    fn is_identity(&self) -> bool {
        self.angle_degrees == 0.0 && self.scale == 1.0
    }

    /// Centre used for an image of the given size; defaults to `(w / 2, h / 2)` in whole pixels.
    pub fn center_for(&self, width: u32, height: u32) -> (f32, f32) {
        self.center
            .unwrap_or(((width / 2) as f32, (height / 2) as f32))
    }

    /// Forward transform from source to rotated coordinates.
    pub fn projection(&self, width: u32, height: u32) -> Projection {
        let (cx, cy) = self.center_for(width, height);
        // imageproc rotates clockwise for positive angles in image coordinates.
        let theta = -self.angle_degrees.to_radians();
        Projection::translate(cx, cy)
            * Projection::rotate(theta)
            * Projection::scale(self.scale, self.scale)
            * Projection::translate(-cx, -cy)
    }

    /// Rotate a colour image with bilinear interpolation; uncovered pixels become black.
    pub fn apply_to_image(&self, image: &RgbImage) -> RgbImage {
        if self.is_identity() {
            return image.clone();
        }
        let projection = self.projection(image.width(), image.height());
        warp(image, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]))
    }

    /// Rotate a mask with bilinear interpolation. The result needs [`refine_mask`].
    pub fn apply_to_mask(&self, mask: &GrayImage) -> GrayImage {
        if self.is_identity() {
            return mask.clone();
        }
        let projection = self.projection(mask.width(), mask.height());
        warp(mask, &projection, Interpolation::Bilinear, Luma([0]))
    }
}

/// Remove interpolation bleed from a rotated lane mask.
///
/// For every input pixel holding a lane id, the window of `radius` pixels around it (clipped
/// to the image) is inspected on the input; every output pixel in that window whose input
/// value is below the window maximum is cleared. Reads always come from the input, so the
/// result does not depend on visiting order.
pub fn refine_mask(mask: &GrayImage, radius: u32) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut refined = mask.clone();

    for (x, y, pixel) in mask.enumerate_pixels() {
        if LaneOrdinal::from_value(pixel.0[0]).is_none() {
            continue;
        }

        let x0 = x.saturating_sub(radius);
        let x1 = x.saturating_add(radius).min(width - 1);
        let y0 = y.saturating_sub(radius);
        let y1 = y.saturating_add(radius).min(height - 1);

        let mut peak = 0u8;
        for wy in y0..=y1 {
            for wx in x0..=x1 {
                peak = peak.max(mask.get_pixel(wx, wy).0[0]);
            }
        }

        for wy in y0..=y1 {
            for wx in x0..=x1 {
                if mask.get_pixel(wx, wy).0[0] < peak {
                    refined.put_pixel(wx, wy, Luma([0]));
                }
            }
        }
    }

    refined
}

/// Rotate an image/mask pair and refine the mask.
///
/// # Errors
///
/// Returns [`LabelError::DimensionMismatch`] if the image and mask differ in size.
pub fn rotate_sample(
    image: &RgbImage,
    mask: &GrayImage,
    rotation: &Rotation,
    refine_radius: u32,
) -> LabelResult<(RgbImage, GrayImage)> {
    if image.dimensions() != mask.dimensions() {
        return Err(LabelError::DimensionMismatch {
            image_width: image.width(),
            image_height: image.height(),
            mask_width: mask.width(),
            mask_height: mask.height(),
        });
    }

    let rotated_image = rotation.apply_to_image(image);
    let rotated_mask = refine_mask(&rotation.apply_to_mask(mask), refine_radius);
    Ok((rotated_image, rotated_mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{polyline::Point, raster::draw_thick_segment};

    fn lane_mask() -> GrayImage {
        let mut mask = GrayImage::new(200, 120);
        draw_thick_segment(&mut mask, Point::new(40, 10), Point::new(20, 110), 8, 1);
        draw_thick_segment(&mut mask, Point::new(80, 10), Point::new(70, 110), 8, 2);
        draw_thick_segment(&mut mask, Point::new(120, 10), Point::new(130, 110), 8, 3);
        draw_thick_segment(&mut mask, Point::new(160, 10), Point::new(180, 110), 8, 4);
        mask
    }

    #[test]
    fn zero_rotation_then_refine_is_identity() {
        let mask = lane_mask();
        let rotated = Rotation::new(0.0).apply_to_mask(&mask);
        let refined = refine_mask(&rotated, DEFAULT_REFINE_RADIUS);
        assert_eq!(refined, mask);
    }

    #[test]
    fn rotated_mask_contains_only_lane_classes_after_refine() {
        let mask = lane_mask();
        let rotated = Rotation::new(7.0).apply_to_mask(&mask);
        let refined = refine_mask(&rotated, DEFAULT_REFINE_RADIUS);
        assert!(refined.pixels().all(|p| p.0[0] <= 4));
        for value in 1..=4u8 {
            assert!(refined.pixels().any(|p| p.0[0] == value), "lane {value} lost");
        }
    }

    #[test]
    fn refine_suppresses_lower_neighbours() {
        let mut mask = GrayImage::new(10, 10);
        mask.put_pixel(5, 5, Luma([3]));
        mask.put_pixel(6, 5, Luma([1]));
        mask.put_pixel(9, 9, Luma([2]));

        let refined = refine_mask(&mask, 3);
        assert_eq!(refined.get_pixel(5, 5).0[0], 3);
        assert_eq!(refined.get_pixel(6, 5).0[0], 0);
        // Isolated lane pixel in the corner survives with a clipped window.
        assert_eq!(refined.get_pixel(9, 9).0[0], 2);
    }

    #[test]
    fn refine_window_is_clipped_at_origin() {
        let mut mask = GrayImage::new(4, 4);
        mask.put_pixel(0, 0, Luma([1]));
        mask.put_pixel(3, 3, Luma([4]));
        let refined = refine_mask(&mask, 3);
        assert_eq!(refined.get_pixel(0, 0).0[0], 0);
        assert_eq!(refined.get_pixel(3, 3).0[0], 4);
    }

    #[test]
    fn positive_angle_turns_counter_clockwise() {
        let mut mask = GrayImage::new(101, 101);
        // A pixel block to the right of centre.
        for y in 48..=52 {
            for x in 88..=92 {
                mask.put_pixel(x, y, Luma([4]));
            }
        }
        let rotated = Rotation::new(90.0).apply_to_mask(&mask);
        // Counter-clockwise on screen moves it above the centre.
        assert!(rotated.get_pixel(50, 10).0[0] > 0);
        assert_eq!(rotated.get_pixel(50, 90).0[0], 0);
    }

    #[test]
    fn rotate_sample_checks_dimensions() {
        let image = RgbImage::new(10, 10);
        let mask = GrayImage::new(10, 12);
        let result = rotate_sample(&image, &mask, &Rotation::new(5.0), 3);
        assert!(matches!(result, Err(LabelError::DimensionMismatch { .. })));
    }

    #[test]
    fn default_center_uses_whole_pixels() {
        assert_eq!(Rotation::new(4.0).center_for(1281, 721), (640.0, 360.0));
        assert_eq!(
            Rotation::new(4.0).with_center(1.5, 2.5).center_for(10, 10),
            (1.5, 2.5)
        );
    }
}

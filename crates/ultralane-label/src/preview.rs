//! Human-readable renderings of generated labels.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

use crate::{
    cls_label::{ClsLabel, RowEncoder},
    error::{LabelError, LabelResult},
    selector::LaneOrdinal,
};

const MARKER_RADIUS: i32 = 5;

/// Colour used for each lane ordinal in previews.
pub const fn lane_color(ordinal: LaneOrdinal) -> Rgb<u8> {
    match ordinal {
        LaneOrdinal::OuterLeft => Rgb([255, 64, 64]),
        LaneOrdinal::InnerLeft => Rgb([255, 192, 0]),
        LaneOrdinal::InnerRight => Rgb([64, 160, 255]),
        LaneOrdinal::OuterRight => Rgb([64, 255, 128]),
    }
}

/// Draw the cell centres of a row encoding onto a copy of `image`.
///
/// Each present lane is marked with a dot at its cell centre on every anchor row; absent
/// cells draw nothing.
pub fn render_cls_label(label: &ClsLabel, encoder: &RowEncoder, image: &RgbImage) -> RgbImage {
    let mut canvas = image.clone();
    let width = image.width();

    for (row, &anchor) in encoder.row_anchors().iter().enumerate().take(label.rows()) {
        for ordinal in LaneOrdinal::ALL {
            let Some(x) = label
                .get(row, ordinal)
                .and_then(|cell| encoder.cell_center(cell, width))
            else {
                continue;
            };
            draw_filled_circle_mut(
                &mut canvas,
                (x.round() as i32, anchor as i32),
                MARKER_RADIUS,
                lane_color(ordinal),
            );
        }
    }
    canvas
}

/// Colour a lane mask for viewing. Background stays black.
pub fn colorize_mask(mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        LaneOrdinal::from_value(mask.get_pixel(x, y).0[0]).map_or(Rgb([0, 0, 0]), lane_color)
    })
}

/// Blend a coloured mask over `image` with the given mask opacity in `[0, 1]`.
///
/// # Errors
///
/// Returns [`LabelError::DimensionMismatch`] if the image and mask differ in size.
pub fn overlay_mask(image: &RgbImage, mask: &GrayImage, opacity: f32) -> LabelResult<RgbImage> {
    if image.dimensions() != mask.dimensions() {
        return Err(LabelError::DimensionMismatch {
            image_width: image.width(),
            image_height: image.height(),
            mask_width: mask.width(),
            mask_height: mask.height(),
        });
    }

    let colored = colorize_mask(mask);
    let mut canvas = image.clone();
    for ((out, lane), value) in canvas
        .pixels_mut()
        .zip(colored.pixels())
        .zip(mask.pixels())
    {
        if value.0[0] == 0 {
            continue;
        }
        for (channel, &tint) in out.0.iter_mut().zip(&lane.0) {
            let blended = f32::from(*channel).mul_add(1.0 - opacity, f32::from(tint) * opacity);
            *channel = blended.clamp(0.0, 255.0) as u8;
        }
    }
    Ok(canvas)
}

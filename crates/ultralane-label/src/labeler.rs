//! Per-sample label synthesis: slope filtering, lane selection and rasterization.

use image::{GrayImage, RgbImage};

use crate::{
    augmentation::{rotate_sample, Rotation, DEFAULT_REFINE_RADIUS},
    cls_label::{ClsLabel, RowEncoder},
    error::{LabelError, LabelResult},
    polyline::Polyline,
    raster::LaneRasterizer,
    selector::{select_polylines, LaneSelection, PresenceVector},
    slope::DEFAULT_MIN_LINE_LENGTH,
};

/// Mask and lane bookkeeping produced for one annotated image.
#[derive(Debug, Clone)]
pub struct LabelSample {
    pub mask: GrayImage,
    pub selection: LaneSelection,
}

impl LabelSample {
    pub const fn presence(&self) -> PresenceVector {
        self.selection.presence()
    }
}

/// Turns polylines into masks and row encodings with a fixed set of parameters.
pub struct LaneLabeler {
    min_line_length: f64,
    rasterizer: LaneRasterizer,
    encoder: RowEncoder,
    refine_radius: u32,
}

impl Default for LaneLabeler {
    fn default() -> Self {
        Self {
            min_line_length: DEFAULT_MIN_LINE_LENGTH,
            rasterizer: LaneRasterizer::default(),
            encoder: RowEncoder::default(),
            refine_radius: DEFAULT_REFINE_RADIUS,
        }
    }
}

impl LaneLabeler {
    pub const fn new(
        min_line_length: f64,
        rasterizer: LaneRasterizer,
        encoder: RowEncoder,
        refine_radius: u32,
    ) -> Self {
        Self {
            min_line_length,
            rasterizer,
            encoder,
            refine_radius,
        }
    }

    pub const fn encoder(&self) -> &RowEncoder {
        &self.encoder
    }

    pub const fn rasterizer(&self) -> &LaneRasterizer {
        &self.rasterizer
    }

    /// Select lanes and rasterize them into a `width` x `height` mask.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::EmptySelection`] when no polyline has a usable slope.
    pub fn synthesize(
        &self,
        polylines: &[Polyline],
        width: u32,
        height: u32,
    ) -> LabelResult<LabelSample> {
        let selection = select_polylines(polylines, self.min_line_length);
        if selection.is_empty() {
            return Err(LabelError::EmptySelection {
                candidates: polylines.len(),
            });
        }

        let mask = self.rasterizer.rasterize(polylines, &selection, width, height);
        Ok(LabelSample { mask, selection })
    }

    /// Row encoding of `mask` for an image `width` pixels wide.
    pub fn encode(&self, mask: &GrayImage, width: u32) -> ClsLabel {
        self.encoder.encode(mask, width)
    }

    /// Rotate an image/mask pair and refine the rotated mask.
    ///
    /// # Errors
    ///
    /// Fails if the image and mask sizes differ.
    pub fn rotate(
        &self,
        image: &RgbImage,
        mask: &GrayImage,
        rotation: &Rotation,
    ) -> LabelResult<(RgbImage, GrayImage)> {
        rotate_sample(image, mask, rotation, self.refine_radius)
    }
}

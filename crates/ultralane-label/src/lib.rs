//! Label synthesis for row-anchor lane detection.
//!
//! Converts TuSimple polyline annotations into the three training targets of a row-based
//! lane head:
//!
//! - a segmentation mask whose pixel values are lane ordinals (1 to 4),
//! - a row-by-lane grid of horizontal cell indices ([`ClsLabel`]),
//! - a 4-bit presence vector ([`PresenceVector`]).
//!
//! ## Pipeline
//!
//! 1. [`compute_slope`] fits each polyline and rejects short or vertical ones.
//! 2. [`select_lanes`] keeps at most two lanes per side and assigns [`LaneOrdinal`]s.
//! 3. [`LaneRasterizer`] draws the selected lanes with a thick stroke.
//! 4. [`RowEncoder`] bins the mask at fixed anchor rows.
//! 5. [`Rotation`] and [`refine_mask`] produce consistent augmented copies.
//!
//! [`LaneLabeler`] bundles steps 1 to 5 behind one set of parameters.

mod augmentation;
mod cls_label;
mod error;
mod labeler;
mod polyline;
mod preview;
mod raster;
mod selector;
mod slope;

pub use augmentation::{refine_mask, rotate_sample, Rotation, DEFAULT_REFINE_RADIUS};
pub use cls_label::{
    tusimple_row_anchors, ClsLabel, RowEncoder, DEFAULT_NUM_CELLS, MAX_NUM_CELLS,
};
pub use error::{LabelError, LabelResult};
pub use labeler::{LabelSample, LaneLabeler};
pub use polyline::{polylines_from_tusimple, Point, Polyline, INVALID_POINT};
pub use preview::{colorize_mask, lane_color, overlay_mask, render_cls_label};
pub use raster::{draw_thick_segment, LaneRasterizer, DEFAULT_LINE_THICKNESS, DISPLAY_SCALE};
pub use selector::{
    select_lanes, select_polylines, LaneOrdinal, LaneSelection, PresenceVector, NUM_LANES,
};
pub use slope::{compute_slope, Slope, DEFAULT_MIN_LINE_LENGTH};

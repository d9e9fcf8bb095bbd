//! Loss functions for row-anchor lane detection.
//!
//! A row-anchor head predicts, for each anchor row and lane slot, logits over
//! `num_cells + 1` classes: the horizontal grid cells plus one "absent" class. The losses
//! here consume those logits as a `[batch, rows, lanes, cells]` tensor.
//!
//! - **[`FocalClsLoss`]**: focal negative log-likelihood at the target cell
//! - **[`SimilarityLoss`]**: smooth L1 between adjacent rows
//! - **[`StructuralLoss`]**: second difference of the expected lane column
//! - **[`LaneLoss`]**: weighted sum of the three
//!
//! Each loss follows Burn's `forward` / `forward_no_reduction` pattern.
//!
//! ```rust
//! use ultralane_loss::{LaneLoss, LaneLossConfig};
//!
//! let loss: LaneLoss = LaneLossConfig::new().with_similarity_weight(1.0).init();
//! ```

mod focal;
mod lane_loss;
mod similarity;
mod structural;

pub use focal::{FocalClsLoss, FocalClsLossConfig};
pub use lane_loss::{LaneLoss, LaneLossConfig};
pub use similarity::{SimilarityLoss, SimilarityLossConfig};
pub use structural::{StructuralLoss, StructuralLossConfig};

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    pub type TestBackend = NdArray;
}

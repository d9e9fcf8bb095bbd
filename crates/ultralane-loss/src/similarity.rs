//! Row similarity loss.
//!
//! Penalizes abrupt changes between the logits of adjacent anchor rows with a smooth L1
//! penalty:
//!
//! ```text
//! d_i = |x[:, i] - x[:, i + 1]|
//! l_i = 0.5 * d_i^2   if d_i < 1
//!       d_i - 0.5     otherwise
//! ```

use burn::{
    config::Config,
    module::{Content, DisplaySettings, Module, ModuleDisplay},
    nn::loss::Reduction,
    tensor::{backend::Backend, Tensor},
};

/// Configuration for creating a [row similarity loss](SimilarityLoss).
#[derive(Config, Debug)]
pub struct SimilarityLossConfig {
    /// Weight factor applied to the reduced loss. Default: 1.0
    #[config(default = 1.0)]
    pub weight: f64,
}

impl SimilarityLossConfig {
    /// Initialize [row similarity loss](SimilarityLoss).
    pub fn init(&self) -> SimilarityLoss {
        assert!(
            self.weight >= 0.0,
            "Weight for SimilarityLoss must be non-negative, got {}",
            self.weight
        );
        SimilarityLoss {
            weight: self.weight,
        }
    }
}

/// Smooth L1 penalty between adjacent-row logit distributions.
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct SimilarityLoss {
    /// Weight factor applied to the loss.
    pub weight: f64,
}

impl Default for SimilarityLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for SimilarityLoss {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content.add("weight", &self.weight).optional()
    }
}

impl SimilarityLoss {
    pub fn new() -> Self {
        SimilarityLossConfig::new().init()
    }

    /// Compute the criterion with reduction.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, rows, lanes, cells]`
    /// - output: `[1]`
    pub fn forward<B: Backend>(&self, logits: Tensor<B, 4>, reduction: Reduction) -> Tensor<B, 1> {
        let loss = self.forward_no_reduction(logits);
        let reduced = match reduction {
            Reduction::Mean | Reduction::Auto => loss.mean(),
            Reduction::Sum => loss.sum(),
        };
        reduced.mul_scalar(self.weight)
    }

    /// Compute the per-element penalty.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, rows, lanes, cells]`
    /// - output: `[batch_size, rows - 1, lanes, cells]`
    pub fn forward_no_reduction<B: Backend>(&self, logits: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, rows, _, _] = logits.dims();
        assert!(
            rows >= 2,
            "SimilarityLoss needs at least 2 rows, got {rows}"
        );

        let upper = logits.clone().narrow(1, 0, rows - 1);
        let lower = logits.narrow(1, 1, rows - 1);
        let diff = (upper - lower).abs();

        let quadratic = diff.clone().powf_scalar(2.0).mul_scalar(0.5);
        let linear = diff.clone().sub_scalar(0.5);
        linear.mask_where(diff.lower_elem(1.0), quadratic)
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::{cast::ToElement, TensorData};

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn identical_rows_have_zero_loss() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 4>::ones([2, 5, 4, 6], &device);
        let loss = SimilarityLoss::new().forward(logits, Reduction::Mean);
        assert_eq!(loss.into_scalar().to_f64(), 0.0);
    }

    #[test]
    fn smooth_l1_switches_at_one() {
        let device = Default::default();
        // Differences of 0.5 (quadratic) and 3.0 (linear).
        let logits = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![0.0f32, 0.0, 0.5, 3.0], [1, 2, 1, 2]),
            &device,
        );
        let loss = SimilarityLoss::new();

        let elements = loss.forward_no_reduction(logits.clone());
        assert_eq!(elements.dims(), [1, 1, 1, 2]);

        let mean = loss.forward(logits.clone(), Reduction::Mean).into_scalar().to_f64();
        assert!((mean - (0.125 + 2.5) / 2.0).abs() < 1e-6);

        let sum = loss.forward(logits, Reduction::Sum).into_scalar().to_f64();
        assert!((sum - 2.625).abs() < 1e-6);
    }

    #[test]
    fn weight_scales_the_result() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![0.0f32, 2.0], [1, 2, 1, 1]),
            &device,
        );
        let loss = SimilarityLossConfig::new().with_weight(2.0).init();
        let value = loss.forward(logits, Reduction::Mean).into_scalar().to_f64();
        assert!((value - 3.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic = "SimilarityLoss needs at least 2 rows"]
    fn single_row_panics() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 4>::zeros([1, 1, 4, 3], &device);
        let _ = SimilarityLoss::new().forward_no_reduction(logits);
    }

    #[test]
    fn display_shows_weight() {
        let loss = SimilarityLossConfig::new().with_weight(0.5).init();
        let display = format!("{loss}");
        assert!(display.contains("SimilarityLoss"));
        assert!(display.contains("weight: 0.5"));
    }
}

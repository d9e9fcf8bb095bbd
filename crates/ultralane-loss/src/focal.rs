//! Focal classification loss over row-anchor grid cells.
//!
//! For each (row, lane) entry the logits over `cells` classes are turned into a focal
//! negative log-likelihood at the target cell:
//!
//! ```text
//! p = softmax(x)
//! l = -(1 - p_t)^gamma * log(p_t)
//! ```
//!
//! The reduced loss averages only entries whose loss is strictly positive.

use burn::{
    config::Config,
    module::{Content, DisplaySettings, Module, ModuleDisplay},
    nn::loss::Reduction,
    tensor::{
        activation::{log_softmax, softmax},
        backend::Backend,
        Int, Tensor,
    },
};

/// Configuration for creating a [focal classification loss](FocalClsLoss).
#[derive(Config, Debug)]
pub struct FocalClsLossConfig {
    /// Focusing exponent. Default: 2.0
    #[config(default = 2.0)]
    pub gamma: f64,
    /// Weight factor applied to the reduced loss. Default: 1.0
    #[config(default = 1.0)]
    pub weight: f64,
}

impl FocalClsLossConfig {
    /// Initialize [focal classification loss](FocalClsLoss).
    pub fn init(&self) -> FocalClsLoss {
        self.assertions();
        FocalClsLoss {
            gamma: self.gamma,
            weight: self.weight,
        }
    }

    fn assertions(&self) {
        assert!(
            self.gamma >= 0.0,
            "Gamma for FocalClsLoss must be non-negative, got {}",
            self.gamma
        );
        assert!(
            self.weight >= 0.0,
            "Weight for FocalClsLoss must be non-negative, got {}",
            self.weight
        );
    }
}

/// Focal loss on the cell index of every (row, lane) entry.
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct FocalClsLoss {
    /// Focusing exponent.
    pub gamma: f64,
    /// Weight factor applied to the loss.
    pub weight: f64,
}

impl Default for FocalClsLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for FocalClsLoss {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("gamma", &self.gamma)
            .add("weight", &self.weight)
            .optional()
    }
}

impl FocalClsLoss {
    pub fn new() -> Self {
        FocalClsLossConfig::new().init()
    }

    /// Compute the criterion with reduction.
    ///
    /// `Mean` and `Auto` average over the positive entries only; when none are positive the
    /// result is zero.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, rows, lanes, cells]`
    /// - targets: `[batch_size, rows, lanes]`
    /// - output: `[1]`
    pub fn forward<B: Backend>(
        &self,
        logits: Tensor<B, 4>,
        targets: Tensor<B, 3, Int>,
        reduction: Reduction,
    ) -> Tensor<B, 1> {
        let loss = self.forward_no_reduction(logits, targets);
        let positive = loss.clone().greater_elem(0.0).float();
        let total = (loss * positive.clone()).sum();

        let reduced = match reduction {
            Reduction::Mean | Reduction::Auto => total / positive.sum().clamp_min(1.0),
            Reduction::Sum => total,
        };
        reduced.mul_scalar(self.weight)
    }

    /// Compute the focal loss of every entry.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, rows, lanes, cells]`
    /// - targets: `[batch_size, rows, lanes]`
    /// - output: `[batch_size, rows, lanes]`
    pub fn forward_no_reduction<B: Backend>(
        &self,
        logits: Tensor<B, 4>,
        targets: Tensor<B, 3, Int>,
    ) -> Tensor<B, 3> {
        Self::assertions(&logits, &targets);

        let factor = softmax(logits.clone(), 3)
            .neg()
            .add_scalar(1.0)
            .powf_scalar(self.gamma);
        let focal = (factor * log_softmax(logits, 3)).neg();

        focal
            .gather(3, targets.unsqueeze_dim::<4>(3))
            .squeeze::<3>(3)
    }

    fn assertions<B: Backend>(logits: &Tensor<B, 4>, targets: &Tensor<B, 3, Int>) {
        let [batch, rows, lanes, _] = logits.dims();
        let target_dims = targets.dims();
        assert_eq!(
            [batch, rows, lanes],
            target_dims,
            "Shape of logits ({:?}) must match targets ({:?}) on batch, rows and lanes",
            logits.dims(),
            target_dims
        );
    }
}

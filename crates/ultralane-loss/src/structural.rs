//! Lane shape (curvature) loss.
//!
//! The softmax over the grid cells of each row (the absent cell excluded) gives an expected
//! lane column:
//!
//! ```text
//! p   = softmax(x[..., 0:cells-1])
//! loc = sum_k p_k * k,  k = 1..cells-1
//! l_i = |(loc_i - loc_{i+1}) - (loc_{i+1} - loc_{i+2})|,  i = 0..rows/2
//! ```
//!
//! Only the first half of the anchor rows contribute, where lanes are closest to straight.

use burn::{
    config::Config,
    module::{Content, DisplaySettings, Module, ModuleDisplay},
    nn::loss::Reduction,
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
};

/// Configuration for creating a [structural loss](StructuralLoss).
#[derive(Config, Debug)]
pub struct StructuralLossConfig {
    /// Weight factor applied to the reduced loss. Default: 1.0
    #[config(default = 1.0)]
    pub weight: f64,
}

impl StructuralLossConfig {
    /// Initialize [structural loss](StructuralLoss).
    pub fn init(&self) -> StructuralLoss {
        assert!(
            self.weight >= 0.0,
            "Weight for StructuralLoss must be non-negative, got {}",
            self.weight
        );
        StructuralLoss {
            weight: self.weight,
        }
    }
}

/// Second-difference penalty on expected lane positions across rows.
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct StructuralLoss {
    /// Weight factor applied to the loss.
    pub weight: f64,
}

impl Default for StructuralLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for StructuralLoss {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content.add("weight", &self.weight).optional()
    }
}

impl StructuralLoss {
    pub fn new() -> Self {
        StructuralLossConfig::new().init()
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

    /// Compute the per-row curvature penalty.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, rows, lanes, cells]`
    /// - output: `[batch_size, rows / 2, lanes]`
    pub fn forward_no_reduction<B: Backend>(&self, logits: Tensor<B, 4>) -> Tensor<B, 3> {
        let [_, rows, _, cells] = logits.dims();
        assert!(
            rows >= 3,
            "StructuralLoss needs at least 3 rows, got {rows}"
        );
        assert!(
            cells >= 2,
            "StructuralLoss needs at least 2 cells, got {cells}"
        );

        let loc = Self::expected_location(logits);
        let windows = rows / 2;
        let first = loc.clone().narrow(1, 0, windows);
        let second = loc.clone().narrow(1, 1, windows);
        let third = loc.narrow(1, 2, windows);

        ((first - second.clone()) - (second - third)).abs()
    }

    /// Expected 1-based cell position per row and lane.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, rows, lanes, cells]`
    /// - output: `[batch_size, rows, lanes]`
    pub fn expected_location<B: Backend>(logits: Tensor<B, 4>) -> Tensor<B, 3> {
        let [_, _, _, cells] = logits.dims();
        let device = logits.device();
        let grid = cells - 1;

        let prob = softmax(logits.narrow(3, 0, grid), 3);
        let positions = Tensor::<B, 1, Int>::arange(1..cells as i64, &device)
            .float()
            .reshape([1, 1, 1, grid]);

        (prob * positions).sum_dim(3).squeeze::<3>(3)
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::{cast::ToElement, TensorData};

    use super::*;
    use crate::tests::TestBackend;

    /// Near one-hot logits placing each row at the given cell.
    fn peaked(cells_per_row: &[usize], cells: usize) -> Tensor<TestBackend, 4> {
        let rows = cells_per_row.len();
        let mut data = vec![0.0f32; rows * cells];
        for (row, &cell) in cells_per_row.iter().enumerate() {
            data[row * cells + cell] = 30.0;
        }
        Tensor::from_data(TensorData::new(data, [1, rows, 1, cells]), &Default::default())
    }

    #[test]
    fn straight_lane_has_no_curvature() {
        let logits = peaked(&[1, 2, 3, 4, 5, 6], 10);
        let loss = StructuralLoss::new().forward(logits, Reduction::Mean);
        assert!(loss.into_scalar().to_f64() < 1e-4);
    }

    #[test]
    fn bent_lane_is_penalized() {
        let logits = peaked(&[1, 2, 5, 5, 5, 5], 10);
        let elements = StructuralLoss::new().forward_no_reduction(logits);
        assert_eq!(elements.dims(), [1, 3, 1]);

        // Row windows: (1,2,5) -> |-1 - -3| = 2, (2,5,5) -> 3, (5,5,5) -> 0
        let values = elements.into_data().to_vec::<f32>().unwrap();
        assert!((values[0] - 2.0).abs() < 1e-3);
        assert!((values[1] - 3.0).abs() < 1e-3);
        assert!(values[2].abs() < 1e-3);
    }

    #[test]
    fn absent_cell_is_excluded_from_location() {
        let device = Default::default();
        // Cells: 3 grid cells + absent; the absent logit dominates but is ignored.
        let logits = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![0.0f32, 0.0, 0.0, 50.0], [1, 1, 1, 4]),
            &device,
        );
        let loc = StructuralLoss::expected_location(logits);
        let value = loc.into_scalar().to_f64();
        assert!((value - 2.0).abs() < 1e-5, "uniform over 1..=3 has mean 2, got {value}");
    }

    #[test]
    #[should_panic = "StructuralLoss needs at least 3 rows"]
    fn two_rows_panic() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 4>::zeros([1, 2, 4, 5], &device);
        let _ = StructuralLoss::new().forward_no_reduction(logits);
    }
}

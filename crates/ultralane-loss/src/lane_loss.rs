//! Weighted combination of the row-anchor losses used for training.

use std::collections::HashMap;

use burn::{
    nn::loss::Reduction,
    prelude::*,
    tensor::{cast::ToElement, Tensor},
};

use crate::{
    focal::{FocalClsLoss, FocalClsLossConfig},
    similarity::{SimilarityLoss, SimilarityLossConfig},
    structural::{StructuralLoss, StructuralLossConfig},
};

/// Configuration for the combined lane loss.
///
/// The similarity and structural terms are disabled by default; only the focal
/// classification term contributes unless their weights are raised.
#[derive(Config, Debug)]
pub struct LaneLossConfig {
    /// Weight of the focal classification term.
    #[config(default = "1.0")]
    pub cls_weight: f64,

    /// Weight of the adjacent-row similarity term.
    #[config(default = "0.0")]
    pub similarity_weight: f64,

    /// Weight of the curvature term.
    #[config(default = "0.0")]
    pub structural_weight: f64,

    /// Focusing exponent of the classification term.
    #[config(default = "2.0")]
    pub gamma: f64,
}

impl LaneLossConfig {
    /// Initialize the combined loss with the given configuration.
    pub fn init(&self) -> LaneLoss {
        LaneLoss {
            cls: FocalClsLossConfig::new()
                .with_gamma(self.gamma)
                .with_weight(self.cls_weight)
                .init(),
            similarity: SimilarityLossConfig::new()
                .with_weight(self.similarity_weight)
                .init(),
            structural: StructuralLossConfig::new()
                .with_weight(self.structural_weight)
                .init(),
        }
    }
}

/// Focal classification plus optional row similarity and curvature penalties.
#[derive(Module, Clone, Debug)]
pub struct LaneLoss {
    cls: FocalClsLoss,
    similarity: SimilarityLoss,
    structural: StructuralLoss,
}

impl Default for LaneLoss {
    fn default() -> Self {
        LaneLossConfig::new().init()
    }
}

impl LaneLoss {
    /// Total weighted loss.
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
    ) -> Tensor<B, 1> {
        let mut total = self
            .cls
            .forward(logits.clone(), targets, Reduction::Mean);

        if self.similarity.weight > 0.0 {
            total = total + self.similarity.forward(logits.clone(), Reduction::Mean);
        }
        if self.structural.weight > 0.0 {
            total = total + self.structural.forward(logits, Reduction::Mean);
        }
        total
    }

    /// Total loss plus each weighted term, for monitoring.
    ///
    /// Disabled terms are left out of the breakdown.
    pub fn forward_detailed<B: Backend>(
        &self,
        logits: Tensor<B, 4>,
        targets: Tensor<B, 3, Int>,
    ) -> (Tensor<B, 1>, HashMap<String, f64>) {
        let mut terms = HashMap::new();

        let cls = self
            .cls
            .forward(logits.clone(), targets, Reduction::Mean);
        terms.insert("cls".to_owned(), cls.clone().into_scalar().to_f64());
        let mut total = cls;

        if self.similarity.weight > 0.0 {
            let similarity = self.similarity.forward(logits.clone(), Reduction::Mean);
            terms.insert(
                "similarity".to_owned(),
                similarity.clone().into_scalar().to_f64(),
            );
            total = total + similarity;
        }
        if self.structural.weight > 0.0 {
            let structural = self.structural.forward(logits, Reduction::Mean);
            terms.insert(
                "structural".to_owned(),
                structural.clone().into_scalar().to_f64(),
            );
            total = total + structural;
        }

        terms.insert("total".to_owned(), total.clone().into_scalar().to_f64());
        (total, terms)
    }
}

//! Dataset generation and loading for row-anchor lane detection.
//!
//! - [`LabelPipeline`] converts a TuSimple dataset into image/mask/row-encoding files and a
//!   shuffled train/valid manifest, following a [`PipelineConfig`].
//! - [`ManifestDataset`] and [`LaneBatcher`] read a manifest back as Burn tensors.

pub mod config;
pub mod dataset;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod tusimple;

pub use config::PipelineConfig;
pub use dataset::{LaneBatch, LaneBatcher, LaneItem, ManifestDataset};
pub use error::{DatasetError, DatasetResult};
pub use manifest::{ManifestEntry, TRAIN_MANIFEST, VALID_MANIFEST};
pub use pipeline::{preview_record, LabelPipeline, PipelineSummary, RecordPreview};
pub use tusimple::TuSimpleRecord;

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    pub type TestBackend = NdArray;
}

//! Pipeline configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::config::Config;
use ultralane_label::{
    tusimple_row_anchors, LaneLabeler, LaneRasterizer, RowEncoder, DEFAULT_LINE_THICKNESS,
    DEFAULT_MIN_LINE_LENGTH, DEFAULT_NUM_CELLS, DEFAULT_REFINE_RADIUS,
};

use crate::error::{DatasetError, DatasetResult};

/// Every tunable of the label generation run.
///
/// Loaded from and saved to JSON via [`PipelineConfig::load`] and [`PipelineConfig::save`].
#[derive(Config, Debug)]
pub struct PipelineConfig {
    /// TuSimple root: holds the `*.json` annotation files and the images they reference.
    pub data_root: PathBuf,

    /// Directory receiving the generated samples and the split manifests.
    pub output_root: PathBuf,

    /// Subdirectory of `output_root` for sample files; also the prefix written in manifests.
    #[config(default = "String::from(\"train\")")]
    pub output_subdir: String,

    #[config(default = 720)]
    pub image_height: u32,

    #[config(default = 1280)]
    pub image_width: u32,

    /// Fraction of shuffled entries written to `train_files.txt`.
    #[config(default = 0.8)]
    pub train_ratio: f64,

    /// Polylines with a shorter endpoint distance are ignored.
    #[config(default = "DEFAULT_MIN_LINE_LENGTH")]
    pub min_line_length: f64,

    /// Write `-cls.png` row encodings and list them in the manifest.
    #[config(default = true)]
    pub build_cls_label: bool,

    /// Anchor rows (y coordinates) of the row encoding.
    #[config(default = "tusimple_row_anchors()")]
    pub row_anchors: Vec<u32>,

    /// Grid cells plus the trailing "absent" cell.
    #[config(default = "DEFAULT_NUM_CELLS")]
    pub num_cells: usize,

    #[config(default = "DEFAULT_LINE_THICKNESS")]
    pub line_thickness: u32,

    #[config(default = "DEFAULT_REFINE_RADIUS")]
    pub refine_radius: u32,

    /// Emit one rotated copy per sample.
    #[config(default = true)]
    pub rotation_enabled: bool,

    /// Inclusive range of rotation angles in whole degrees.
    #[config(default = 4)]
    pub rotation_min_degrees: i32,

    #[config(default = 9)]
    pub rotation_max_degrees: i32,

    /// Seed for rotation angles and the manifest shuffle. Random when unset.
    #[config(default = "None")]
    pub seed: Option<u64>,
}

impl PipelineConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> DatasetResult<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|e| DatasetError::FileReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&config_str).map_err(|e| DatasetError::ConfigParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Saves this configuration to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&self, path: impl AsRef<Path>) -> DatasetResult<()> {
        let path = path.as_ref();
        let config_str =
            serde_json::to_string_pretty(self).map_err(|e| DatasetError::ConfigParseFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        fs::write(path, config_str).map_err(|e| DatasetError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Check value ranges that the type system does not.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidConfiguration`] describing the first bad value.
    pub fn validate(&self) -> DatasetResult<()> {
        let invalid = |reason: String| Err(DatasetError::InvalidConfiguration { reason });

        if !(0.0..=1.0).contains(&self.train_ratio) {
            return invalid(format!(
                "train_ratio must be within [0, 1], got {}",
                self.train_ratio
            ));
        }
        if self.image_width == 0 || self.image_height == 0 {
            return invalid(format!(
                "image shape must be non-zero, got {}x{}",
                self.image_width, self.image_height
            ));
        }
        if let Some(&anchor) = self.row_anchors.iter().max() {
            if anchor >= self.image_height {
                return invalid(format!(
                    "row anchor {anchor} lies outside an image of height {}",
                    self.image_height
                ));
            }
        }
        if self.rotation_min_degrees > self.rotation_max_degrees {
            return invalid(format!(
                "rotation range is empty: [{}, {}]",
                self.rotation_min_degrees, self.rotation_max_degrees
            ));
        }
        if self.line_thickness == 0 {
            return invalid("line_thickness must be positive".to_string());
        }
        if self.output_subdir.is_empty() || self.output_subdir.contains(char::is_whitespace) {
            return invalid(format!(
                "output_subdir must be a non-empty name without whitespace, got {:?}",
                self.output_subdir
            ));
        }
        self.encoder()?;
        Ok(())
    }

    /// Row encoder for the configured anchors and cell count.
    ///
    /// # Errors
    ///
    /// Fails for an empty anchor list or an unsupported cell count.
    pub fn encoder(&self) -> DatasetResult<RowEncoder> {
        Ok(RowEncoder::new(self.row_anchors.clone(), self.num_cells)?)
    }

    /// Labeler built from the configured stroke, encoder and refine parameters.
    ///
    /// # Errors
    ///
    /// Fails when the encoder parameters are invalid.
    pub fn labeler(&self) -> DatasetResult<LaneLabeler> {
        Ok(LaneLabeler::new(
            self.min_line_length,
            LaneRasterizer::new(self.line_thickness),
            self.encoder()?,
            self.refine_radius,
        ))
    }

    /// Directory that receives sample files.
    pub fn sample_dir(&self) -> PathBuf {
        self.output_root.join(&self.output_subdir)
    }
}

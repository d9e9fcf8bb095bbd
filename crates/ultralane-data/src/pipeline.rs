//! TuSimple to row-anchor label conversion.
//!
//! [`LabelPipeline::run`] walks the annotation files directly under the dataset root, turns
//! every record into an image/mask/row-encoding triple (plus one rotated copy), and writes a
//! shuffled train/valid manifest. Records that cannot be labeled are logged and skipped;
//! failing to write output aborts the run.

use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use image::{GrayImage, RgbImage};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info, warn};
use ultralane_label::{
    overlay_mask, render_cls_label, LaneLabeler, LaneRasterizer, PresenceVector, Rotation,
};
use walkdir::WalkDir;

use crate::{
    config::PipelineConfig,
    error::{DatasetError, DatasetResult},
    manifest::{
        shuffle_entries, split_entries, write_manifest, ManifestEntry, TRAIN_MANIFEST,
        VALID_MANIFEST,
    },
    tusimple::{read_annotation_file, TuSimpleRecord},
};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub annotation_files: usize,
    /// Non-blank annotation lines seen.
    pub records: usize,
    pub skipped: usize,
    /// Manifest entries written (original and rotated samples).
    pub samples: usize,
    /// Row-encoding entries that were clamped or out of range.
    pub out_of_range: usize,
    pub train: usize,
    pub valid: usize,
}

/// One image/mask pair ready to be written.
struct SampleVariant {
    name: String,
    image: RgbImage,
    mask: GrayImage,
}

/// Drives label generation for a whole dataset.
pub struct LabelPipeline {
    config: PipelineConfig,
    labeler: LaneLabeler,
    rng: StdRng,
}

impl LabelPipeline {
    /// Validate `config` and prepare the labeler.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid.
    pub fn new(config: PipelineConfig) -> DatasetResult<Self> {
        config.validate()?;
        let labeler = config.labeler()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        debug!(seed, "pipeline random seed");

        Ok(Self {
            config,
            labeler,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Convert every annotation and write the split manifests.
    ///
    /// # Errors
    ///
    /// Fails if the dataset root or its annotation files are missing, or if any output file
    /// cannot be written. Per-record problems are logged and skipped.
    pub fn run(&mut self) -> DatasetResult<PipelineSummary> {
        let files = self.annotation_files()?;
        let sample_dir = self.config.sample_dir();
        fs::create_dir_all(&sample_dir).map_err(|e| DatasetError::WriteFailed {
            path: sample_dir.clone(),
            source: e,
        })?;

        let mut summary = PipelineSummary {
            annotation_files: files.len(),
            ..PipelineSummary::default()
        };
        let mut entries = Vec::new();

        for file in &files {
            info!(file = %file.display(), "processing annotation file");
            let records = match read_annotation_file(file) {
                Ok(records) => records,
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "skipping unreadable annotation file");
                    continue;
                }
            };

            for (line, parsed) in records {
                summary.records += 1;
                let record = match parsed {
                    Ok(record) => record,
                    Err(err) => {
                        warn!(error = %err, "skipping malformed annotation");
                        summary.skipped += 1;
                        continue;
                    }
                };

                let (variants, presence) = match self.label_record(&record) {
                    Ok(labeled) => labeled,
                    Err(err) => {
                        warn!(
                            file = %file.display(),
                            line,
                            raw_file = %record.raw_file,
                            error = %err,
                            "skipping record"
                        );
                        summary.skipped += 1;
                        continue;
                    }
                };

                for variant in &variants {
                    entries.push(self.write_sample(variant, presence, &mut summary)?);
                }
            }
        }

        summary.samples = entries.len();
        shuffle_entries(&mut entries, &mut self.rng);
        let (train, valid) = split_entries(&entries, self.config.train_ratio);
        write_manifest(&self.config.output_root.join(TRAIN_MANIFEST), &train)?;
        write_manifest(&self.config.output_root.join(VALID_MANIFEST), &valid)?;
        summary.train = train.len();
        summary.valid = valid.len();

        if summary.out_of_range > 0 {
            warn!(
                count = summary.out_of_range,
                "row encodings contained out-of-range cells"
            );
        }
        info!(
            records = summary.records,
            skipped = summary.skipped,
            samples = summary.samples,
            train = summary.train,
            valid = summary.valid,
            "label generation finished"
        );
        Ok(summary)
    }

    /// `*.json` files directly under the dataset root, sorted by name.
    ///
    /// # Errors
    ///
    /// Fails if the root is missing, cannot be listed or holds no annotation file.
    pub fn annotation_files(&self) -> DatasetResult<Vec<PathBuf>> {
        let root = &self.config.data_root;
        if !root.is_dir() {
            return Err(DatasetError::DatasetDirectoryNotFound { path: root.clone() });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| DatasetError::DirectoryReadFailed {
                path: root.clone(),
                source: e,
            })?;
            if entry.file_type().is_file() && entry.path().extension() == Some(OsStr::new("json"))
            {
                files.push(entry.into_path());
            }
        }

        if files.is_empty() {
            return Err(DatasetError::NoAnnotationFiles { path: root.clone() });
        }
        Ok(files)
    }

    /// Label one record: the original sample and, when enabled, a rotated copy.
    fn label_record(
        &mut self,
        record: &TuSimpleRecord,
    ) -> DatasetResult<(Vec<SampleVariant>, PresenceVector)> {
        let image_path = record.image_path(&self.config.data_root);
        let image = load_image(&image_path)?;
        self.check_shape(&image_path, &image)?;

        let polylines = record.polylines()?;
        let sample = self
            .labeler
            .synthesize(&polylines, image.width(), image.height())?;
        let presence = sample.presence();
        let name = record.sample_name();

        let mut variants = Vec::with_capacity(2);
        if self.config.rotation_enabled {
            let angle = self
                .rng
                .random_range(self.config.rotation_min_degrees..=self.config.rotation_max_degrees);
            let (rotated_image, rotated_mask) =
                self.labeler
                    .rotate(&image, &sample.mask, &Rotation::new(angle as f32))?;
            debug!(sample = %name, angle, "rotated copy");
            variants.push(SampleVariant {
                name: format!("{name}-rot"),
                image: rotated_image,
                mask: rotated_mask,
            });
        }
        variants.insert(
            0,
            SampleVariant {
                name,
                image,
                mask: sample.mask,
            },
        );

        Ok((variants, presence))
    }

    fn check_shape(&self, path: &Path, image: &RgbImage) -> DatasetResult<()> {
        let (width, height) = image.dimensions();
        if (width, height) != (self.config.image_width, self.config.image_height) {
            return Err(DatasetError::UnexpectedImageSize {
                path: path.to_path_buf(),
                width,
                height,
                expected_width: self.config.image_width,
                expected_height: self.config.image_height,
            });
        }
        Ok(())
    }

    /// Write one sample's files and return its manifest entry.
    fn write_sample(
        &self,
        variant: &SampleVariant,
        presence: PresenceVector,
        summary: &mut PipelineSummary,
    ) -> DatasetResult<ManifestEntry> {
        let subdir = &self.config.output_subdir;
        let sample_dir = self.config.sample_dir();
        let file_name = |suffix: &str| format!("{}-{suffix}.png", variant.name);

        let image_name = file_name("img");
        let mask_name = file_name("label");
        save_image(&variant.image, &sample_dir.join(&image_name))?;
        save_image(&variant.mask, &sample_dir.join(&mask_name))?;

        let cls = if self.config.build_cls_label {
            let label = self.labeler.encode(&variant.mask, variant.image.width());
            let out_of_range = label.out_of_range_count();
            if out_of_range > 0 {
                warn!(sample = %variant.name, count = out_of_range, "row encoding out of range");
                summary.out_of_range += out_of_range;
            }
            let cls_name = file_name("cls");
            save_image(&label.to_image(), &sample_dir.join(&cls_name))?;
            Some(format!("{subdir}/{cls_name}"))
        } else {
            None
        };

        debug!(sample = %variant.name, presence = %presence.digits(), "sample written");
        Ok(ManifestEntry {
            image: format!("{subdir}/{image_name}"),
            mask: format!("{subdir}/{mask_name}"),
            cls,
            presence,
        })
    }
}

/// Renderings of one record for visual inspection.
pub struct RecordPreview {
    /// Source image with the lane mask blended on top.
    pub overlay: RgbImage,
    /// Source image with the row encoding drawn as dots.
    pub cls: RgbImage,
    /// Mask with values scaled for viewing, ordinals written when a font is given.
    pub display_mask: GrayImage,
    pub presence: PresenceVector,
}

/// Label a single record without writing anything.
///
/// # Errors
///
/// Fails for the same per-record reasons [`LabelPipeline::run`] skips a record, or if the
/// font data is invalid.
pub fn preview_record(
    config: &PipelineConfig,
    record: &TuSimpleRecord,
    font: Option<Vec<u8>>,
) -> DatasetResult<RecordPreview> {
    let labeler = config.labeler()?;
    let image = load_image(&record.image_path(&config.data_root))?;
    let (width, height) = image.dimensions();

    let polylines = record.polylines()?;
    let sample = labeler.synthesize(&polylines, width, height)?;
    let label = labeler.encode(&sample.mask, width);

    let mut display = LaneRasterizer::new(config.line_thickness).with_display(true);
    if let Some(data) = font {
        display = display.with_font_data(data)?;
    }

    Ok(RecordPreview {
        overlay: overlay_mask(&image, &sample.mask, 0.6)?,
        cls: render_cls_label(&label, labeler.encoder(), &image),
        display_mask: display.rasterize(&polylines, &sample.selection, width, height),
        presence: sample.presence(),
    })
}

/// Open an image as 8-bit RGB.
///
/// # Errors
///
/// Returns [`DatasetError::ImageNotFound`] for a missing file and
/// [`DatasetError::ImageOpenFailed`] when decoding fails.
pub fn load_image(path: &Path) -> DatasetResult<RgbImage> {
    if !path.is_file() {
        return Err(DatasetError::ImageNotFound {
            path: path.to_path_buf(),
        });
    }
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|e| DatasetError::ImageOpenFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

fn save_image<P, C>(image: &image::ImageBuffer<P, C>, path: &Path) -> DatasetResult<()>
where
    P: image::Pixel + image::PixelWithColorType,
    [P::Subpixel]: image::EncodableLayout,
    C: std::ops::Deref<Target = [P::Subpixel]>,
{
    image.save(path).map_err(|e| DatasetError::ImageSaveFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

//! Burn dataset over a generated manifest.
//!
//! Each manifest entry becomes a [`LaneItem`] holding raw image pixels, the row encoding and
//! the presence vector. [`LaneBatcher`] turns items into normalized tensors shaped for the
//! losses in `ultralane-loss`.

use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Int, Tensor, TensorData},
};
use tracing::warn;
use ultralane_label::{ClsLabel, NUM_LANES};

use crate::{
    error::{DatasetError, DatasetResult},
    manifest::{read_manifest, ManifestEntry},
    pipeline::load_image,
};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// One sample loaded from disk.
#[derive(Debug, Clone)]
pub struct LaneItem {
    /// RGB pixels in `[0, 1]`, `[height, width, 3]` row-major.
    pub image: Vec<f32>,
    pub height: usize,
    pub width: usize,
    /// Cell index per anchor row and lane, `[rows, 4]` row-major.
    pub cls: Vec<i64>,
    pub rows: usize,
    /// Lane presence as 0/1 floats.
    pub presence: [f32; NUM_LANES],
}

/// Batched tensors for training.
#[derive(Debug, Clone)]
pub struct LaneBatch<B: Backend> {
    /// `[batch, 3, height, width]`, ImageNet-normalized.
    pub images: Tensor<B, 4>,
    /// `[batch, rows, 4]` cell indices.
    pub cls_targets: Tensor<B, 3, Int>,
    /// `[batch, 4]`
    pub presence: Tensor<B, 2>,
}

/// Converts [`LaneItem`]s into a [`LaneBatch`].
#[derive(Clone, Default)]
pub struct LaneBatcher<B: Backend> {
    _phantom: PhantomData<B>,
}

impl<B: Backend> LaneBatcher<B> {
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, LaneItem, LaneBatch<B>> for LaneBatcher<B> {
    fn batch(&self, items: Vec<LaneItem>, device: &B::Device) -> LaneBatch<B> {
        let batch_size = items.len();
        let mut images = Vec::with_capacity(batch_size);
        let mut cls_targets = Vec::with_capacity(batch_size);
        let mut presence = Vec::with_capacity(batch_size);

        let mean = Tensor::<B, 1>::from_floats(IMAGENET_MEAN, device).reshape([3, 1, 1]);
        let std = Tensor::<B, 1>::from_floats(IMAGENET_STD, device).reshape([3, 1, 1]);

        for item in items {
            let image = Tensor::<B, 3>::from_data(
                TensorData::new(item.image, [item.height, item.width, 3]),
                device,
            )
            .permute([2, 0, 1]);
            images.push((image - mean.clone()) / std.clone());

            cls_targets.push(Tensor::<B, 2, Int>::from_data(
                TensorData::new(item.cls, [item.rows, NUM_LANES]),
                device,
            ));
            presence.push(Tensor::<B, 1>::from_floats(item.presence, device));
        }

        LaneBatch {
            images: Tensor::stack(images, 0),
            cls_targets: Tensor::stack(cls_targets, 0),
            presence: Tensor::stack(presence, 0),
        }
    }
}

/// Samples listed in a manifest, resolved against the output root.
pub struct ManifestDataset {
    root: PathBuf,
    entries: Vec<ManifestEntry>,
    num_cells: usize,
}

impl ManifestDataset {
    /// Load `manifest`, whose paths are relative to `root`.
    ///
    /// # Errors
    ///
    /// Fails if the manifest cannot be read, or an entry has no row encoding.
    pub fn new(root: impl Into<PathBuf>, manifest: &Path, num_cells: usize) -> DatasetResult<Self> {
        let entries = read_manifest(manifest)?;
        if let Some(index) = entries.iter().position(|entry| entry.cls.is_none()) {
            return Err(DatasetError::MalformedManifest {
                line: index + 1,
                reason: "entry has no row encoding; regenerate with build_cls_label enabled"
                    .to_string(),
            });
        }

        Ok(Self {
            root: root.into(),
            entries,
            num_cells,
        })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    fn load(&self, entry: &ManifestEntry) -> DatasetResult<LaneItem> {
        let image = load_image(&entry.image_path(&self.root))?;
        let (width, height) = image.dimensions();

        let cls_path = entry
            .cls_path(&self.root)
            .ok_or_else(|| DatasetError::MalformedManifest {
                line: 0,
                reason: format!("{} has no row encoding", entry.image),
            })?;
        let cls_image = image::open(&cls_path)
            .map_err(|e| DatasetError::ImageOpenFailed {
                path: cls_path.clone(),
                source: e,
            })?
            .to_luma8();
        let label = ClsLabel::from_image(&cls_image, self.num_cells)?;

        Ok(LaneItem {
            image: image::DynamicImage::ImageRgb8(image).to_rgb32f().into_raw(),
            height: height as usize,
            width: width as usize,
            cls: label.as_slice().iter().map(|&cell| i64::from(cell)).collect(),
            rows: label.rows(),
            presence: entry.presence.bits().map(f32::from),
        })
    }
}

impl Dataset<LaneItem> for ManifestDataset {
    fn get(&self, index: usize) -> Option<LaneItem> {
        let entry = self.entries.get(index)?;
        match self.load(entry) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!(image = %entry.image, error = %err, "failed to load manifest sample");
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::cast::ToElement;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use ultralane_label::PresenceVector;

    use super::*;
    use crate::{
        manifest::{write_manifest, TRAIN_MANIFEST},
        tests::TestBackend,
    };

    fn write_sample(root: &Path, name: &str, cell: u8) -> ManifestEntry {
        let dir = root.join("train");
        std::fs::create_dir_all(&dir).unwrap();
        RgbImage::from_pixel(8, 6, Rgb([255, 128, 0]))
            .save(dir.join(format!("{name}-img.png")))
            .unwrap();
        GrayImage::new(8, 6)
            .save(dir.join(format!("{name}-label.png")))
            .unwrap();
        GrayImage::from_pixel(4, 3, Luma([cell]))
            .save(dir.join(format!("{name}-cls.png")))
            .unwrap();

        ManifestEntry {
            image: format!("train/{name}-img.png"),
            mask: format!("train/{name}-label.png"),
            cls: Some(format!("train/{name}-cls.png")),
            presence: PresenceVector::new([0, 1, 1, 0]),
        }
    }

    #[test]
    fn dataset_loads_manifest_samples() {
        let root = tempfile::tempdir().unwrap();
        let entries = vec![write_sample(root.path(), "a", 3), write_sample(root.path(), "b", 10)];
        let manifest = root.path().join(TRAIN_MANIFEST);
        write_manifest(&manifest, &entries).unwrap();

        let dataset = ManifestDataset::new(root.path(), &manifest, 11).unwrap();
        assert_eq!(dataset.len(), 2);

        let item = dataset.get(1).unwrap();
        assert_eq!((item.height, item.width, item.rows), (6, 8, 3));
        assert_eq!(item.image.len(), 6 * 8 * 3);
        assert!(item.cls.iter().all(|&cell| cell == 10));
        assert_eq!(item.presence, [0.0, 1.0, 1.0, 0.0]);
        assert!(dataset.get(2).is_none());
    }

    #[test]
    fn missing_files_yield_none() {
        let root = tempfile::tempdir().unwrap();
        let mut entry = write_sample(root.path(), "a", 1);
        entry.image = "train/missing-img.png".to_string();
        let manifest = root.path().join(TRAIN_MANIFEST);
        write_manifest(&manifest, &[entry]).unwrap();

        let dataset = ManifestDataset::new(root.path(), &manifest, 11).unwrap();
        assert!(dataset.get(0).is_none());
    }

    #[test]
    fn manifest_without_cls_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let mut entry = write_sample(root.path(), "a", 1);
        entry.cls = None;
        let manifest = root.path().join(TRAIN_MANIFEST);
        write_manifest(&manifest, &[entry]).unwrap();

        assert!(matches!(
            ManifestDataset::new(root.path(), &manifest, 11),
            Err(DatasetError::MalformedManifest { line: 1, .. })
        ));
    }

    #[test]
    fn batcher_creates_correct_batch_dimensions() {
        let device = Default::default();
        let batcher = LaneBatcher::<TestBackend>::new();
        let item = LaneItem {
            image: vec![0.485; 4 * 5 * 3],
            height: 4,
            width: 5,
            cls: (0..12).collect(),
            rows: 3,
            presence: [1.0, 0.0, 1.0, 1.0],
        };

        let batch = batcher.batch(vec![item.clone(), item], &device);
        assert_eq!(batch.images.dims(), [2, 3, 4, 5]);
        assert_eq!(batch.cls_targets.dims(), [2, 3, 4]);
        assert_eq!(batch.presence.dims(), [2, 4]);

        // Red channel equals its ImageNet mean, so it normalizes to zero.
        let red = batch.images.clone().narrow(1, 0, 1).abs().max().into_scalar();
        assert!(red.to_f64() < 1e-5);
        let last = batch.cls_targets.narrow(1, 2, 1).narrow(2, 3, 1).sum().into_scalar();
        assert_eq!(last.to_i64(), 22);
    }
}

//! Train/valid split manifests.
//!
//! A manifest is a text file with one sample per line:
//!
//! ```text
//! train/<name>-img.png train/<name>-label.png [train/<name>-cls.png] 0110
//! ```
//!
//! Paths are relative to the output root. The trailing field is the lane presence vector.

use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use rand::{seq::SliceRandom, Rng};
use ultralane_label::PresenceVector;

use crate::error::{DatasetError, DatasetResult};

pub const TRAIN_MANIFEST: &str = "train_files.txt";
pub const VALID_MANIFEST: &str = "valid_files.txt";

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub image: String,
    pub mask: String,
    /// Row encoding image; absent when cls labels were disabled.
    pub cls: Option<String>,
    pub presence: PresenceVector,
}

impl ManifestEntry {
    /// Resolve the entry's image path against the manifest's root directory.
    pub fn image_path(&self, root: &Path) -> PathBuf {
        root.join(&self.image)
    }

    pub fn mask_path(&self, root: &Path) -> PathBuf {
        root.join(&self.mask)
    }

    pub fn cls_path(&self, root: &Path) -> Option<PathBuf> {
        self.cls.as_ref().map(|cls| root.join(cls))
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.image, self.mask)?;
        if let Some(cls) = &self.cls {
            write!(f, " {cls}")?;
        }
        write!(f, " {}", self.presence.digits())
    }
}

impl FromStr for ManifestEntry {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (image, mask, cls, digits) = match fields.as_slice() {
            [image, mask, digits] => (image, mask, None, digits),
            [image, mask, cls, digits] => (image, mask, Some((*cls).to_string()), digits),
            _ => return Err(format!("expected 3 or 4 fields, got {}", fields.len())),
        };
        let presence = PresenceVector::from_digits(digits)
            .ok_or_else(|| format!("invalid presence digits {digits:?}"))?;

        Ok(Self {
            image: (*image).to_string(),
            mask: (*mask).to_string(),
            cls,
            presence,
        })
    }
}

/// Shuffle entries in place.
pub fn shuffle_entries<T, R: Rng + ?Sized>(entries: &mut [T], rng: &mut R) {
    entries.shuffle(rng);
}

/// Split already-shuffled entries into train and valid sets.
///
/// `train` holds the first `ceil(len * ratio)` entries. `valid` starts one entry later, so
/// the entry right after the train range belongs to neither set. Existing split files were
/// produced this way and stay reproducible.
pub fn split_entries<T: Clone>(entries: &[T], ratio: f64) -> (Vec<T>, Vec<T>) {
    let train_len = train_len(entries.len(), ratio);
    let valid_start = (train_len + 1).min(entries.len());
    (
        entries[..train_len].to_vec(),
        entries[valid_start..].to_vec(),
    )
}

/// Number of entries in the train split.
pub fn train_len(total: usize, ratio: f64) -> usize {
    let len = (total as f64 * ratio.clamp(0.0, 1.0)).ceil() as usize;
    len.min(total)
}

/// Write entries one per line.
///
/// # Errors
///
/// Returns [`DatasetError::WriteFailed`] if the file cannot be written.
pub fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> DatasetResult<()> {
    let content: String = entries.iter().map(|entry| format!("{entry}\n")).collect();
    fs::write(path, content).map_err(|e| DatasetError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read a manifest written by [`write_manifest`]. Blank lines are ignored.
///
/// # Errors
///
/// Fails if the file cannot be read or a line is malformed.
pub fn read_manifest(path: &Path) -> DatasetResult<Vec<ManifestEntry>> {
    let content = fs::read_to_string(path).map_err(|e| DatasetError::FileReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            line.parse()
                .map_err(|reason| DatasetError::MalformedManifest {
                    line: index + 1,
                    reason,
                })
        })
        .collect()
}

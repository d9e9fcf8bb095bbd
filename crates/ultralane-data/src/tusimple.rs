//! TuSimple annotation records.
//!
//! Each annotation file is JSON Lines; every line describes one frame:
//!
//! ```json
//! {"lanes": [[-2, 632, 625], [719, 734, 748]], "h_samples": [240, 250, 260], "raw_file": "clips/0313-1/6040/20.jpg"}
//! ```
//!
//! `-2` marks a row where the lane is absent. Unknown keys are ignored.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use ultralane_label::{polylines_from_tusimple, LabelResult, Polyline};

use crate::error::{DatasetError, DatasetResult};

/// One annotated frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TuSimpleRecord {
    /// One x coordinate per entry of `h_samples` for each lane.
    pub lanes: Vec<Vec<i32>>,
    /// Row coordinates shared by every lane.
    pub h_samples: Vec<i32>,
    /// Image path relative to the dataset root.
    pub raw_file: String,
}

impl TuSimpleRecord {
    /// Parse a single JSON line.
    pub fn from_json(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    /// Polylines of all lanes with at least one valid point.
    ///
    /// # Errors
    ///
    /// Fails when a lane does not have one entry per row sample.
    pub fn polylines(&self) -> LabelResult<Vec<Polyline>> {
        polylines_from_tusimple(&self.lanes, &self.h_samples)
    }

    /// Output file stem: `raw_file` without its extension and with `/` replaced by `-`.
    ///
    /// `clips/0313-1/6040/20.jpg` becomes `clips-0313-1-6040-20`.
    pub fn sample_name(&self) -> String {
        let stem = Path::new(&self.raw_file)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.raw_file.strip_suffix(ext))
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap_or(&self.raw_file);
        stem.trim_start_matches('/').replace('/', "-")
    }

    /// Absolute image path under `data_root`.
    pub fn image_path(&self, data_root: &Path) -> PathBuf {
        data_root.join(self.raw_file.trim_start_matches('/'))
    }
}

/// Parsed lines of one annotation file.
///
/// Blank lines are skipped. Each remaining line yields its 1-based line number with either
/// the record or the parse error, so callers can skip bad lines and keep going.
///
/// # Errors
///
/// Fails only when the file itself cannot be read.
pub fn read_annotation_file(
    path: &Path,
) -> DatasetResult<Vec<(usize, DatasetResult<TuSimpleRecord>)>> {
    let content = fs::read_to_string(path).map_err(|e| DatasetError::FileReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let record =
                TuSimpleRecord::from_json(line).map_err(|e| DatasetError::MalformedRecord {
                    path: path.to_path_buf(),
                    line: index + 1,
                    source: e,
                });
            (index + 1, record)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const LINE: &str = r#"{"lanes": [[-2, 632, 625], [-2, -2, -2]], "h_samples": [240, 250, 260], "raw_file": "clips/0313-1/6040/20.jpg", "extra": 1}"#;

    #[test]
    fn parses_record_and_ignores_unknown_keys() {
        let record = TuSimpleRecord::from_json(LINE).unwrap();
        assert_eq!(record.lanes.len(), 2);
        assert_eq!(record.h_samples, vec![240, 250, 260]);

        let polylines = record.polylines().unwrap();
        assert_eq!(polylines.len(), 1);
        assert_eq!(polylines[0].len(), 2);
    }

    #[test]
    fn sample_name_flattens_path() {
        let record = TuSimpleRecord::from_json(LINE).unwrap();
        assert_eq!(record.sample_name(), "clips-0313-1-6040-20");

        let mut no_ext = record.clone();
        no_ext.raw_file = "clips/a/b".to_string();
        assert_eq!(no_ext.sample_name(), "clips-a-b");

        let mut png = record;
        png.raw_file = "clips/v1.2/frame.png".to_string();
        assert_eq!(png.sample_name(), "clips-v1.2-frame");
    }

    #[test]
    fn image_path_is_joined_to_root() {
        let record = TuSimpleRecord::from_json(LINE).unwrap();
        assert_eq!(
            record.image_path(Path::new("/data")),
            PathBuf::from("/data/clips/0313-1/6040/20.jpg")
        );
    }

    #[test]
    fn malformed_lines_are_reported_per_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{LINE}").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{{not json").unwrap();

        let records = read_annotation_file(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, 1);
        assert!(records[0].1.is_ok());
        assert!(matches!(
            records[1],
            (3, Err(DatasetError::MalformedRecord { line: 3, .. }))
        ));
    }

    #[test]
    fn length_mismatch_surfaces_as_label_error() {
        let record = TuSimpleRecord {
            lanes: vec![vec![1, 2]],
            h_samples: vec![240, 250, 260],
            raw_file: "a.jpg".to_string(),
        };
        assert!(record.polylines().is_err());
    }
}

//! Row-anchor classification labels.
//!
//! A segmentation mask is sampled at fixed anchor rows. For each row and lane ordinal the
//! centroid of the lane's pixels is binned into one of `num_cells - 1` equal-width columns;
//! the last cell index marks the lane as absent on that row. The result is the target for a
//! row-based lane head with logits shaped `[rows, lanes, num_cells]`.

use image::{GrayImage, Luma};

use crate::{
    error::{LabelError, LabelResult},
    selector::{LaneOrdinal, NUM_LANES},
};

/// Default number of cells per row: 100 horizontal bins plus the absent cell.
pub const DEFAULT_NUM_CELLS: usize = 101;

/// Largest cell count representable in an 8-bit label image.
pub const MAX_NUM_CELLS: usize = 256;

/// Anchor rows of the TuSimple benchmark, in 720p pixel coordinates.
pub fn tusimple_row_anchors() -> Vec<u32> {
    (160..=710).step_by(10).collect()
}

/// Row-by-lane grid of cell indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClsLabel {
    cells: Vec<u16>,
    rows: usize,
    num_cells: usize,
    clamped: usize,
}

impl ClsLabel {
    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub const fn num_cells(&self) -> usize {
        self.num_cells
    }

    /// Cell index of `ordinal` at anchor `row`, or `None` past the last row.
    pub fn get(&self, row: usize, ordinal: LaneOrdinal) -> Option<usize> {
        if row >= self.rows {
            return None;
        }
        self.cells
            .get(row * NUM_LANES + ordinal.index())
            .map(|&cell| usize::from(cell))
    }

    /// Row-major `[rows, 4]` cell indices.
    pub fn as_slice(&self) -> &[u16] {
        &self.cells
    }

    /// Cell index meaning "no lane on this row".
    pub const fn absent_cell(&self) -> usize {
        self.num_cells - 1
    }

    /// Number of entries that were clamped during encoding or lie outside `[0, num_cells)`.
    pub fn out_of_range_count(&self) -> usize {
        let beyond = self
            .cells
            .iter()
            .filter(|&&cell| usize::from(cell) >= self.num_cells)
            .count();
        beyond + self.clamped
    }

    /// Render as an 8-bit image, 4 pixels wide and one row per anchor.
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(NUM_LANES as u32, self.rows as u32, |x, y| {
            let cell = self.cells[y as usize * NUM_LANES + x as usize];
            Luma([u8::try_from(cell).unwrap_or(u8::MAX)])
        })
    }

    /// Read a label image written by [`ClsLabel::to_image`].
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::InvalidConfiguration`] if the image is not 4 pixels wide.
    pub fn from_image(image: &GrayImage, num_cells: usize) -> LabelResult<Self> {
        if image.width() as usize != NUM_LANES {
            return Err(LabelError::InvalidConfiguration {
                reason: format!(
                    "label image must be {NUM_LANES} pixels wide, got {}",
                    image.width()
                ),
            });
        }
        Ok(Self {
            cells: image.pixels().map(|p| u16::from(p.0[0])).collect(),
            rows: image.height() as usize,
            num_cells,
            clamped: 0,
        })
    }
}

/// Encodes segmentation masks into [`ClsLabel`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowEncoder {
    row_anchors: Vec<u32>,
    num_cells: usize,
}

impl Default for RowEncoder {
    fn default() -> Self {
        Self {
            row_anchors: tusimple_row_anchors(),
            num_cells: DEFAULT_NUM_CELLS,
        }
    }
}

impl RowEncoder {
    /// Create an encoder for the given anchor rows and cell count.
    ///
    /// # Errors
    ///
    /// Fails if there are no anchors or `num_cells` is outside `2..=256`.
    pub fn new(row_anchors: Vec<u32>, num_cells: usize) -> LabelResult<Self> {
        if row_anchors.is_empty() {
            return Err(LabelError::InvalidConfiguration {
                reason: "at least one row anchor is required".to_string(),
            });
        }
        if !(2..=MAX_NUM_CELLS).contains(&num_cells) {
            return Err(LabelError::InvalidConfiguration {
                reason: format!("num_cells must be in 2..={MAX_NUM_CELLS}, got {num_cells}"),
            });
        }
        Ok(Self {
            row_anchors,
            num_cells,
        })
    }

    pub fn row_anchors(&self) -> &[u32] {
        &self.row_anchors
    }

    pub const fn num_cells(&self) -> usize {
        self.num_cells
    }

    /// Number of horizontal bins, excluding the absent cell.
    pub const fn grid_cells(&self) -> usize {
        self.num_cells - 1
    }

    /// Bin a column into a cell. The second value is true when the index had to be clamped.
    pub fn cell_for_column(&self, column: f64, width: u32) -> (usize, bool) {
        let grid = self.grid_cells();
        let raw = (column * grid as f64 / f64::from(width)).floor();
        if raw < 0.0 {
            (0, true)
        } else if raw as usize >= grid {
            (grid - 1, true)
        } else {
            (raw as usize, false)
        }
    }

    /// Horizontal centre of `cell` in pixels, or `None` for the absent cell.
    pub fn cell_center(&self, cell: usize, width: u32) -> Option<f64> {
        let grid = self.grid_cells();
        (cell < grid).then(|| (cell as f64 + 0.5) * f64::from(width) / grid as f64)
    }

    /// Encode `mask`, binning columns over `[0, width)`.
    pub fn encode(&self, mask: &GrayImage, width: u32) -> ClsLabel {
        let absent = self.grid_cells() as u16;
        let mut cells = vec![absent; self.row_anchors.len() * NUM_LANES];
        let mut clamped = 0;

        for (row, &anchor) in self.row_anchors.iter().enumerate() {
            if anchor >= mask.height() {
                continue;
            }
            let mut sums = [0u64; NUM_LANES];
            let mut counts = [0u64; NUM_LANES];
            for x in 0..mask.width() {
                if let Some(ordinal) = LaneOrdinal::from_value(mask.get_pixel(x, anchor).0[0]) {
                    sums[ordinal.index()] += u64::from(x);
                    counts[ordinal.index()] += 1;
                }
            }

            for lane in 0..NUM_LANES {
                if counts[lane] == 0 {
                    continue;
                }
                let centroid = sums[lane] as f64 / counts[lane] as f64;
                let (cell, was_clamped) = self.cell_for_column(centroid, width);
                clamped += usize::from(was_clamped);
                cells[row * NUM_LANES + lane] = cell as u16;
            }
        }

        ClsLabel {
            cells,
            rows: self.row_anchors.len(),
            num_cells: self.num_cells,
            clamped,
        }
    }
}

//! Lane selection by slope ordering.
//!
//! Up to two lanes are kept on each side of the image centre. Left lanes have negative
//! slopes and right lanes positive ones. Lanes bordering the ego lane are the steepest, so
//! within a side the largest `|slope|` ranks first and ordinals run 1 to 4 from left to right.

use std::cmp::Ordering;

use crate::{
    polyline::Polyline,
    slope::{compute_slope, Slope},
};

/// Number of lane identities a sample can carry.
pub const NUM_LANES: usize = 4;

/// Fixed identity of a selected lane, numbered from the left edge of the image.
///
/// The inner lanes are the two boundaries of the ego lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LaneOrdinal {
    OuterLeft = 1,
    InnerLeft = 2,
    InnerRight = 3,
    OuterRight = 4,
}

impl LaneOrdinal {
    /// All ordinals in drawing order.
    pub const ALL: [Self; NUM_LANES] = [
        Self::OuterLeft,
        Self::InnerLeft,
        Self::InnerRight,
        Self::OuterRight,
    ];

    /// The mask value of this lane, 1 to 4.
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Zero-based position in presence vectors and row encodings.
    pub const fn index(self) -> usize {
        self as usize - 1
    }

    pub const fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::OuterLeft),
            2 => Some(Self::InnerLeft),
            3 => Some(Self::InnerRight),
            4 => Some(Self::OuterRight),
            _ => None,
        }
    }
}

/// Multi-hot vector of the ordinals present in a sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PresenceVector([u8; NUM_LANES]);

impl PresenceVector {
    pub const fn new(bits: [u8; NUM_LANES]) -> Self {
        Self(bits)
    }

    pub fn set(&mut self, ordinal: LaneOrdinal) {
        self.0[ordinal.index()] = 1;
    }

    pub const fn contains(&self, ordinal: LaneOrdinal) -> bool {
        self.0[ordinal.index()] == 1
    }

    pub const fn bits(&self) -> [u8; NUM_LANES] {
        self.0
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&bit| bit == 1).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Digit string used in manifests, e.g. `"0110"`.
    pub fn digits(&self) -> String {
        self.0.iter().map(|bit| char::from(b'0' + bit)).collect()
    }

    /// Parse a manifest digit string. Returns `None` unless it has exactly four 0/1 digits.
    pub fn from_digits(digits: &str) -> Option<Self> {
        let bytes = digits.as_bytes();
        if bytes.len() != NUM_LANES {
            return None;
        }
        let mut bits = [0u8; NUM_LANES];
        for (bit, &byte) in bits.iter_mut().zip(bytes) {
            *bit = match byte {
                b'0' => 0,
                b'1' => 1,
                _ => return None,
            };
        }
        Some(Self(bits))
    }
}

/// Mapping from lane ordinal to the index of the polyline holding it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaneSelection {
    assignments: Vec<(LaneOrdinal, usize)>,
    presence: PresenceVector,
}

impl LaneSelection {
    fn assign(&mut self, ordinal: LaneOrdinal, polyline: usize) {
        self.assignments.push((ordinal, polyline));
        self.presence.set(ordinal);
    }

    /// Assignments sorted by ordinal.
    pub fn assignments(&self) -> &[(LaneOrdinal, usize)] {
        &self.assignments
    }

    pub fn polyline_index(&self, ordinal: LaneOrdinal) -> Option<usize> {
        self.assignments
            .iter()
            .find(|(assigned, _)| *assigned == ordinal)
            .map(|&(_, index)| index)
    }

    pub const fn presence(&self) -> PresenceVector {
        self.presence
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Select up to four lanes from per-polyline slopes.
///
/// Sentinel slopes and exact zeros are ignored. Each side is sorted ascending with a stable
/// sort, so equal slopes keep annotation order. The steepest lane on a side borders the ego
/// lane and becomes the inner ordinal, the next steepest the outer one; flatter lanes are
/// dropped. A single lane on a side is always inner.
pub fn select_lanes(slopes: &[Slope]) -> LaneSelection {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for (index, slope) in slopes.iter().enumerate() {
        match slope.angle() {
            Some(angle) if angle < 0.0 => left.push((index, angle)),
            Some(angle) if angle > 0.0 => right.push((index, angle)),
            _ => {}
        }
    }

    let by_angle = |a: &(usize, f64), b: &(usize, f64)| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal);
    left.sort_by(by_angle);
    right.sort_by(by_angle);

    let mut selection = LaneSelection::default();
    match left.as_slice() {
        [] => {}
        [only] => selection.assign(LaneOrdinal::InnerLeft, only.0),
        [steepest, second, ..] => {
            selection.assign(LaneOrdinal::OuterLeft, second.0);
            selection.assign(LaneOrdinal::InnerLeft, steepest.0);
        }
    }
    match right.as_slice() {
        [] => {}
        [only] => selection.assign(LaneOrdinal::InnerRight, only.0),
        [.., second, steepest] => {
            selection.assign(LaneOrdinal::InnerRight, steepest.0);
            selection.assign(LaneOrdinal::OuterRight, second.0);
        }
    }

    let dropped = left.len().saturating_sub(2) + right.len().saturating_sub(2);
    if dropped > 0 {
        tracing::debug!(dropped, "more than two lanes on a side, flattest dropped");
    }
    selection
}

/// Compute slopes for `polylines` and select lanes from them.
pub fn select_polylines(polylines: &[Polyline], min_length: f64) -> LaneSelection {
    let slopes: Vec<Slope> = polylines
        .iter()
        .map(|polyline| compute_slope(polyline, min_length))
        .collect();
    select_lanes(&slopes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{polyline::Point, slope::DEFAULT_MIN_LINE_LENGTH};

    fn angles(values: &[f64]) -> Vec<Slope> {
        values.iter().map(|&v| Slope::Angle(v)).collect()
    }

    #[test]
    fn two_per_side_fill_all_ordinals() {
        let selection = select_lanes(&angles(&[-0.3, -0.9, 0.4, 1.1]));
        assert_eq!(selection.polyline_index(LaneOrdinal::OuterLeft), Some(0));
        assert_eq!(selection.polyline_index(LaneOrdinal::InnerLeft), Some(1));
        assert_eq!(selection.polyline_index(LaneOrdinal::InnerRight), Some(3));
        assert_eq!(selection.polyline_index(LaneOrdinal::OuterRight), Some(2));
        assert_eq!(selection.presence().digits(), "1111");
    }

    #[test]
    fn single_lane_per_side_uses_fixed_ordinals() {
        let selection = select_lanes(&angles(&[-0.5, 0.5]));
        assert_eq!(selection.polyline_index(LaneOrdinal::InnerLeft), Some(0));
        assert_eq!(selection.polyline_index(LaneOrdinal::InnerRight), Some(1));
        assert_eq!(selection.presence().digits(), "0110");
    }

    #[test]
    fn extra_lanes_keep_the_two_steepest() {
        let selection = select_lanes(&angles(&[-1.2, -0.2, -0.7, 0.9, 0.1, 0.5]));
        assert_eq!(selection.polyline_index(LaneOrdinal::OuterLeft), Some(2));
        assert_eq!(selection.polyline_index(LaneOrdinal::InnerLeft), Some(0));
        assert_eq!(selection.polyline_index(LaneOrdinal::InnerRight), Some(3));
        assert_eq!(selection.polyline_index(LaneOrdinal::OuterRight), Some(5));
        assert_eq!(selection.assignments().len(), 4);
    }

    fn straight_lane(x_top: i32, x_bottom: i32) -> Polyline {
        let points = (0..28)
            .map(|i| {
                let y = 170 + i * 20;
                Point::new(x_top + (x_bottom - x_top) * (y - 170) / 540, y)
            })
            .collect();
        Polyline::new(points)
    }

    fn bottom_x(polylines: &[Polyline], selection: &LaneSelection, ordinal: LaneOrdinal) -> i32 {
        let index = selection.polyline_index(ordinal).unwrap();
        polylines[index].last().unwrap().x
    }

    #[test]
    fn ordinals_run_left_to_right_in_the_image() {
        // Annotation order deliberately differs from screen order.
        let polylines = vec![
            straight_lane(720, 1180),
            straight_lane(600, 420),
            straight_lane(680, 860),
            straight_lane(560, 100),
        ];
        let selection = select_polylines(&polylines, DEFAULT_MIN_LINE_LENGTH);
        assert_eq!(selection.presence().digits(), "1111");

        let xs: Vec<i32> = LaneOrdinal::ALL
            .iter()
            .map(|&ordinal| bottom_x(&polylines, &selection, ordinal))
            .collect();
        assert_eq!(xs, vec![100, 420, 860, 1180]);
    }

    #[test]
    fn extra_lanes_drop_the_farthest_from_centre() {
        let polylines = vec![
            straight_lane(680, 860),
            straight_lane(700, 1000),
            straight_lane(720, 1180),
            straight_lane(600, 420),
            straight_lane(580, 250),
            straight_lane(560, 100),
        ];
        let selection = select_polylines(&polylines, DEFAULT_MIN_LINE_LENGTH);
        assert_eq!(bottom_x(&polylines, &selection, LaneOrdinal::OuterLeft), 250);
        assert_eq!(bottom_x(&polylines, &selection, LaneOrdinal::InnerLeft), 420);
        assert_eq!(bottom_x(&polylines, &selection, LaneOrdinal::InnerRight), 860);
        assert_eq!(bottom_x(&polylines, &selection, LaneOrdinal::OuterRight), 1000);
    }

    #[test]
    fn sentinels_and_zero_are_ignored() {
        let slopes = vec![Slope::TooShort, Slope::Angle(0.0), Slope::Vertical, Slope::Angle(0.3)];
        let selection = select_lanes(&slopes);
        assert_eq!(selection.assignments(), &[(LaneOrdinal::InnerRight, 3)]);
    }

    #[test]
    fn no_candidates_gives_empty_presence() {
        let selection = select_lanes(&[Slope::TooShort, Slope::Vertical]);
        assert!(selection.is_empty());
        assert_eq!(selection.presence().bits(), [0, 0, 0, 0]);
    }

    #[test]
    fn equal_slopes_get_distinct_ordinals() {
        let selection = select_lanes(&angles(&[-0.5, -0.5, 0.5, 0.5]));
        let polylines: HashSet<usize> = selection.assignments().iter().map(|&(_, i)| i).collect();
        assert_eq!(polylines.len(), 4);
        // Stable sort keeps annotation order among ties.
        assert_eq!(selection.polyline_index(LaneOrdinal::InnerLeft), Some(0));
        assert_eq!(selection.polyline_index(LaneOrdinal::OuterLeft), Some(1));
        assert_eq!(selection.polyline_index(LaneOrdinal::OuterRight), Some(2));
        assert_eq!(selection.polyline_index(LaneOrdinal::InnerRight), Some(3));
    }

    #[test]
    fn ordinals_are_unique_and_match_presence() {
        let cases: [&[f64]; 4] = [&[-0.1], &[0.2, 0.3, 0.4], &[-0.3, -0.2, -0.1, 0.6], &[]];
        for case in cases {
            let selection = select_lanes(&angles(case));
            let ordinals: HashSet<LaneOrdinal> =
                selection.assignments().iter().map(|&(o, _)| o).collect();
            assert_eq!(ordinals.len(), selection.assignments().len());
            for ordinal in LaneOrdinal::ALL {
                assert_eq!(
                    selection.presence().contains(ordinal),
                    ordinals.contains(&ordinal)
                );
            }
        }
    }

    #[test]
    fn presence_digits_round_trip() {
        let presence = PresenceVector::from_digits("1010").unwrap();
        assert!(presence.contains(LaneOrdinal::OuterLeft));
        assert!(!presence.contains(LaneOrdinal::InnerLeft));
        assert_eq!(presence.digits(), "1010");
        assert!(PresenceVector::from_digits("10a0").is_none());
        assert!(PresenceVector::from_digits("101").is_none());
    }
}

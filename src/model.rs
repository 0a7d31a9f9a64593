//! Data models for grouping weighed trays into boxes.
//!
//! This module defines the fundamental data structures of the matcher:
//! - `Tray`: A single weighed unit with a stable index
//! - `TrayList`: The validated tray list of one generation run
//! - `MembershipMask`: Bit-set of tray indices for fast disjointness checks
//! - `Candidate`: A subset of trays whose total weight is close to the target
//! - `PackedBox`: A selected candidate with its display rank

use std::fmt;

use serde::Serialize;
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

/// Upper bound for the number of trays in one list.
///
/// Enumeration visits `2^n - 1` subsets and may keep every one of them as a
/// candidate, so 20 trays means up to about a million candidates (24 bytes
/// each) per solve. The mask type has room for 32.
pub const MAX_TRAYS: usize = 20;

/// Validation error for tray data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Too many trays: {count} given, at most {max} are supported")]
    TooManyTrays { count: usize, max: usize },
}

/// A single weighed tray.
///
/// # Fields
/// * `index` - 0-based position, the stable identity of the tray
/// * `weight` - Weight in grams, fixed until the next generation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Tray {
    pub index: usize,
    #[serde(rename = "weight_g")]
    #[schema(example = json!(652))]
    pub weight: u32,
}

impl Tray {
    pub const fn new(index: usize, weight: u32) -> Self {
        Self { index, weight }
    }
}

/// Owned, validated list of trays.
///
/// Indices always run `0..len` in order, and the list never holds more than
/// [`MAX_TRAYS`] entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrayList {
    trays: Vec<Tray>,
}

impl TrayList {
    /// Builds a tray list from raw gram weights, assigning indices in order.
    ///
    /// # Examples
    /// ```
    /// use weigher_sorter::model::TrayList;
    ///
    /// let trays = TrayList::from_weights(vec![650, 680, 700]).unwrap();
    /// assert_eq!(trays.len(), 3);
    /// assert_eq!(trays.get(1).map(|t| t.weight), Some(680));
    ///
    /// assert!(TrayList::from_weights(vec![600; 25]).is_err());
    /// ```
    pub fn from_weights(weights: Vec<u32>) -> Result<Self, ValidationError> {
        if weights.len() > MAX_TRAYS {
            return Err(ValidationError::TooManyTrays {
                count: weights.len(),
                max: MAX_TRAYS,
            });
        }

        let trays = weights
            .into_iter()
            .enumerate()
            .map(|(index, weight)| Tray::new(index, weight))
            .collect();
        Ok(Self { trays })
    }

    pub fn len(&self) -> usize {
        self.trays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trays.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tray> {
        self.trays.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tray> {
        self.trays.iter()
    }

    /// Returns the weights in index order.
    pub fn weights(&self) -> Vec<u32> {
        self.trays.iter().map(|t| t.weight).collect()
    }

    /// Sum of all tray weights in grams.
    pub fn total_weight(&self) -> u64 {
        self.trays.iter().map(|t| u64::from(t.weight)).sum()
    }
}

impl<'a> IntoIterator for &'a TrayList {
    type Item = &'a Tray;
    type IntoIter = std::slice::Iter<'a, Tray>;

    fn into_iter(self) -> Self::IntoIter {
        self.trays.iter()
    }
}

/// Bit-set of tray indices.
///
/// Bit `i` is set when tray `i` is a member. Two masks are disjoint when
/// their bitwise AND is zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MembershipMask(u32);

impl MembershipMask {
    pub const EMPTY: Self = Self(0);

    /// Number of distinct tray indices a mask can represent.
    pub const CAPACITY: usize = u32::BITS as usize;

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Builds a mask from tray indices. Indices beyond [`Self::CAPACITY`] are ignored.
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        indices
            .into_iter()
            .filter(|&i| i < Self::CAPACITY)
            .fold(Self::EMPTY, |acc, i| Self(acc.0 | (1 << i)))
    }

    #[inline]
    pub const fn contains(self, index: usize) -> bool {
        index < Self::CAPACITY && self.0 & (1 << index) != 0
    }

    /// Number of members.
    #[inline]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_disjoint(self, other: Self) -> bool {
        self.0 & other.0 == 0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Iterates the member indices in ascending order.
    pub fn indices(self) -> impl Iterator<Item = usize> {
        (0..Self::CAPACITY).filter(move |&i| self.contains(i))
    }
}

impl fmt::Display for MembershipMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#b}", self.0)
    }
}

/// A subset of trays whose total weight is within tolerance of the target.
///
/// Candidates are derived on every solve and never mutated afterwards. They
/// hold no heap data; member indices are expanded only for selected boxes.
///
/// # Fields
/// * `mask` - Member trays as a bit-set (never empty)
/// * `sum` - Total weight of the members in grams
/// * `deviation` - `|sum - target|` in grams
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub mask: MembershipMask,
    pub sum: u64,
    pub deviation: u64,
}

impl Candidate {
    /// Number of trays in this candidate.
    #[inline]
    pub fn member_count(&self) -> usize {
        self.mask.len()
    }

    /// Member tray indices in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        self.mask.indices().collect()
    }

    /// Ranking key: smaller deviation first, then fewer trays, then lighter.
    #[inline]
    pub fn rank_key(&self) -> (u64, usize, u64) {
        (self.deviation, self.member_count(), self.sum)
    }
}

/// A selected candidate with its 1-based display rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedBox {
    pub rank: usize,
    pub candidate: Candidate,
    indices: Vec<usize>,
}

impl PackedBox {
    pub fn new(rank: usize, candidate: Candidate) -> Self {
        Self {
            rank,
            indices: candidate.indices(),
            candidate,
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn total_weight(&self) -> u64 {
        self.candidate.sum
    }

    pub fn deviation(&self) -> u64 {
        self.candidate.deviation
    }

    pub fn member_count(&self) -> usize {
        self.candidate.member_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tray_list_assigns_sequential_indices() {
        let trays = TrayList::from_weights(vec![610, 620, 630]).unwrap();
        let indices: Vec<_> = trays.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(trays.weights(), vec![610, 620, 630]);
        assert_eq!(trays.total_weight(), 1860);
    }

    #[test]
    fn tray_list_accepts_exactly_max_trays() {
        let trays = TrayList::from_weights(vec![1; MAX_TRAYS]).unwrap();
        assert_eq!(trays.len(), MAX_TRAYS);
    }

    #[test]
    fn tray_list_rejects_too_many_trays() {
        let err = TrayList::from_weights(vec![1; MAX_TRAYS + 1]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TooManyTrays {
                count: MAX_TRAYS + 1,
                max: MAX_TRAYS
            }
        );
        assert!(err.to_string().contains("at most 20"));
    }

    #[test]
    fn empty_tray_list_is_valid() {
        let trays = TrayList::from_weights(Vec::new()).unwrap();
        assert!(trays.is_empty());
        assert_eq!(trays.total_weight(), 0);
    }

    #[test]
    fn mask_membership_and_count() {
        let mask = MembershipMask::from_indices([0, 3, 5]);
        assert_eq!(mask.bits(), 0b101001);
        assert_eq!(mask.len(), 3);
        assert!(mask.contains(3));
        assert!(!mask.contains(1));
        assert!(!mask.contains(40));
        assert_eq!(mask.indices().collect::<Vec<_>>(), vec![0, 3, 5]);
    }

    #[test]
    fn mask_disjointness_and_union() {
        let a = MembershipMask::from_indices([0, 1]);
        let b = MembershipMask::from_indices([2, 3]);
        let c = MembershipMask::from_indices([1, 2]);

        assert!(a.is_disjoint(b));
        assert!(!a.is_disjoint(c));
        assert!(MembershipMask::EMPTY.is_disjoint(a));
        assert_eq!(a.union(b), MembershipMask::from_bits(0b1111));
        assert!(MembershipMask::EMPTY.is_empty());
    }

    #[test]
    fn candidate_rank_key_orders_by_deviation_count_sum() {
        let candidate = Candidate {
            mask: MembershipMask::from_indices([0, 2]),
            sum: 1990,
            deviation: 10,
        };
        assert_eq!(candidate.rank_key(), (10, 2, 1990));
        assert_eq!(candidate.indices(), vec![0, 2]);
    }

    #[test]
    fn candidate_stays_a_small_value_type() {
        assert_eq!(std::mem::size_of::<Candidate>(), 24);
    }

    #[test]
    fn packed_box_expands_member_indices() {
        let candidate = Candidate {
            mask: MembershipMask::from_indices([1, 4, 7]),
            sum: 1800,
            deviation: 200,
        };
        let packed = PackedBox::new(1, candidate);
        assert_eq!(packed.indices(), &[1, 4, 7]);
        assert_eq!(packed.member_count(), 3);
    }
}

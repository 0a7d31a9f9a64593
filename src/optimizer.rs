//! Subset matching of trays into boxes.
//!
//! Solving runs in three stages:
//! - Enumerate every non-empty subset of the trays and keep those within
//!   tolerance of the target (and of the requested size, if any)
//! - Rank the survivors by deviation, then tray count, then total weight
//! - Walk the ranking once and greedily accept candidates that share no tray
//!   with an already accepted box, up to the box limit
//!
//! Enumeration costs O(2^n · n) time and, with a loose tolerance, O(2^n)
//! memory for the candidate list. Tray lists are capped at
//! [`MAX_TRAYS`](crate::model::MAX_TRAYS) to keep both bounded. The greedy pass does not backtrack, so it can
//! miss a selection with more boxes; that trade-off is intentional.

use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::model::{Candidate, MembershipMask, PackedBox, TrayList};
use crate::settings::Settings;

/// Outcome category of a solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// At least one box was selected.
    Matched,
    /// Trays were present but no subset satisfied the criteria.
    NoMatch,
    /// There were no trays to combine.
    NoTrays,
}

impl SolveStatus {
    pub fn code(&self) -> &'static str {
        match self {
            SolveStatus::Matched => "matched",
            SolveStatus::NoMatch => "no_match",
            SolveStatus::NoTrays => "no_trays",
        }
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Matched => write!(f, "Matching boxes found"),
            SolveStatus::NoMatch => {
                write!(f, "No combination of trays satisfies the criteria")
            }
            SolveStatus::NoTrays => write!(f, "No trays available to combine"),
        }
    }
}

/// The resolved criteria a solve ran with, for reporting back to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct SolveCriteria {
    pub target_g: u32,
    pub tolerance_g: u32,
    /// `null` when any non-empty box size was allowed.
    #[schema(nullable = true)]
    pub item_count: Option<usize>,
    pub box_limit: usize,
}

impl From<&Settings> for SolveCriteria {
    fn from(settings: &Settings) -> Self {
        Self {
            target_g: settings.target_g,
            tolerance_g: settings.tolerance_g,
            item_count: settings.item_count,
            box_limit: settings.box_limit,
        }
    }
}

impl std::fmt::Display for SolveCriteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}g ±{}g, ", self.target_g, self.tolerance_g)?;
        match self.item_count {
            Some(count) => write!(f, "exactly {} trays", count),
            None => write!(f, "any tray count"),
        }
    }
}

/// Result of a solve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolveReport {
    pub status: SolveStatus,
    pub boxes: Vec<PackedBox>,
    pub criteria: SolveCriteria,
    /// Number of subsets that passed the filter before selection.
    pub candidate_count: usize,
}

impl SolveReport {
    /// Indicates whether at least one box was selected.
    pub fn is_match(&self) -> bool {
        self.status == SolveStatus::Matched
    }

    pub fn box_count(&self) -> usize {
        self.boxes.len()
    }

    /// Union of all trays assigned to a box.
    pub fn used_mask(&self) -> MembershipMask {
        self.boxes
            .iter()
            .fold(MembershipMask::EMPTY, |acc, b| acc.union(b.candidate.mask))
    }

    /// Total weight of all boxed trays.
    pub fn total_boxed_weight(&self) -> u64 {
        self.boxes.iter().map(PackedBox::total_weight).sum()
    }
}

/// Enumerates every subset of `trays` that satisfies the settings.
///
/// Candidates come out in ascending mask order. A subset is kept when its
/// size matches `settings.item_count` (if set) and its deviation from
/// `settings.target_g` is at most `settings.tolerance_g`.
pub fn enumerate_candidates(trays: &TrayList, settings: &Settings) -> Vec<Candidate> {
    let target = u64::from(settings.target_g);
    let tolerance = u64::from(settings.tolerance_g);
    let mask_end = 1u64 << trays.len();
    let mut candidates = Vec::new();

    for bits in 1..mask_end {
        let mask = MembershipMask::from_bits(bits as u32);

        if let Some(count) = settings.item_count {
            if mask.len() != count {
                continue;
            }
        }

        let sum: u64 = trays
            .iter()
            .enumerate()
            .filter(|(i, _)| mask.contains(*i))
            .map(|(_, tray)| u64::from(tray.weight))
            .sum();
        let deviation = sum.abs_diff(target);

        if deviation <= tolerance {
            candidates.push(Candidate {
                mask,
                sum,
                deviation,
            });
        }
    }

    candidates
}

/// Sorts candidates by deviation, then tray count, then total weight.
///
/// The sort is stable, so remaining ties keep their enumeration order.
pub fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by_key(Candidate::rank_key);
}

/// Greedily picks up to `limit` pairwise-disjoint candidates from a ranked list.
///
/// Boxes receive ranks `1..` in acceptance order.
pub fn select_disjoint(ranked: &[Candidate], limit: usize) -> Vec<PackedBox> {
    let mut selected: Vec<PackedBox> = Vec::new();
    let mut used = MembershipMask::EMPTY;

    for candidate in ranked {
        if selected.len() >= limit {
            break;
        }
        if !candidate.mask.is_disjoint(used) {
            continue;
        }
        used = used.union(candidate.mask);
        selected.push(PackedBox::new(selected.len() + 1, *candidate));
    }

    selected
}

/// Main entry point: groups trays into boxes matching the settings.
///
/// # Parameters
/// * `trays` - Current tray list
/// * `settings` - Resolved settings (target, tolerance, item count, box limit)
///
/// # Returns
/// `SolveReport` with the selected boxes (possibly none) and the criteria used
///
/// # Examples
/// ```
/// use weigher_sorter::model::TrayList;
/// use weigher_sorter::optimizer::{solve, SolveStatus};
/// use weigher_sorter::settings::Settings;
///
/// let trays = TrayList::from_weights(vec![650, 680, 700, 660]).unwrap();
/// let settings = Settings::builder().target_g(1330).tolerance_g(10).build();
/// let report = solve(&trays, &settings);
/// assert_eq!(report.status, SolveStatus::Matched);
/// assert_eq!(report.boxes[0].indices(), &[0, 1]);
/// ```
pub fn solve(trays: &TrayList, settings: &Settings) -> SolveReport {
    let criteria = SolveCriteria::from(settings);

    if trays.is_empty() {
        return SolveReport {
            status: SolveStatus::NoTrays,
            boxes: Vec::new(),
            criteria,
            candidate_count: 0,
        };
    }

    let mut candidates = enumerate_candidates(trays, settings);
    let candidate_count = candidates.len();
    rank_candidates(&mut candidates);
    let boxes = select_disjoint(&candidates, settings.box_limit);

    let status = if boxes.is_empty() {
        SolveStatus::NoMatch
    } else {
        SolveStatus::Matched
    };

    debug!(
        trays = trays.len(),
        candidates = candidate_count,
        boxes = boxes.len(),
        status = status.code(),
        "solve finished"
    );

    SolveReport {
        status,
        boxes,
        criteria,
        candidate_count,
    }
}

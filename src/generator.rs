//! Deterministic tray weight generation.
//!
//! Weights come from a 32-bit xorshift generator. The same seed always yields
//! the same weights; that reproducibility is what callers and tests rely on.
//!
//! The integer mapping `floor(u * span) + min` is slightly biased when the span
//! is not a power of two. Weights are display values at gram precision, so the
//! bias is accepted as-is. This is not a statistically rigorous or
//! cryptographic sampler.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::model::{MAX_TRAYS, TrayList, ValidationError};
use crate::settings::{Settings, WeightRange};

/// Substitute for a zero seed, which is a fixed point of xorshift.
pub const FALLBACK_SEED: u32 = 2_463_534_242;

const UNIT_SCALE: f64 = 4_294_967_296.0;

/// Xorshift32 pseudo-random generator. The state is never zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    /// Creates a generator; a zero seed is replaced by [`FALLBACK_SEED`].
    pub fn new(seed: u32) -> Self {
        let state = if seed == 0 { FALLBACK_SEED } else { seed };
        Self { state }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    /// Advances the state and returns it.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Next draw mapped to `[0, 1)`.
    #[inline]
    pub fn next_unit(&mut self) -> f64 {
        f64::from(self.next_u32()) / UNIT_SCALE
    }

    /// Next draw mapped to the inclusive range.
    pub fn next_in_range(&mut self, range: WeightRange) -> u32 {
        let offset = (self.next_unit() * range.span() as f64).floor() as u64;
        // offset < span, so the sum never exceeds range.max()
        (u64::from(range.min()) + offset) as u32
    }
}

/// Seed for a fresh generation: wall-clock milliseconds mixed with the
/// sub-second nanosecond reading.
pub fn fresh_seed() -> u32 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let coarse = elapsed.as_millis() as u32;
    let fine = elapsed.subsec_nanos();
    coarse ^ fine.rotate_left(16)
}

/// Result of one generation run.
///
/// # Fields
/// * `seed` - The seed that was requested (zero stays zero here; the generator substitutes internally)
/// * `weight_range` - Range the weights were drawn from
/// * `trays` - Freshly generated trays, replacing any previous list
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedBatch {
    pub seed: u32,
    pub weight_range: WeightRange,
    pub trays: TrayList,
}

/// Generates `count` tray weights from `seed` within the settings' weight range.
///
/// # Parameters
/// * `settings` - Resolved settings; only the weight range is used
/// * `count` - Number of trays, at most [`MAX_TRAYS`]
/// * `seed` - PRNG seed
///
/// # Examples
/// ```
/// use weigher_sorter::generator::generate;
/// use weigher_sorter::settings::Settings;
///
/// let settings = Settings::default();
/// let first = generate(&settings, 12, 42).unwrap();
/// let second = generate(&settings, 12, 42).unwrap();
/// assert_eq!(first.trays, second.trays);
/// ```
pub fn generate(
    settings: &Settings,
    count: usize,
    seed: u32,
) -> Result<GeneratedBatch, ValidationError> {
    if count > MAX_TRAYS {
        return Err(ValidationError::TooManyTrays {
            count,
            max: MAX_TRAYS,
        });
    }

    let range = settings.weight_range;
    let mut rng = XorShift32::new(seed);
    let weights: Vec<u32> = (0..count).map(|_| rng.next_in_range(range)).collect();

    debug!(
        seed,
        count,
        min_g = range.min(),
        max_g = range.max(),
        "generated tray weights"
    );

    Ok(GeneratedBatch {
        seed,
        weight_range: range,
        trays: TrayList::from_weights(weights)?,
    })
}

//! Resolution of raw user input into canonical solver settings.
//!
//! Raw values may be missing, blank, non-numeric or out of range. Resolution
//! never fails: each field that cannot be used falls back to its documented
//! default.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tracing::debug;
use utoipa::ToSchema;

/// A numeric input as it arrives from a form field or JSON body.
///
/// Text is trimmed before parsing; blank text counts as absent. Any other JSON
/// value (booleans, arrays, objects) is kept as `Other` and treated as unusable.
#[derive(Clone, Debug, PartialEq, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl RawNumber {
    /// Numeric reading of the input.
    ///
    /// Returns `None` for blank text and `Some(NaN)` for anything that is not a
    /// number, so callers can tell "not given" from "given but unusable".
    fn value(&self) -> Option<f64> {
        match self {
            RawNumber::Number(value) => Some(*value),
            RawNumber::Text(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(parse_number_text(trimmed))
                }
            }
            RawNumber::Other(_) => Some(f64::NAN),
        }
    }
}

/// Parses decimal text, or an unsigned integer literal with a `0x`, `0o` or
/// `0b` prefix. Anything else is NaN.
fn parse_number_text(text: &str) -> f64 {
    let radix = match text.get(..2) {
        Some("0x" | "0X") => 16,
        Some("0o" | "0O") => 8,
        Some("0b" | "0B") => 2,
        _ => return text.parse::<f64>().unwrap_or(f64::NAN),
    };

    let digits = &text[2..];
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return f64::NAN;
    }
    u64::from_str_radix(digits, radix)
        .map(|value| value as f64)
        .unwrap_or(f64::NAN)
}

impl From<f64> for RawNumber {
    fn from(value: f64) -> Self {
        RawNumber::Number(value)
    }
}

impl From<&str> for RawNumber {
    fn from(value: &str) -> Self {
        RawNumber::Text(value.to_owned())
    }
}

/// Unvalidated settings fields.
///
/// Every field is optional; see [`Settings::resolve`] for the fallback rules.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "target_kg": 2.0,
        "item_count": null,
        "tolerance_g": 90,
        "weight_min_g": 600,
        "weight_max_g": 700
    })
)]
pub struct RawSettings {
    /// Target weight per box in kilograms.
    #[serde(default)]
    #[schema(nullable = true)]
    pub target_kg: Option<RawNumber>,
    /// Exact number of trays per box; anything invalid means unconstrained.
    #[serde(default)]
    #[schema(nullable = true)]
    pub item_count: Option<RawNumber>,
    /// Maximum deviation from the target in grams.
    #[serde(default)]
    #[schema(nullable = true)]
    pub tolerance_g: Option<RawNumber>,
    /// Lower end of the generated weight range in grams.
    #[serde(default)]
    #[schema(nullable = true)]
    pub weight_min_g: Option<RawNumber>,
    /// Upper end of the generated weight range in grams.
    #[serde(default)]
    #[schema(nullable = true)]
    pub weight_max_g: Option<RawNumber>,
}

/// Inclusive weight range in grams. `min <= max` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct WeightRange {
    #[serde(rename = "min_g")]
    min: u32,
    #[serde(rename = "max_g")]
    max: u32,
}

impl WeightRange {
    /// Creates a range from two bounds given in either order.
    pub fn new(a: u32, b: u32) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub const fn min(&self) -> u32 {
        self.min
    }

    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Number of distinct integer weights in the range.
    pub fn span(&self) -> u64 {
        u64::from(self.max) - u64::from(self.min) + 1
    }

    pub fn contains(&self, weight: u32) -> bool {
        (self.min..=self.max).contains(&weight)
    }
}

impl Default for WeightRange {
    fn default() -> Self {
        Self::new(Settings::DEFAULT_WEIGHT_MIN_G, Settings::DEFAULT_WEIGHT_MAX_G)
    }
}

/// Canonical settings for generation and solving.
///
/// # Fields
/// * `target_g` - Target box weight in grams (always positive)
/// * `tolerance_g` - Maximum accepted deviation in grams
/// * `item_count` - Exact trays per box, or `None` for any non-empty size
/// * `weight_range` - Range for generated tray weights
/// * `box_limit` - Maximum number of boxes per result
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub target_g: u32,
    pub tolerance_g: u32,
    pub item_count: Option<usize>,
    pub weight_range: WeightRange,
    pub box_limit: usize,
}

impl Settings {
    pub const DEFAULT_TARGET_G: u32 = 2000;
    pub const DEFAULT_TOLERANCE_G: u32 = 90;
    pub const DEFAULT_WEIGHT_MIN_G: u32 = 600;
    pub const DEFAULT_WEIGHT_MAX_G: u32 = 700;
    pub const DEFAULT_BOX_LIMIT: usize = 4;

    /// Creates a builder for hand-written settings.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Resolves raw input into settings.
    ///
    /// # Parameters
    /// * `raw` - Unvalidated field values
    /// * `tray_total` - Number of trays the settings apply to (bounds `item_count`)
    /// * `box_limit` - Configured maximum number of boxes
    ///
    /// # Examples
    /// ```
    /// use weigher_sorter::settings::{RawSettings, Settings};
    ///
    /// let raw = RawSettings {
    ///     target_kg: Some("1.33".into()),
    ///     tolerance_g: Some("abc".into()),
    ///     ..Default::default()
    /// };
    /// let settings = Settings::resolve(&raw, 12, 4);
    /// assert_eq!(settings.target_g, 1330);
    /// assert_eq!(settings.tolerance_g, Settings::DEFAULT_TOLERANCE_G);
    /// assert_eq!(settings.item_count, None);
    /// ```
    pub fn resolve(raw: &RawSettings, tray_total: usize, box_limit: usize) -> Self {
        let weight_min = resolve_weight_bound(
            "weight_min_g",
            raw.weight_min_g.as_ref(),
            Self::DEFAULT_WEIGHT_MIN_G,
        );
        let weight_max = resolve_weight_bound(
            "weight_max_g",
            raw.weight_max_g.as_ref(),
            Self::DEFAULT_WEIGHT_MAX_G,
        );

        Self {
            target_g: resolve_target(raw.target_kg.as_ref()),
            tolerance_g: resolve_tolerance(raw.tolerance_g.as_ref()),
            item_count: resolve_item_count(raw.item_count.as_ref(), tray_total),
            weight_range: WeightRange::new(weight_min, weight_max),
            box_limit: box_limit.max(1),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_g: Self::DEFAULT_TARGET_G,
            tolerance_g: Self::DEFAULT_TOLERANCE_G,
            item_count: None,
            weight_range: WeightRange::default(),
            box_limit: Self::DEFAULT_BOX_LIMIT,
        }
    }
}

/// Builder for `Settings`.
#[derive(Clone, Debug, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Sets the target weight in grams. Zero keeps the default.
    pub fn target_g(mut self, target_g: u32) -> Self {
        if target_g > 0 {
            self.settings.target_g = target_g;
        }
        self
    }

    pub fn tolerance_g(mut self, tolerance_g: u32) -> Self {
        self.settings.tolerance_g = tolerance_g;
        self
    }

    /// Sets the exact tray count per box. Zero means unconstrained.
    pub fn item_count(mut self, item_count: Option<usize>) -> Self {
        self.settings.item_count = item_count.filter(|&count| count > 0);
        self
    }

    pub fn weight_range(mut self, a: u32, b: u32) -> Self {
        self.settings.weight_range = WeightRange::new(a, b);
        self
    }

    /// Sets the box limit. Values below 1 are raised to 1.
    pub fn box_limit(mut self, box_limit: usize) -> Self {
        self.settings.box_limit = box_limit.max(1);
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }
}

fn field_value(raw: Option<&RawNumber>) -> Option<f64> {
    raw.and_then(RawNumber::value)
}

fn note_fallback(field: &str, value: f64, default: impl std::fmt::Display) {
    debug!(field, input = value, %default, "setting out of domain, using default");
}

/// Rounds a non-negative finite value to the nearest gram, saturating at `u32::MAX`.
fn round_grams(value: f64) -> u32 {
    value.round() as u32
}

fn resolve_target(raw: Option<&RawNumber>) -> u32 {
    let Some(kg) = field_value(raw) else {
        return Settings::DEFAULT_TARGET_G;
    };

    if kg.is_finite() && kg > 0.0 {
        let grams = round_grams(kg * 1000.0);
        if grams > 0 {
            return grams;
        }
    }
    note_fallback("target_kg", kg, Settings::DEFAULT_TARGET_G);
    Settings::DEFAULT_TARGET_G
}

fn resolve_item_count(raw: Option<&RawNumber>, tray_total: usize) -> Option<usize> {
    let count = field_value(raw)?;

    let in_domain = count.is_finite()
        && count.fract() == 0.0
        && count >= 1.0
        && count <= tray_total as f64;
    if in_domain {
        Some(count as usize)
    } else {
        note_fallback("item_count", count, "unconstrained");
        None
    }
}

fn resolve_tolerance(raw: Option<&RawNumber>) -> u32 {
    let Some(tolerance) = field_value(raw) else {
        return Settings::DEFAULT_TOLERANCE_G;
    };

    if tolerance.is_finite() && tolerance >= 0.0 {
        round_grams(tolerance)
    } else {
        note_fallback("tolerance_g", tolerance, Settings::DEFAULT_TOLERANCE_G);
        Settings::DEFAULT_TOLERANCE_G
    }
}

fn resolve_weight_bound(field: &str, raw: Option<&RawNumber>, default: u32) -> u32 {
    let Some(weight) = field_value(raw) else {
        return default;
    };

    if weight.is_finite() && weight >= 1.0 {
        round_grams(weight)
    } else {
        note_fallback(field, weight, default);
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawSettings {
        RawSettings::default()
    }

    #[test]
    fn absent_fields_resolve_to_defaults() {
        let settings = Settings::resolve(&raw(), 12, 4);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.target_g, 2000);
        assert_eq!(settings.tolerance_g, 90);
        assert_eq!(settings.weight_range, WeightRange::new(600, 700));
    }

    #[test]
    fn blank_text_counts_as_absent() {
        let input = RawSettings {
            target_kg: Some("   ".into()),
            item_count: Some("".into()),
            tolerance_g: Some(" ".into()),
            weight_min_g: Some("".into()),
            weight_max_g: Some("".into()),
        };
        assert_eq!(Settings::resolve(&input, 12, 4), Settings::default());
    }

    #[test]
    fn target_is_converted_from_kilograms_and_rounded() {
        let input = RawSettings {
            target_kg: Some(1.3304.into()),
            ..raw()
        };
        assert_eq!(Settings::resolve(&input, 12, 4).target_g, 1330);

        let input = RawSettings {
            target_kg: Some(" 2.5 ".into()),
            ..raw()
        };
        assert_eq!(Settings::resolve(&input, 12, 4).target_g, 2500);
    }

    #[test]
    fn invalid_target_falls_back() {
        for value in [
            RawNumber::from(0.0),
            RawNumber::from(-1.5),
            RawNumber::from(f64::INFINITY),
            RawNumber::from("heavy"),
            RawNumber::from("NaN"),
            RawNumber::from(0.0001),
        ] {
            let input = RawSettings {
                target_kg: Some(value.clone()),
                ..raw()
            };
            assert_eq!(
                Settings::resolve(&input, 12, 4).target_g,
                Settings::DEFAULT_TARGET_G,
                "target {:?} should fall back",
                value
            );
        }
    }

    #[test]
    fn item_count_must_be_whole_and_in_range() {
        let resolve = |value: RawNumber| {
            let input = RawSettings {
                item_count: Some(value),
                ..raw()
            };
            Settings::resolve(&input, 12, 4).item_count
        };

        assert_eq!(resolve(3.0.into()), Some(3));
        assert_eq!(resolve("12".into()), Some(12));
        assert_eq!(resolve(1.0.into()), Some(1));
        assert_eq!(resolve(0.0.into()), None);
        assert_eq!(resolve(13.0.into()), None);
        assert_eq!(resolve(2.5.into()), None);
        assert_eq!(resolve("two".into()), None);
        assert_eq!(resolve((-3.0).into()), None);
    }

    #[test]
    fn item_count_is_unconstrained_without_trays() {
        let input = RawSettings {
            item_count: Some(1.0.into()),
            ..raw()
        };
        assert_eq!(Settings::resolve(&input, 0, 4).item_count, None);
    }

    #[test]
    fn tolerance_is_rounded_and_validated() {
        let resolve = |value: RawNumber| {
            let input = RawSettings {
                tolerance_g: Some(value),
                ..raw()
            };
            Settings::resolve(&input, 12, 4).tolerance_g
        };

        assert_eq!(resolve(0.0.into()), 0);
        assert_eq!(resolve(12.6.into()), 13);
        assert_eq!(resolve("45".into()), 45);
        assert_eq!(resolve((-1.0).into()), Settings::DEFAULT_TOLERANCE_G);
        assert_eq!(resolve("lots".into()), Settings::DEFAULT_TOLERANCE_G);
    }

    #[test]
    fn reversed_weight_range_is_swapped() {
        let input = RawSettings {
            weight_min_g: Some(750.0.into()),
            weight_max_g: Some("550".into()),
            ..raw()
        };
        let range = Settings::resolve(&input, 12, 4).weight_range;
        assert_eq!(range.min(), 550);
        assert_eq!(range.max(), 750);
    }

    #[test]
    fn invalid_weight_bound_uses_factory_value_for_that_end() {
        let input = RawSettings {
            weight_min_g: Some(0.5.into()),
            weight_max_g: Some(800.4.into()),
            ..raw()
        };
        let range = Settings::resolve(&input, 12, 4).weight_range;
        assert_eq!(range, WeightRange::new(600, 800));

        // An invalid max falls back to 700, which may then swap with a larger min.
        let input = RawSettings {
            weight_min_g: Some(900.0.into()),
            weight_max_g: Some("x".into()),
            ..raw()
        };
        let range = Settings::resolve(&input, 12, 4).weight_range;
        assert_eq!(range, WeightRange::new(700, 900));
    }

    #[test]
    fn box_limit_is_at_least_one() {
        assert_eq!(Settings::resolve(&raw(), 12, 0).box_limit, 1);
        assert_eq!(Settings::builder().box_limit(0).build().box_limit, 1);
    }

    #[test]
    fn builder_overrides_defaults() {
        let settings = Settings::builder()
            .target_g(1400)
            .tolerance_g(0)
            .item_count(Some(2))
            .weight_range(700, 650)
            .box_limit(3)
            .build();

        assert_eq!(settings.target_g, 1400);
        assert_eq!(settings.tolerance_g, 0);
        assert_eq!(settings.item_count, Some(2));
        assert_eq!(settings.weight_range, WeightRange::new(650, 700));
        assert_eq!(settings.box_limit, 3);
    }

    #[test]
    fn weight_range_span_and_contains() {
        let range = WeightRange::new(600, 700);
        assert_eq!(range.span(), 101);
        assert!(range.contains(600));
        assert!(range.contains(700));
        assert!(!range.contains(701));

        let full = WeightRange::new(0, u32::MAX);
        assert_eq!(full.span(), 1u64 << 32);
    }

    #[test]
    fn prefixed_integer_literals_are_numbers() {
        assert_eq!(parse_number_text("0x1A"), 26.0);
        assert_eq!(parse_number_text("0B11"), 3.0);
        assert_eq!(parse_number_text("0o7"), 7.0);
        assert_eq!(parse_number_text("1e3"), 1000.0);
        assert!(parse_number_text("0x").is_nan());
        assert!(parse_number_text("0x+1").is_nan());
        assert!(parse_number_text("0b12").is_nan());
        assert!(parse_number_text("-0x10").is_nan());

        let input = RawSettings {
            tolerance_g: Some(" 0x20 ".into()),
            ..raw()
        };
        assert_eq!(Settings::resolve(&input, 12, 4).tolerance_g, 32);
    }

    #[test]
    fn non_numeric_json_values_fall_back() {
        let json = r#"{
            "target_kg": true,
            "item_count": { "n": 2 },
            "tolerance_g": [1],
            "weight_min_g": false
        }"#;
        let parsed: RawSettings = serde_json::from_str(json).expect("Should parse raw settings");
        assert_eq!(
            parsed.target_kg,
            Some(RawNumber::Other(serde_json::Value::Bool(true)))
        );

        let settings = Settings::resolve(&parsed, 12, 4);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn raw_settings_deserialize_numbers_and_strings() {
        let json = r#"{
            "target_kg": "1.4",
            "item_count": 2,
            "tolerance_g": null
        }"#;
        let parsed: RawSettings = serde_json::from_str(json).expect("Should parse raw settings");
        assert_eq!(parsed.target_kg, Some(RawNumber::Text("1.4".to_string())));
        assert_eq!(parsed.item_count, Some(RawNumber::Number(2.0)));
        assert_eq!(parsed.tolerance_g, None);
        assert_eq!(parsed.weight_min_g, None);

        let settings = Settings::resolve(&parsed, 4, 4);
        assert_eq!(settings.target_g, 1400);
        assert_eq!(settings.item_count, Some(2));
        assert_eq!(settings.tolerance_g, 90);
    }
}

//! Recovery Score Calculation
//!
//! Converts one day's patient-reported metrics into a single 0-100 recovery
//! score.
//!
//! # Algorithm
//!
//! Each 0-10 metric is scaled to a 0-100 sub-score:
//!
//! - **Pain**: `100 - pain * 10` (inverted, more pain means a lower score)
//! - **Mobility**: `mobility * 10`
//! - **Mental health**: `mental * 10`
//!
//! The recovery score is the mean of the three sub-scores rounded to the
//! nearest integer. Because every sub-score lies in 0-100, so does the mean.
//!
//! # Rounding
//!
//! All averages in this crate round half-up (midpoint away from zero, which is
//! the same thing for non-negative values). Arithmetic runs in
//! [`rust_decimal::Decimal`] so a mean such as `50.5` never becomes
//! `50.499999`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{DailyMetricEntry, RecoveryScoreRecord, METRIC_MAX, METRIC_MIN};

/// Highest possible recovery score
pub const MAX_RECOVERY_SCORE: u8 = 100;

/// Divide and round half-up to the nearest integer
///
/// Returns 0 when `denominator` is 0.
pub fn round_half_up(numerator: u32, denominator: u32) -> u32 {
    if denominator == 0 {
        return 0;
    }

    (Decimal::from(numerator) / Decimal::from(denominator))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
}

/// Clamp a patient-reported metric into 0-10
pub fn clamp_metric(value: i64) -> u8 {
    value.clamp(i64::from(METRIC_MIN), i64::from(METRIC_MAX)) as u8
}

/// Stateless recovery score calculator
pub struct RecoveryScoreCalculator;

impl RecoveryScoreCalculator {
    /// Composite recovery score for one day
    ///
    /// Inputs are expected in 0-10. Values above 10 are clamped rather than
    /// rejected, so the result is always within 0-100.
    ///
    /// ```rust
    /// use recoveryrs::score::RecoveryScoreCalculator;
    ///
    /// assert_eq!(RecoveryScoreCalculator::calculate(3, 7, 8), 73);
    /// ```
    pub fn calculate(pain_level: u8, mobility_scale: u8, mental_health_index: u8) -> u8 {
        let pain_level = pain_level.min(METRIC_MAX);
        let mobility_scale = mobility_scale.min(METRIC_MAX);
        let mental_health_index = mental_health_index.min(METRIC_MAX);

        let pain_score = u32::from(MAX_RECOVERY_SCORE) - u32::from(pain_level) * 10;
        let mobility_score = u32::from(mobility_scale) * 10;
        let mental_score = u32::from(mental_health_index) * 10;

        let score = round_half_up(pain_score + mobility_score + mental_score, 3);
        score.min(u32::from(MAX_RECOVERY_SCORE)) as u8
    }

    /// Score an entry, keeping the display fields alongside the score
    pub fn score_entry(entry: &DailyMetricEntry) -> RecoveryScoreRecord {
        RecoveryScoreRecord {
            date: entry.date,
            recovery_score: Self::calculate(
                entry.pain_level,
                entry.mobility_scale,
                entry.mental_health_index,
            ),
            pain_level: entry.pain_level.min(METRIC_MAX),
            mobility_scale: entry.mobility_scale.min(METRIC_MAX),
            mental_health_index: entry.mental_health_index.min(METRIC_MAX),
            heart_rate: Some(entry.heart_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_score_extremes() {
        assert_eq!(RecoveryScoreCalculator::calculate(0, 10, 10), 100);
        assert_eq!(RecoveryScoreCalculator::calculate(10, 0, 0), 0);
    }

    #[test]
    fn test_score_midpoint() {
        assert_eq!(RecoveryScoreCalculator::calculate(5, 5, 5), 50);
    }

    #[test]
    fn test_score_rounds_to_nearest() {
        // 70 + 70 + 80 = 220, 220 / 3 = 73.33
        assert_eq!(RecoveryScoreCalculator::calculate(3, 7, 8), 73);
        // 90 + 70 + 80 = 240, 240 / 3 = 80
        assert_eq!(RecoveryScoreCalculator::calculate(1, 7, 8), 80);
        // 100 + 10 + 0 = 110, 110 / 3 = 36.67
        assert_eq!(RecoveryScoreCalculator::calculate(0, 1, 0), 37);
    }

    #[test]
    fn test_out_of_range_input_is_clamped() {
        assert_eq!(RecoveryScoreCalculator::calculate(0, 200, 11), 100);
        assert_eq!(RecoveryScoreCalculator::calculate(255, 0, 0), 0);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(101, 2), 51);
        assert_eq!(round_half_up(99, 2), 50);
        assert_eq!(round_half_up(100, 3), 33);
        assert_eq!(round_half_up(5, 0), 0);
        assert_eq!(
            (Decimal::from(101) / Decimal::from(2)),
            dec!(50.5),
        );
    }

    #[test]
    fn test_clamp_metric() {
        assert_eq!(clamp_metric(-3), 0);
        assert_eq!(clamp_metric(4), 4);
        assert_eq!(clamp_metric(42), 10);
    }

    #[test]
    fn test_score_entry_keeps_display_fields() {
        let entry = DailyMetricEntry {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            pain_level: 3,
            mobility_scale: 7,
            mental_health_index: 8,
            heart_rate: 72,
        };

        let record = RecoveryScoreCalculator::score_entry(&entry);
        assert_eq!(record.date, entry.date);
        assert_eq!(record.recovery_score, 73);
        assert_eq!(record.pain_level, 3);
        assert_eq!(record.mobility_scale, 7);
        assert_eq!(record.mental_health_index, 8);
        assert_eq!(record.heart_rate, Some(72));
    }

    proptest! {
        #[test]
        fn prop_score_within_bounds(pain in 0u8..=10, mobility in 0u8..=10, mental in 0u8..=10) {
            let score = RecoveryScoreCalculator::calculate(pain, mobility, mental);
            prop_assert!(score <= MAX_RECOVERY_SCORE);
        }

        #[test]
        fn prop_less_pain_never_lowers_score(pain in 1u8..=10, mobility in 0u8..=10, mental in 0u8..=10) {
            let worse = RecoveryScoreCalculator::calculate(pain, mobility, mental);
            let better = RecoveryScoreCalculator::calculate(pain - 1, mobility, mental);
            prop_assert!(better >= worse);
        }
    }
}

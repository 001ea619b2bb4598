use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::{DailyMetricEntry, HEART_RATE_MAX, HEART_RATE_MIN};
use crate::score::clamp_metric;

/// Raw values captured by the daily metric form
///
/// Sliders produce integers that may drift outside 0-10 if the form is
/// misconfigured; heart rate arrives as the text the user typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricFormInput {
    pub pain_level: i64,
    pub mobility_scale: i64,
    pub mental_health_index: i64,
    pub heart_rate: String,
}

impl Default for MetricFormInput {
    /// Initial form state: sliders centred, typical resting heart rate
    fn default() -> Self {
        Self {
            pain_level: 5,
            mobility_scale: 5,
            mental_health_index: 5,
            heart_rate: "75".to_string(),
        }
    }
}

/// Validate and clean metric form input
pub struct MetricValidator;

impl MetricValidator {
    /// Whether the heart rate field should accept `text` as typed
    ///
    /// Only an empty string or ASCII digits are allowed in the field.
    pub fn accepts_heart_rate_text(text: &str) -> bool {
        text.chars().all(|c| c.is_ascii_digit())
    }

    /// Parse submitted heart rate text, enforcing the 30-220 BPM range
    pub fn parse_heart_rate(text: &str) -> Result<u16, ValidationError> {
        let trimmed = text.trim();
        if trimmed.is_empty() || !Self::accepts_heart_rate_text(trimmed) {
            return Err(ValidationError::InvalidHeartRate {
                input: text.to_string(),
            });
        }

        // Digit strings too long for u32 are certainly out of range
        let value: u32 = trimmed.parse().unwrap_or(u32::MAX);
        if !(u32::from(HEART_RATE_MIN)..=u32::from(HEART_RATE_MAX)).contains(&value) {
            return Err(ValidationError::HeartRateOutOfRange {
                value,
                min: HEART_RATE_MIN,
                max: HEART_RATE_MAX,
            });
        }

        Ok(value as u16)
    }

    /// Build a validated entry for `date`
    pub fn validate(input: &MetricFormInput, date: NaiveDate) -> Result<DailyMetricEntry, ValidationError> {
        let heart_rate = Self::parse_heart_rate(&input.heart_rate)?;

        Ok(DailyMetricEntry {
            date,
            pain_level: clamp_metric(input.pain_level),
            mobility_scale: clamp_metric(input.mobility_scale),
            mental_health_index: clamp_metric(input.mental_health_index),
            heart_rate,
        })
    }
}

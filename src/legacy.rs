//! Decoding of rows stored in the original untyped layout
//!
//! Older recovery logs kept every metric as text: pain and mobility as
//! stringified integers, the score in an `adherence` column, heart rate inside
//! a JSON `vitalsigns` blob, and the mental health index written into the
//! free-text notes as `"Mental Health Index: 7/10"`. Treatments packed dosage
//! and frequency into one `therapy` string (`"200mg - Twice daily"`).
//!
//! This module exists to migrate such rows into typed records once. Nothing
//! else in the crate reads or writes this layout.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LegacyRowError;
use crate::models::{RecoveryScoreRecord, Treatment, TreatmentType, METRIC_MAX};
use crate::score::{RecoveryScoreCalculator, MAX_RECOVERY_SCORE};

/// Placeholder written when a medication had no dosage
const NO_DOSAGE: &str = "No dosage";

/// A `recoverylogs` row as exported from the old store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRecoveryLogRow {
    pub logid: String,
    #[serde(default)]
    pub patientid: Option<String>,
    pub date: String,
    #[serde(default)]
    pub painlevels: Option<String>,
    #[serde(default)]
    pub vitalsigns: Option<String>,
    #[serde(default)]
    pub mobilitystatus: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub adherence: Option<String>,
}

/// A `treatments` row as exported from the old store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyTreatmentRow {
    pub treatmentid: String,
    pub treatmenttype: String,
    #[serde(default)]
    pub medication: Option<String>,
    #[serde(default)]
    pub therapy: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub startdate: Option<String>,
    #[serde(default)]
    pub enddate: Option<String>,
}

/// A dump of one patient's legacy tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyExport {
    #[serde(default)]
    pub recoverylogs: Vec<LegacyRecoveryLogRow>,
    #[serde(default)]
    pub treatments: Vec<LegacyTreatmentRow>,
}

#[derive(Debug, Deserialize)]
struct LegacyVitals {
    #[serde(rename = "heartRate")]
    heart_rate: Option<u16>,
}

/// Rows decoded from a legacy export, with the ones that were rejected
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyDecodeOutcome {
    /// Date-ascending
    pub records: Vec<RecoveryScoreRecord>,
    pub treatments: Vec<Treatment>,
    pub rejected: Vec<LegacyRowError>,
}

/// Integer prefix of `text`, the way a lenient form parser reads "7/10" as 7
fn leading_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text),
    };

    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(digits.len(), |(i, _)| i);

    digits[..end].parse::<i64>().ok().map(|v| sign * v)
}

/// Split `"dosage - frequency"` into its parts
pub fn split_therapy(therapy: &str) -> (Option<String>, Option<String>) {
    let (dosage, frequency) = match therapy.split_once(" - ").or_else(|| therapy.split_once('-')) {
        Some((dosage, frequency)) => (dosage.trim(), frequency.trim()),
        None => (therapy.trim(), ""),
    };

    let dosage = (!dosage.is_empty() && dosage != NO_DOSAGE).then(|| dosage.to_string());
    let frequency = (!frequency.is_empty()).then(|| frequency.to_string());
    (dosage, frequency)
}

fn parse_date(log_id: &str, value: &str) -> Result<NaiveDate, LegacyRowError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| LegacyRowError::InvalidDate {
        log_id: log_id.to_string(),
        value: value.to_string(),
    })
}

impl LegacyRecoveryLogRow {
    /// Missing or blank columns read as 0
    fn bounded_field(&self, field: &str, value: Option<&str>, max: u8) -> Result<u8, LegacyRowError> {
        let text = match value.map(str::trim) {
            None | Some("") => return Ok(0),
            Some(text) => text,
        };

        let parsed = leading_integer(text).ok_or_else(|| LegacyRowError::InvalidNumber {
            log_id: self.logid.clone(),
            field: field.to_string(),
            value: text.to_string(),
        })?;

        if !(0..=i64::from(max)).contains(&parsed) {
            return Err(LegacyRowError::OutOfRange {
                log_id: self.logid.clone(),
                field: field.to_string(),
                value: parsed,
            });
        }

        Ok(parsed as u8)
    }

    fn heart_rate(&self) -> Result<Option<u16>, LegacyRowError> {
        match self.vitalsigns.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(json) => serde_json::from_str::<LegacyVitals>(json)
                .map(|v| v.heart_rate)
                .map_err(|e| LegacyRowError::MalformedVitals {
                    log_id: self.logid.clone(),
                    reason: e.to_string(),
                }),
        }
    }

    /// Decode into a typed record
    ///
    /// The mental health index is the number after the first `:` in the notes.
    /// When the row carries no score it is recomputed from the metrics.
    pub fn decode(&self) -> Result<RecoveryScoreRecord, LegacyRowError> {
        let date = parse_date(&self.logid, &self.date)?;
        let pain_level = self.bounded_field("painlevels", self.painlevels.as_deref(), METRIC_MAX)?;
        let mobility_scale =
            self.bounded_field("mobilitystatus", self.mobilitystatus.as_deref(), METRIC_MAX)?;

        let mental_text = self.notes.as_deref().and_then(|n| n.split(':').nth(1));
        let mental_health_index = self.bounded_field("notes", mental_text, METRIC_MAX)?;

        let recovery_score = match self.adherence.as_deref().map(str::trim) {
            None | Some("") => {
                RecoveryScoreCalculator::calculate(pain_level, mobility_scale, mental_health_index)
            }
            stored => self.bounded_field("adherence", stored, MAX_RECOVERY_SCORE)?,
        };

        Ok(RecoveryScoreRecord {
            date,
            recovery_score,
            pain_level,
            mobility_scale,
            mental_health_index,
            heart_rate: self.heart_rate()?,
        })
    }
}

impl LegacyTreatmentRow {
    /// Decode into a treatment owned by `patient_id`
    ///
    /// The old `treatmentid` only names the row in error messages. The
    /// treatment always gets a fresh id, so an import can never collide with
    /// a row that belongs to someone else.
    pub fn decode(&self, patient_id: Uuid) -> Result<Treatment, LegacyRowError> {
        let (dosage, frequency) = self
            .therapy
            .as_deref()
            .map(split_therapy)
            .unwrap_or((None, None));

        let start_date = self
            .startdate
            .as_deref()
            .map(|d| parse_date(&self.treatmentid, d))
            .transpose()?;
        let end_date = self
            .enddate
            .as_deref()
            .map(|d| parse_date(&self.treatmentid, d))
            .transpose()?;

        let name = self
            .medication
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Unknown treatment".to_string());

        Ok(Treatment {
            id: Uuid::new_v4(),
            patient_id,
            treatment_type: TreatmentType::from_label(&self.treatmenttype),
            name,
            dosage,
            frequency,
            duration_days: self.duration,
            start_date,
            end_date,
        })
    }
}

impl LegacyExport {
    /// Decode every row, collecting failures instead of stopping at the first
    pub fn decode(&self, patient_id: Uuid) -> LegacyDecodeOutcome {
        let mut outcome = LegacyDecodeOutcome::default();

        for row in &self.recoverylogs {
            match row.decode() {
                Ok(record) => outcome.records.push(record),
                Err(e) => outcome.rejected.push(e),
            }
        }

        for row in &self.treatments {
            match row.decode(patient_id) {
                Ok(treatment) => outcome.treatments.push(treatment),
                Err(e) => outcome.rejected.push(e),
            }
        }

        outcome.records.sort_by_key(|r| r.date);
        outcome
    }
}

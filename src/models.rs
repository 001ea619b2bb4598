//! Core records exchanged between the form layer, the scoring logic and the
//! persistence backend.
//!
//! Every metric has its own typed field. Nothing here is encoded into free
//! text and parsed back out; see [`crate::legacy`] for decoding rows that were.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lowest value of a 0-10 patient-reported metric
pub const METRIC_MIN: u8 = 0;

/// Highest value of a 0-10 patient-reported metric
pub const METRIC_MAX: u8 = 10;

/// Accepted heart rate range in BPM
pub const HEART_RATE_MIN: u16 = 30;
pub const HEART_RATE_MAX: u16 = 220;

/// One day's raw patient-reported values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMetricEntry {
    /// Date the metrics describe
    pub date: NaiveDate,

    /// Pain level, 0 = no pain, 10 = worst pain
    pub pain_level: u8,

    /// Mobility, 0 = limited, 10 = full mobility
    pub mobility_scale: u8,

    /// Mental health index, 0 = struggling, 10 = excellent
    pub mental_health_index: u8,

    /// Resting heart rate in BPM (validated, not scored)
    pub heart_rate: u16,
}

/// A scored day as stored by the backend and read back for trends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryScoreRecord {
    pub date: NaiveDate,

    /// Composite score, always within 0-100
    pub recovery_score: u8,

    pub pain_level: u8,
    pub mobility_scale: u8,
    pub mental_health_index: u8,

    /// Heart rate if the source row carried vitals
    pub heart_rate: Option<u16>,
}

/// Identity of the signed-in user, supplied by the auth collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthSession {
    /// Opaque user identifier scoping every read and write
    pub user_id: String,
}

impl AuthSession {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Public profile attached to an authenticated user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,

    /// Unique across all profiles
    pub username: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The tracked individual, distinct from the authenticated user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,

    /// Owning user; one patient per user
    pub user_id: String,

    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub contact: String,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub lifestyle_factors: Option<String>,
}

/// Kind of treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreatmentType {
    Medication,
    Therapy,
    Other,
}

impl TreatmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreatmentType::Medication => "Medication",
            TreatmentType::Therapy => "Therapy",
            TreatmentType::Other => "Other",
        }
    }

    /// Lenient parse for stored values; unknown labels map to `Other`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "medication" => TreatmentType::Medication,
            "therapy" => TreatmentType::Therapy,
            _ => TreatmentType::Other,
        }
    }
}

impl fmt::Display for TreatmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A medication or therapy prescribed to a patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub treatment_type: TreatmentType,
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,

    /// Planned course length in days
    pub duration_days: Option<u32>,

    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Treatment {
    /// Frequency as shown to the patient
    pub fn frequency_label(&self) -> String {
        match (&self.frequency, self.duration_days) {
            (Some(frequency), _) => frequency.clone(),
            (None, Some(days)) => format!("{} days", days),
            (None, None) => "As needed".to_string(),
        }
    }

    /// A treatment is active until the day after its end date
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.end_date.map_or(true, |end| end >= date)
    }
}

/// The patient's healthcare provider (at most one per patient)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthcareProvider {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub specialization: String,

    /// Phone number or other contact detail
    pub contact: String,

    pub credentials: Option<String>,
    pub schedule: Option<String>,
}

/// A family contact for the patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub relationship: String,
    pub contact: String,
}

/// Everything shown on the profile page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub patient: Patient,
    pub provider: Option<HealthcareProvider>,
    pub family_members: Vec<FamilyMember>,
    pub treatments: Vec<Treatment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treatment(frequency: Option<&str>, duration_days: Option<u32>) -> Treatment {
        Treatment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            treatment_type: TreatmentType::Medication,
            name: "Ibuprofen".to_string(),
            dosage: Some("200mg".to_string()),
            frequency: frequency.map(str::to_string),
            duration_days,
            start_date: None,
            end_date: None,
        }
    }

    #[test]
    fn test_frequency_label() {
        assert_eq!(treatment(Some("Twice daily"), Some(10)).frequency_label(), "Twice daily");
        assert_eq!(treatment(None, Some(14)).frequency_label(), "14 days");
        assert_eq!(treatment(None, None).frequency_label(), "As needed");
    }

    #[test]
    fn test_treatment_active_window() {
        let mut t = treatment(None, None);
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert!(t.is_active_on(today));

        t.end_date = Some(today);
        assert!(t.is_active_on(today));
        assert!(!t.is_active_on(today.succ_opt().unwrap()));
    }

    #[test]
    fn test_treatment_type_labels() {
        assert_eq!(TreatmentType::from_label("medication"), TreatmentType::Medication);
        assert_eq!(TreatmentType::from_label(" Therapy "), TreatmentType::Therapy);
        assert_eq!(TreatmentType::from_label("surgery"), TreatmentType::Other);
        assert_eq!(TreatmentType::Medication.to_string(), "Medication");
    }
}

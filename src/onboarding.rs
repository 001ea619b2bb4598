//! First-run profile wizard
//!
//! New patients enter personal details, current medications, their
//! healthcare provider and family contacts. Only the personal details are
//! required; every other section may be left blank, but a row that is started
//! must carry its contact or frequency.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::{FamilyMember, HealthcareProvider, Patient, Treatment, TreatmentType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientInfoInput {
    pub name: String,
    /// YYYY-MM-DD
    pub date_of_birth: String,
    pub gender: String,
    pub contact: String,
    pub address: String,
    pub medical_history: String,
    pub lifestyle_factors: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedicationInput {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderInput {
    pub name: String,
    pub specialty: String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyMemberInput {
    pub name: String,
    pub relationship: String,
    pub phone: String,
}

/// Everything the wizard collects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardingForm {
    pub patient: PatientInfoInput,
    pub medications: Vec<MedicationInput>,
    pub provider: ProviderInput,
    pub family_members: Vec<FamilyMemberInput>,
}

/// Typed records ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct OnboardingRecords {
    pub patient: Patient,
    pub treatments: Vec<Treatment>,
    pub provider: Option<HealthcareProvider>,
    pub family_members: Vec<FamilyMember>,
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn required(value: &str, field: &str) -> Result<String, ValidationError> {
    optional(value).ok_or_else(|| ValidationError::MissingField {
        field: field.to_string(),
    })
}

/// Provider specialization when none was entered
pub const DEFAULT_SPECIALIZATION: &str = "General";

/// Family relationship when none was entered
pub const DEFAULT_RELATIONSHIP: &str = "Not specified";

fn or_default(value: &str, default: &str) -> String {
    optional(value).unwrap_or_else(|| default.to_string())
}

impl PatientInfoInput {
    /// Required name, parsed date of birth and contact
    pub fn validate(&self) -> Result<(String, NaiveDate, String), ValidationError> {
        let name = required(&self.name, "name")?;
        let dob_text = required(&self.date_of_birth, "date of birth")?;
        let contact = required(&self.contact, "contact")?;

        let date_of_birth = NaiveDate::parse_from_str(&dob_text, "%Y-%m-%d").map_err(|e| {
            ValidationError::InvalidField {
                field: "date of birth".to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok((name, date_of_birth, contact))
    }

    /// Overwrite the editable fields of `patient`; ids and ownership are kept
    pub fn apply_to(&self, patient: &mut Patient) -> Result<(), ValidationError> {
        let (name, date_of_birth, contact) = self.validate()?;

        patient.name = name;
        patient.date_of_birth = date_of_birth;
        patient.contact = contact;
        patient.gender = optional(&self.gender);
        patient.address = optional(&self.address);
        patient.medical_history = optional(&self.medical_history);
        patient.lifestyle_factors = optional(&self.lifestyle_factors);
        Ok(())
    }
}

impl MedicationInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = required(&self.name, "medication name")?;
        if blank(&self.frequency) {
            return Err(ValidationError::MissingField {
                field: format!("frequency for medication {}", name),
            });
        }
        Ok(())
    }

    pub fn to_treatment(&self, id: Uuid, patient_id: Uuid) -> Result<Treatment, ValidationError> {
        self.validate()?;

        Ok(Treatment {
            id,
            patient_id,
            treatment_type: TreatmentType::Medication,
            name: self.name.trim().to_string(),
            dosage: optional(&self.dosage),
            frequency: optional(&self.frequency),
            duration_days: None,
            start_date: None,
            end_date: None,
        })
    }
}

impl ProviderInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        required(&self.name, "provider name")?;
        required(&self.phone, "provider phone")?;
        Ok(())
    }

    pub fn to_provider(&self, id: Uuid, patient_id: Uuid) -> Result<HealthcareProvider, ValidationError> {
        self.validate()?;

        Ok(HealthcareProvider {
            id,
            patient_id,
            name: self.name.trim().to_string(),
            specialization: or_default(&self.specialty, DEFAULT_SPECIALIZATION),
            contact: self.phone.trim().to_string(),
            credentials: None,
            schedule: None,
        })
    }
}

impl FamilyMemberInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = required(&self.name, "family member name")?;
        if blank(&self.phone) {
            return Err(ValidationError::MissingField {
                field: format!("phone for family member {}", name),
            });
        }
        Ok(())
    }

    pub fn to_family_member(&self, id: Uuid, patient_id: Uuid) -> Result<FamilyMember, ValidationError> {
        self.validate()?;

        Ok(FamilyMember {
            id,
            patient_id,
            name: self.name.trim().to_string(),
            relationship: or_default(&self.relationship, DEFAULT_RELATIONSHIP),
            contact: self.phone.trim().to_string(),
        })
    }
}

impl OnboardingForm {
    /// Medication rows that were actually filled in
    pub fn validate_medications(&self) -> Result<Vec<&MedicationInput>, ValidationError> {
        let named: Vec<&MedicationInput> = self.medications.iter().filter(|m| !blank(&m.name)).collect();
        for medication in &named {
            medication.validate()?;
        }
        Ok(named)
    }

    /// The provider section, if filled in
    pub fn validate_provider(&self) -> Result<Option<&ProviderInput>, ValidationError> {
        if blank(&self.provider.name) {
            return Ok(None);
        }

        self.provider.validate()?;
        Ok(Some(&self.provider))
    }

    /// Family rows that were actually filled in
    pub fn validate_family(&self) -> Result<Vec<&FamilyMemberInput>, ValidationError> {
        let named: Vec<&FamilyMemberInput> =
            self.family_members.iter().filter(|m| !blank(&m.name)).collect();
        for member in &named {
            member.validate()?;
        }
        Ok(named)
    }

    pub fn validate_patient_info(&self) -> Result<(String, NaiveDate, String), ValidationError> {
        self.patient.validate()
    }

    /// Validate every section and build records for `user_id`
    ///
    /// `existing` is the patient already linked to the user, if any; it is
    /// kept as-is and the remaining sections are attached to it.
    pub fn to_records(&self, user_id: &str, existing: Option<Patient>) -> Result<OnboardingRecords, ValidationError> {
        let medications = self.validate_medications()?;
        let provider = self.validate_provider()?;
        let family = self.validate_family()?;

        let patient = match existing {
            Some(patient) => patient,
            None => {
                let (name, date_of_birth, contact) = self.validate_patient_info()?;
                Patient {
                    id: Uuid::new_v4(),
                    user_id: user_id.to_string(),
                    name,
                    date_of_birth,
                    gender: optional(&self.patient.gender),
                    contact,
                    address: optional(&self.patient.address),
                    medical_history: optional(&self.patient.medical_history),
                    lifestyle_factors: optional(&self.patient.lifestyle_factors),
                }
            }
        };

        let treatments = medications
            .into_iter()
            .map(|m| m.to_treatment(Uuid::new_v4(), patient.id))
            .collect::<Result<Vec<_>, _>>()?;

        let provider = provider
            .map(|p| p.to_provider(Uuid::new_v4(), patient.id))
            .transpose()?;

        let family_members = family
            .into_iter()
            .map(|m| m.to_family_member(Uuid::new_v4(), patient.id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OnboardingRecords {
            patient,
            treatments,
            provider,
            family_members,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> OnboardingForm {
        OnboardingForm {
            patient: PatientInfoInput {
                name: "Sam Rivera".to_string(),
                date_of_birth: "1985-04-12".to_string(),
                contact: "555-0100".to_string(),
                ..Default::default()
            },
            medications: vec![MedicationInput::default()],
            provider: ProviderInput::default(),
            family_members: vec![FamilyMemberInput::default()],
        }
    }

    #[test]
    fn test_blank_optional_sections_are_accepted() {
        let records = form().to_records("user-1", None).unwrap();
        assert_eq!(records.patient.name, "Sam Rivera");
        assert_eq!(records.patient.user_id, "user-1");
        assert_eq!(records.patient.gender, None);
        assert!(records.treatments.is_empty());
        assert!(records.provider.is_none());
        assert!(records.family_members.is_empty());
    }

    #[test]
    fn test_medication_requires_frequency() {
        let mut form = form();
        form.medications = vec![MedicationInput {
            name: "Naproxen".to_string(),
            dosage: "250mg".to_string(),
            frequency: " ".to_string(),
        }];

        let err = form.to_records("user-1", None).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field } if field.contains("Naproxen")));
    }

    #[test]
    fn test_provider_requires_phone() {
        let mut form = form();
        form.provider.name = "Dr. Okafor".to_string();
        assert!(form.validate_provider().is_err());

        form.provider.phone = "555-0199".to_string();
        let records = form.to_records("user-1", None).unwrap();
        let provider = records.provider.unwrap();
        assert_eq!(provider.contact, "555-0199");
        assert_eq!(provider.patient_id, records.patient.id);
    }

    #[test]
    fn test_family_member_requires_phone() {
        let mut form = form();
        form.family_members = vec![
            FamilyMemberInput {
                name: "Alex".to_string(),
                relationship: "Sibling".to_string(),
                phone: "555-0111".to_string(),
            },
            FamilyMemberInput {
                name: "Jo".to_string(),
                relationship: "Parent".to_string(),
                phone: String::new(),
            },
        ];
        assert!(form.validate_family().is_err());

        form.family_members.pop();
        assert_eq!(form.validate_family().unwrap().len(), 1);
    }

    #[test]
    fn test_patient_info_required_fields() {
        let mut form = form();
        form.patient.contact.clear();
        assert!(matches!(
            form.validate_patient_info(),
            Err(ValidationError::MissingField { field }) if field == "contact"
        ));

        let mut form = self::form();
        form.patient.date_of_birth = "12/04/1985".to_string();
        assert!(matches!(
            form.validate_patient_info(),
            Err(ValidationError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_existing_patient_is_reused() {
        let first = form().to_records("user-1", None).unwrap();

        let mut second_form = OnboardingForm::default();
        second_form.medications = vec![MedicationInput {
            name: "Vitamin D".to_string(),
            dosage: String::new(),
            frequency: "Daily".to_string(),
        }];

        let second = second_form
            .to_records("user-1", Some(first.patient.clone()))
            .unwrap();
        assert_eq!(second.patient.id, first.patient.id);
        assert_eq!(second.treatments.len(), 1);
        assert_eq!(second.treatments[0].patient_id, first.patient.id);
        assert_eq!(second.treatments[0].dosage, None);
    }

    #[test]
    fn test_blank_specialty_and_relationship_get_defaults() {
        let provider = ProviderInput {
            name: "Dr. Okafor".to_string(),
            specialty: "  ".to_string(),
            phone: "555-0199".to_string(),
        }
        .to_provider(Uuid::new_v4(), Uuid::new_v4())
        .unwrap();
        assert_eq!(provider.specialization, DEFAULT_SPECIALIZATION);

        let member = FamilyMemberInput {
            name: "Alex".to_string(),
            relationship: String::new(),
            phone: "555-0111".to_string(),
        }
        .to_family_member(Uuid::new_v4(), Uuid::new_v4())
        .unwrap();
        assert_eq!(member.relationship, DEFAULT_RELATIONSHIP);
    }

    #[test]
    fn test_apply_patient_info_keeps_identity() {
        let mut patient = form().to_records("user-1", None).unwrap().patient;
        let id = patient.id;

        let edit = PatientInfoInput {
            name: "Sam Rivera-Cole".to_string(),
            date_of_birth: "1985-04-12".to_string(),
            contact: "555-0200".to_string(),
            address: "12 Elm St".to_string(),
            ..Default::default()
        };
        edit.apply_to(&mut patient).unwrap();
        assert_eq!(patient.id, id);
        assert_eq!(patient.user_id, "user-1");
        assert_eq!(patient.name, "Sam Rivera-Cole");
        assert_eq!(patient.address.as_deref(), Some("12 Elm St"));

        let invalid = PatientInfoInput {
            name: String::new(),
            ..edit
        };
        assert!(invalid.apply_to(&mut patient).is_err());
        assert_eq!(patient.name, "Sam Rivera-Cole");
    }
}

use std::collections::HashMap;

use uuid::Uuid;

use super::{BackendResult, RecoveryBackend};
use crate::error::BackendError;
use crate::models::{FamilyMember, HealthcareProvider, Patient, RecoveryScoreRecord, Treatment, UserProfile};

#[derive(Debug, Clone)]
struct StoredLog {
    patient_id: Uuid,
    record: RecoveryScoreRecord,
}

/// In-process backend holding everything in maps
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    profiles: HashMap<String, UserProfile>,
    patients: HashMap<Uuid, Patient>,
    treatments: Vec<Treatment>,
    providers: HashMap<Uuid, HealthcareProvider>,
    family_members: Vec<FamilyMember>,
    // Insertion order
    logs: Vec<StoredLog>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored recovery logs across all patients
    pub fn log_count(&self) -> usize {
        self.logs.len()
    }
}

fn not_found(table: &str, id: Uuid) -> BackendError {
    BackendError::NotFound {
        table: table.to_string(),
        id: id.to_string(),
    }
}

impl RecoveryBackend for MemoryBackend {
    fn profile_by_user_id(&self, user_id: &str) -> BackendResult<Option<UserProfile>> {
        Ok(self.profiles.get(user_id).cloned())
    }

    fn profile_by_username(&self, username: &str) -> BackendResult<Option<UserProfile>> {
        Ok(self.profiles.values().find(|p| p.username == username).cloned())
    }

    fn save_profile(&mut self, profile: &UserProfile) -> BackendResult<()> {
        let taken = self
            .profiles
            .values()
            .any(|p| p.username == profile.username && p.user_id != profile.user_id);
        if taken {
            return Err(BackendError::Duplicate {
                table: "profiles".to_string(),
                key: profile.username.clone(),
            });
        }

        self.profiles.insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    fn patient_for_user(&self, user_id: &str) -> BackendResult<Option<Patient>> {
        Ok(self.patients.values().find(|p| p.user_id == user_id).cloned())
    }

    fn save_patient(&mut self, patient: &Patient) -> BackendResult<()> {
        let linked_elsewhere = self
            .patients
            .values()
            .any(|p| p.user_id == patient.user_id && p.id != patient.id);
        if linked_elsewhere {
            return Err(BackendError::Duplicate {
                table: "patients".to_string(),
                key: patient.user_id.clone(),
            });
        }

        self.patients.insert(patient.id, patient.clone());
        Ok(())
    }

    fn treatments(&self, patient_id: Uuid) -> BackendResult<Vec<Treatment>> {
        Ok(self
            .treatments
            .iter()
            .filter(|t| t.patient_id == patient_id)
            .cloned()
            .collect())
    }

    fn save_treatment(&mut self, treatment: &Treatment) -> BackendResult<()> {
        if !self.patients.contains_key(&treatment.patient_id) {
            return Err(not_found("patients", treatment.patient_id));
        }

        match self.treatments.iter_mut().find(|t| t.id == treatment.id) {
            Some(existing) if existing.patient_id != treatment.patient_id => {
                return Err(not_found("treatments", treatment.id));
            }
            Some(existing) => *existing = treatment.clone(),
            None => self.treatments.push(treatment.clone()),
        }
        Ok(())
    }

    fn delete_treatment(&mut self, patient_id: Uuid, treatment_id: Uuid) -> BackendResult<()> {
        let before = self.treatments.len();
        self.treatments
            .retain(|t| !(t.id == treatment_id && t.patient_id == patient_id));
        if self.treatments.len() == before {
            return Err(not_found("treatments", treatment_id));
        }
        Ok(())
    }

    fn provider(&self, patient_id: Uuid) -> BackendResult<Option<HealthcareProvider>> {
        Ok(self.providers.get(&patient_id).cloned())
    }

    fn save_provider(&mut self, provider: &HealthcareProvider) -> BackendResult<()> {
        if !self.patients.contains_key(&provider.patient_id) {
            return Err(not_found("patients", provider.patient_id));
        }

        self.providers.insert(provider.patient_id, provider.clone());
        Ok(())
    }

    fn family_members(&self, patient_id: Uuid) -> BackendResult<Vec<FamilyMember>> {
        Ok(self
            .family_members
            .iter()
            .filter(|m| m.patient_id == patient_id)
            .cloned()
            .collect())
    }

    fn save_family_member(&mut self, member: &FamilyMember) -> BackendResult<()> {
        if !self.patients.contains_key(&member.patient_id) {
            return Err(not_found("patients", member.patient_id));
        }

        match self.family_members.iter_mut().find(|m| m.id == member.id) {
            Some(existing) if existing.patient_id != member.patient_id => {
                return Err(not_found("family_members", member.id));
            }
            Some(existing) => *existing = member.clone(),
            None => self.family_members.push(member.clone()),
        }
        Ok(())
    }

    fn delete_family_member(&mut self, patient_id: Uuid, member_id: Uuid) -> BackendResult<()> {
        let before = self.family_members.len();
        self.family_members
            .retain(|m| !(m.id == member_id && m.patient_id == patient_id));
        if self.family_members.len() == before {
            return Err(not_found("family_members", member_id));
        }
        Ok(())
    }

    fn insert_recovery_log(&mut self, patient_id: Uuid, record: &RecoveryScoreRecord) -> BackendResult<Uuid> {
        if !self.patients.contains_key(&patient_id) {
            return Err(not_found("patients", patient_id));
        }

        let id = Uuid::new_v4();
        self.logs.push(StoredLog {
            patient_id,
            record: record.clone(),
        });
        Ok(id)
    }

    fn import_batch(
        &mut self,
        patient_id: Uuid,
        records: &[RecoveryScoreRecord],
        treatments: &[Treatment],
    ) -> BackendResult<()> {
        if !self.patients.contains_key(&patient_id) {
            return Err(not_found("patients", patient_id));
        }

        // Check everything first so a failure leaves no partial import
        for treatment in treatments {
            if treatment.patient_id != patient_id {
                return Err(BackendError::ConstraintViolation {
                    constraint: format!("treatment {} not owned by patient {}", treatment.id, patient_id),
                });
            }
            if self
                .treatments
                .iter()
                .any(|t| t.id == treatment.id && t.patient_id != patient_id)
            {
                return Err(not_found("treatments", treatment.id));
            }
        }

        self.logs.extend(records.iter().map(|record| StoredLog {
            patient_id,
            record: record.clone(),
        }));
        for treatment in treatments {
            self.save_treatment(treatment)?;
        }
        Ok(())
    }

    fn recovery_logs(&self, patient_id: Uuid, limit: Option<usize>) -> BackendResult<Vec<RecoveryScoreRecord>> {
        let mut records: Vec<RecoveryScoreRecord> = self
            .logs
            .iter()
            .filter(|log| log.patient_id == patient_id)
            .map(|log| log.record.clone())
            .collect();

        // Stable: same-date logs keep insertion order
        records.sort_by_key(|r| r.date);

        if let Some(limit) = limit {
            let start = records.len().saturating_sub(limit);
            records.drain(..start);
        }

        Ok(records)
    }
}

//! Session-scoped recovery tracking
//!
//! [`RecoveryTracker`] is constructed once with a backend client and handed
//! to whatever needs it. Each call takes the [`AuthSession`] it acts for and
//! resolves that user's patient record before touching any data.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::backend::RecoveryBackend;
use crate::error::{BackendError, RecoveryError, Result, ValidationError};
use crate::legacy::LegacyExport;
use crate::models::{
    AuthSession, FamilyMember, HealthcareProvider, Patient, PatientProfile, RecoveryScoreRecord, Treatment,
    UserProfile,
};
use crate::onboarding::{FamilyMemberInput, MedicationInput, OnboardingForm, PatientInfoInput, ProviderInput};
use crate::score::RecoveryScoreCalculator;
use crate::trend::{HistoryWindow, RecoveryOverview, RecoverySummary, TrendAggregator, WEEKLY_WINDOW};
use crate::validation::{MetricFormInput, MetricValidator};

/// Figures shown on the dashboard cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub patient_name: String,

    /// Latest logged metrics, 0 when nothing has been logged
    pub pain_level: u8,
    pub mobility_scale: u8,
    pub mental_health_index: u8,

    /// Days since the first recovery log
    pub days_in_recovery: i64,

    pub active_treatments: usize,

    /// Summary of the last week of logs
    pub summary: RecoverySummary,
}

/// Result of importing a legacy export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyImportReport {
    pub logs_imported: usize,
    pub treatments_imported: usize,
    /// One message per rejected row
    pub rejected: Vec<String>,
}

fn not_found(table: &str, id: Uuid) -> RecoveryError {
    BackendError::NotFound {
        table: table.to_string(),
        id: id.to_string(),
    }
    .into()
}

/// Recovery tracking client bound to one backend
pub struct RecoveryTracker<B: RecoveryBackend> {
    backend: B,
}

impl<B: RecoveryBackend> RecoveryTracker<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    fn require_patient(&self, session: &AuthSession) -> Result<Patient> {
        self.backend
            .patient_for_user(&session.user_id)?
            .ok_or_else(|| RecoveryError::PatientNotFound {
                user_id: session.user_id.clone(),
            })
    }

    /// Create the profile for a newly signed-up user
    #[instrument(skip(self))]
    pub fn register_profile(&mut self, user_id: &str, username: &str) -> Result<UserProfile> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ValidationError::MissingField {
                field: "username".to_string(),
            }
            .into());
        }

        if let Some(existing) = self.backend.profile_by_username(username)? {
            if existing.user_id != user_id {
                return Err(BackendError::Duplicate {
                    table: "profiles".to_string(),
                    key: username.to_string(),
                }
                .into());
            }
        }

        let now = Utc::now();
        let created_at = self
            .backend
            .profile_by_user_id(user_id)?
            .map_or(now, |p| p.created_at);

        let profile = UserProfile {
            user_id: user_id.to_string(),
            username: username.to_string(),
            created_at,
            updated_at: now,
        };
        self.backend.save_profile(&profile)?;

        tracing::info!(user_id, username, "Profile saved");
        Ok(profile)
    }

    /// Persist the onboarding wizard for the session user
    ///
    /// An existing patient record is kept; only the medications, provider and
    /// family contacts from the form are added to it.
    #[instrument(skip(self, session, form), fields(user_id = %session.user_id))]
    pub fn complete_onboarding(&mut self, session: &AuthSession, form: &OnboardingForm) -> Result<Patient> {
        let existing = self.backend.patient_for_user(&session.user_id)?;
        let is_new = existing.is_none();
        let records = form.to_records(&session.user_id, existing)?;

        if is_new {
            self.backend.save_patient(&records.patient)?;
        }
        for treatment in &records.treatments {
            self.backend.save_treatment(treatment)?;
        }
        if let Some(provider) = &records.provider {
            self.backend.save_provider(provider)?;
        }
        for member in &records.family_members {
            self.backend.save_family_member(member)?;
        }

        tracing::info!(
            patient_id = %records.patient.id,
            new_patient = is_new,
            treatments = records.treatments.len(),
            family_members = records.family_members.len(),
            "Onboarding completed"
        );
        Ok(records.patient)
    }

    /// Validate, score and store one day's metrics
    #[instrument(skip(self, session, form), fields(user_id = %session.user_id))]
    pub fn log_metrics(
        &mut self,
        session: &AuthSession,
        form: &MetricFormInput,
        date: NaiveDate,
    ) -> Result<RecoveryScoreRecord> {
        let entry = MetricValidator::validate(form, date)?;
        let patient = self.require_patient(session)?;

        let record = RecoveryScoreCalculator::score_entry(&entry);
        self.backend.insert_recovery_log(patient.id, &record)?;

        tracing::info!(%date, score = record.recovery_score, "Recovery metrics logged");
        Ok(record)
    }

    /// Date-ascending logs inside `window`
    pub fn recovery_history(&self, session: &AuthSession, window: HistoryWindow) -> Result<Vec<RecoveryScoreRecord>> {
        let patient = self.require_patient(session)?;
        Ok(self.backend.recovery_logs(patient.id, Some(window.days()))?)
    }

    /// Summary and chart series for `window`
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub fn recovery_overview(&self, session: &AuthSession, window: HistoryWindow) -> Result<RecoveryOverview> {
        let history = self.recovery_history(session, window)?;
        let overview = TrendAggregator::overview(&history, window);

        tracing::debug!(
            entries = overview.series.len(),
            current = overview.summary.current_score,
            weekly_average = overview.summary.weekly_average,
            "Computed recovery overview"
        );
        Ok(overview)
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub fn dashboard(&self, session: &AuthSession, today: NaiveDate) -> Result<DashboardSnapshot> {
        let patient = self.require_patient(session)?;
        let recent = self.backend.recovery_logs(patient.id, Some(WEEKLY_WINDOW))?;
        let first = self.backend.first_recovery_log(patient.id)?;
        let treatments = self.backend.treatments(patient.id)?;

        let days_in_recovery = first.map_or(0, |r| (today - r.date).num_days().max(0));
        let latest = recent.last();

        Ok(DashboardSnapshot {
            patient_name: patient.name,
            pain_level: latest.map_or(0, |r| r.pain_level),
            mobility_scale: latest.map_or(0, |r| r.mobility_scale),
            mental_health_index: latest.map_or(0, |r| r.mental_health_index),
            days_in_recovery,
            active_treatments: treatments.iter().filter(|t| t.is_active_on(today)).count(),
            summary: TrendAggregator::summarize(&recent),
        })
    }

    pub fn profile_overview(&self, session: &AuthSession) -> Result<PatientProfile> {
        let patient = self.require_patient(session)?;

        Ok(PatientProfile {
            provider: self.backend.provider(patient.id)?,
            family_members: self.backend.family_members(patient.id)?,
            treatments: self.backend.treatments(patient.id)?,
            patient,
        })
    }

    /// Replace the editable patient details
    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub fn update_patient_info(&mut self, session: &AuthSession, input: &PatientInfoInput) -> Result<Patient> {
        let mut patient = self.require_patient(session)?;
        input.apply_to(&mut patient)?;
        self.backend.save_patient(&patient)?;

        tracing::info!(patient_id = %patient.id, "Patient details updated");
        Ok(patient)
    }

    /// Create the patient's provider, or update the one already on file
    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub fn save_provider(&mut self, session: &AuthSession, input: &ProviderInput) -> Result<HealthcareProvider> {
        let patient = self.require_patient(session)?;
        let existing = self.backend.provider(patient.id)?;

        let id = existing.as_ref().map_or_else(Uuid::new_v4, |p| p.id);
        let mut provider = input.to_provider(id, patient.id)?;
        if let Some(existing) = existing {
            provider.credentials = existing.credentials;
            provider.schedule = existing.schedule;
        }
        self.backend.save_provider(&provider)?;

        tracing::info!(provider_id = %provider.id, "Provider saved");
        Ok(provider)
    }

    /// Add a family contact, or edit `member_id` when given
    ///
    /// Only the session patient's own contacts can be edited.
    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub fn upsert_family_member(
        &mut self,
        session: &AuthSession,
        member_id: Option<Uuid>,
        input: &FamilyMemberInput,
    ) -> Result<FamilyMember> {
        let patient = self.require_patient(session)?;
        let id = match member_id {
            Some(id) => {
                let owned = self.backend.family_members(patient.id)?.iter().any(|m| m.id == id);
                if !owned {
                    return Err(not_found("family_members", id));
                }
                id
            }
            None => Uuid::new_v4(),
        };

        let member = input.to_family_member(id, patient.id)?;
        self.backend.save_family_member(&member)?;

        tracing::info!(member_id = %member.id, edited = member_id.is_some(), "Family member saved");
        Ok(member)
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub fn remove_family_member(&mut self, session: &AuthSession, member_id: Uuid) -> Result<()> {
        let patient = self.require_patient(session)?;
        self.backend.delete_family_member(patient.id, member_id)?;

        tracing::info!(%member_id, "Family member removed");
        Ok(())
    }

    /// Add a medication, or edit `treatment_id` when given
    ///
    /// Editing changes the name, dosage and frequency; the type and dates of
    /// the stored treatment are kept.
    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub fn upsert_treatment(
        &mut self,
        session: &AuthSession,
        treatment_id: Option<Uuid>,
        input: &MedicationInput,
    ) -> Result<Treatment> {
        let patient = self.require_patient(session)?;
        let treatment = match treatment_id {
            Some(id) => {
                let existing = self
                    .backend
                    .treatments(patient.id)?
                    .into_iter()
                    .find(|t| t.id == id)
                    .ok_or_else(|| not_found("treatments", id))?;
                let edited = input.to_treatment(id, patient.id)?;
                Treatment {
                    name: edited.name,
                    dosage: edited.dosage,
                    frequency: edited.frequency,
                    ..existing
                }
            }
            None => input.to_treatment(Uuid::new_v4(), patient.id)?,
        };
        self.backend.save_treatment(&treatment)?;

        tracing::info!(treatment_id = %treatment.id, edited = treatment_id.is_some(), "Treatment saved");
        Ok(treatment)
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub fn remove_treatment(&mut self, session: &AuthSession, treatment_id: Uuid) -> Result<()> {
        let patient = self.require_patient(session)?;
        self.backend.delete_treatment(patient.id, treatment_id)?;

        tracing::info!(%treatment_id, "Treatment removed");
        Ok(())
    }

    /// Migrate rows from the old untyped layout into the session user's record
    ///
    /// Rows that fail to decode are reported and skipped. The decoded rows are
    /// stored as one batch: if the backend rejects any of them, nothing is
    /// imported.
    #[instrument(skip(self, session, export), fields(user_id = %session.user_id))]
    pub fn import_legacy_logs(&mut self, session: &AuthSession, export: &LegacyExport) -> Result<LegacyImportReport> {
        let patient = self.require_patient(session)?;
        let outcome = export.decode(patient.id);

        self.backend
            .import_batch(patient.id, &outcome.records, &outcome.treatments)?;

        for rejected in &outcome.rejected {
            tracing::warn!(error = %rejected, "Skipped legacy row");
        }

        Ok(LegacyImportReport {
            logs_imported: outcome.records.len(),
            treatments_imported: outcome.treatments.len(),
            rejected: outcome.rejected.iter().map(ToString::to_string).collect(),
        })
    }
}

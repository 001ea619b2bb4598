//! Persistence and auth backend seam
//!
//! The managed backend owns storage, authentication and row-level access
//! control. [`RecoveryBackend`] is the slice of it this crate talks to. Two
//! implementations ship with the crate:
//!
//! - [`MemoryBackend`]: process-local maps, for tests and demos
//! - [`SqliteBackend`]: a single SQLite file, used by the CLI
//!
//! Every backend returns recovery logs date-ascending, which is the order the
//! trend aggregator expects.

use uuid::Uuid;

use crate::error::BackendError;
use crate::models::{FamilyMember, HealthcareProvider, Patient, RecoveryScoreRecord, Treatment, UserProfile};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

pub type BackendResult<T> = Result<T, BackendError>;

/// Operations consumed from the persistence/auth service
pub trait RecoveryBackend {
    /// Profile for an authenticated user
    fn profile_by_user_id(&self, user_id: &str) -> BackendResult<Option<UserProfile>>;

    /// Profile lookup used by username sign-in
    fn profile_by_username(&self, username: &str) -> BackendResult<Option<UserProfile>>;

    /// Create or replace a profile; fails with `Duplicate` on a taken username
    fn save_profile(&mut self, profile: &UserProfile) -> BackendResult<()>;

    fn patient_for_user(&self, user_id: &str) -> BackendResult<Option<Patient>>;

    /// Create or replace a patient by id
    fn save_patient(&mut self, patient: &Patient) -> BackendResult<()>;

    fn treatments(&self, patient_id: Uuid) -> BackendResult<Vec<Treatment>>;

    /// Create or update a treatment by id
    ///
    /// An id already owned by another patient is left untouched and reported
    /// as `NotFound`.
    fn save_treatment(&mut self, treatment: &Treatment) -> BackendResult<()>;

    /// Remove one of the patient's treatments; `NotFound` if it is not theirs
    fn delete_treatment(&mut self, patient_id: Uuid, treatment_id: Uuid) -> BackendResult<()>;

    fn provider(&self, patient_id: Uuid) -> BackendResult<Option<HealthcareProvider>>;

    /// Create or replace the patient's provider
    fn save_provider(&mut self, provider: &HealthcareProvider) -> BackendResult<()>;

    fn family_members(&self, patient_id: Uuid) -> BackendResult<Vec<FamilyMember>>;

    /// Same ownership rule as [`RecoveryBackend::save_treatment`]
    fn save_family_member(&mut self, member: &FamilyMember) -> BackendResult<()>;

    fn delete_family_member(&mut self, patient_id: Uuid, member_id: Uuid) -> BackendResult<()>;

    /// Append a scored day, returning the new log id
    fn insert_recovery_log(&mut self, patient_id: Uuid, record: &RecoveryScoreRecord) -> BackendResult<Uuid>;

    /// Store logs and treatments for one patient, all or nothing
    fn import_batch(
        &mut self,
        patient_id: Uuid,
        records: &[RecoveryScoreRecord],
        treatments: &[Treatment],
    ) -> BackendResult<()>;

    /// Logs ordered by date ascending, restricted to the most recent `limit`
    fn recovery_logs(&self, patient_id: Uuid, limit: Option<usize>) -> BackendResult<Vec<RecoveryScoreRecord>>;

    /// The oldest log, if any
    fn first_recovery_log(&self, patient_id: Uuid) -> BackendResult<Option<RecoveryScoreRecord>> {
        Ok(self.recovery_logs(patient_id, None)?.into_iter().next())
    }
}

use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

use super::{BackendResult, RecoveryBackend};
use crate::error::BackendError;
use crate::models::{
    FamilyMember, HealthcareProvider, Patient, RecoveryScoreRecord, Treatment, TreatmentType, UserProfile,
};

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS profiles (
    user_id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS patients (
    id BLOB PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    date_of_birth DATE NOT NULL,
    gender TEXT,
    contact TEXT NOT NULL,
    address TEXT,
    medical_history TEXT,
    lifestyle_factors TEXT
);

CREATE TABLE IF NOT EXISTS treatments (
    id BLOB PRIMARY KEY,
    patient_id BLOB NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    treatment_type TEXT NOT NULL,
    name TEXT NOT NULL,
    dosage TEXT,
    frequency TEXT,
    duration_days INTEGER,
    start_date DATE,
    end_date DATE
);

CREATE TABLE IF NOT EXISTS providers (
    id BLOB PRIMARY KEY,
    patient_id BLOB NOT NULL UNIQUE REFERENCES patients(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    specialization TEXT NOT NULL,
    contact TEXT NOT NULL,
    credentials TEXT,
    schedule TEXT
);

CREATE TABLE IF NOT EXISTS family_members (
    id BLOB PRIMARY KEY,
    patient_id BLOB NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    relationship TEXT NOT NULL,
    contact TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS recovery_logs (
    id BLOB PRIMARY KEY,
    patient_id BLOB NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    date DATE NOT NULL,
    recovery_score INTEGER NOT NULL CHECK (recovery_score BETWEEN 0 AND 100),
    pain_level INTEGER NOT NULL CHECK (pain_level BETWEEN 0 AND 10),
    mobility_scale INTEGER NOT NULL CHECK (mobility_scale BETWEEN 0 AND 10),
    mental_health_index INTEGER NOT NULL CHECK (mental_health_index BETWEEN 0 AND 10),
    heart_rate INTEGER
);

CREATE INDEX IF NOT EXISTS idx_recovery_logs_patient_date ON recovery_logs(patient_id, date);
CREATE INDEX IF NOT EXISTS idx_treatments_patient ON treatments(patient_id);
CREATE INDEX IF NOT EXISTS idx_family_members_patient ON family_members(patient_id);
"#;

/// Backend stored in a single SQLite database
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Create or open a database at the specified path
    pub fn open<P: AsRef<Path>>(db_path: P) -> BackendResult<Self> {
        let conn = Connection::open(db_path.as_ref())?;
        tracing::debug!(path = %db_path.as_ref().display(), "Opened recovery database");
        Self::with_connection(conn)
    }

    /// Private in-memory database
    pub fn in_memory() -> BackendResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> BackendResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn ensure_patient(&self, patient_id: Uuid) -> BackendResult<()> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?1)",
            params![patient_id],
            |row| row.get(0),
        )?;

        if !exists {
            return Err(BackendError::NotFound {
                table: "patients".to_string(),
                id: patient_id.to_string(),
            });
        }
        Ok(())
    }
}

/// Translate constraint failures into typed backend errors
fn write_error(table: &str, key: &str, err: rusqlite::Error) -> BackendError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE => {
            BackendError::Duplicate {
                table: table.to_string(),
                key: key.to_string(),
            }
        }
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            BackendError::ConstraintViolation {
                constraint: msg.clone().unwrap_or_else(|| format!("{} {}", table, key)),
            }
        }
        _ => BackendError::Sqlite(err),
    }
}

/// `NotFound` when a write or delete touched no row
fn deleted_or_not_found(affected: usize, table: &str, id: Uuid) -> BackendResult<()> {
    if affected == 0 {
        return Err(BackendError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Insert or update a treatment, only ever touching rows owned by its patient
fn upsert_treatment(conn: &Connection, treatment: &Treatment) -> BackendResult<()> {
    let affected = conn
        .execute(
            r#"
            INSERT INTO treatments (
                id, patient_id, treatment_type, name, dosage, frequency,
                duration_days, start_date, end_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                treatment_type = excluded.treatment_type,
                name = excluded.name,
                dosage = excluded.dosage,
                frequency = excluded.frequency,
                duration_days = excluded.duration_days,
                start_date = excluded.start_date,
                end_date = excluded.end_date
            WHERE treatments.patient_id = excluded.patient_id
            "#,
            params![
                treatment.id,
                treatment.patient_id,
                treatment.treatment_type.as_str(),
                treatment.name,
                treatment.dosage,
                treatment.frequency,
                treatment.duration_days,
                treatment.start_date,
                treatment.end_date,
            ],
        )
        .map_err(|e| write_error("treatments", &treatment.id.to_string(), e))?;
    deleted_or_not_found(affected, "treatments", treatment.id)
}

fn insert_log(conn: &Connection, patient_id: Uuid, record: &RecoveryScoreRecord) -> BackendResult<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        r#"
        INSERT INTO recovery_logs (
            id, patient_id, date, recovery_score, pain_level, mobility_scale,
            mental_health_index, heart_rate
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            id,
            patient_id,
            record.date,
            record.recovery_score,
            record.pain_level,
            record.mobility_scale,
            record.mental_health_index,
            record.heart_rate,
        ],
    )
    .map_err(|e| write_error("recovery_logs", &id.to_string(), e))?;

    tracing::debug!(%patient_id, date = %record.date, score = record.recovery_score, "Stored recovery log");
    Ok(id)
}

fn profile_from_row(row: &Row) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        user_id: row.get(0)?,
        username: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn patient_from_row(row: &Row) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        date_of_birth: row.get(3)?,
        gender: row.get(4)?,
        contact: row.get(5)?,
        address: row.get(6)?,
        medical_history: row.get(7)?,
        lifestyle_factors: row.get(8)?,
    })
}

fn treatment_from_row(row: &Row) -> rusqlite::Result<Treatment> {
    let treatment_type: String = row.get(2)?;
    Ok(Treatment {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        treatment_type: TreatmentType::from_label(&treatment_type),
        name: row.get(3)?,
        dosage: row.get(4)?,
        frequency: row.get(5)?,
        duration_days: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
    })
}

fn provider_from_row(row: &Row) -> rusqlite::Result<HealthcareProvider> {
    Ok(HealthcareProvider {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        name: row.get(2)?,
        specialization: row.get(3)?,
        contact: row.get(4)?,
        credentials: row.get(5)?,
        schedule: row.get(6)?,
    })
}

fn family_member_from_row(row: &Row) -> rusqlite::Result<FamilyMember> {
    Ok(FamilyMember {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        name: row.get(2)?,
        relationship: row.get(3)?,
        contact: row.get(4)?,
    })
}

fn record_from_row(row: &Row) -> rusqlite::Result<RecoveryScoreRecord> {
    Ok(RecoveryScoreRecord {
        date: row.get(0)?,
        recovery_score: row.get(1)?,
        pain_level: row.get(2)?,
        mobility_scale: row.get(3)?,
        mental_health_index: row.get(4)?,
        heart_rate: row.get(5)?,
    })
}

impl RecoveryBackend for SqliteBackend {
    fn profile_by_user_id(&self, user_id: &str) -> BackendResult<Option<UserProfile>> {
        Ok(self
            .conn
            .query_row(
                "SELECT user_id, username, created_at, updated_at FROM profiles WHERE user_id = ?1",
                params![user_id],
                profile_from_row,
            )
            .optional()?)
    }

    fn profile_by_username(&self, username: &str) -> BackendResult<Option<UserProfile>> {
        Ok(self
            .conn
            .query_row(
                "SELECT user_id, username, created_at, updated_at FROM profiles WHERE username = ?1",
                params![username],
                profile_from_row,
            )
            .optional()?)
    }

    fn save_profile(&mut self, profile: &UserProfile) -> BackendResult<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO profiles (user_id, username, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id) DO UPDATE SET
                    username = excluded.username,
                    updated_at = excluded.updated_at
                "#,
                params![profile.user_id, profile.username, profile.created_at, profile.updated_at],
            )
            .map_err(|e| write_error("profiles", &profile.username, e))?;
        Ok(())
    }

    fn patient_for_user(&self, user_id: &str) -> BackendResult<Option<Patient>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, user_id, name, date_of_birth, gender, contact, address,
                       medical_history, lifestyle_factors
                FROM patients
                WHERE user_id = ?1
                "#,
                params![user_id],
                patient_from_row,
            )
            .optional()?)
    }

    fn save_patient(&mut self, patient: &Patient) -> BackendResult<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO patients (
                    id, user_id, name, date_of_birth, gender, contact, address,
                    medical_history, lifestyle_factors
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(id) DO UPDATE SET
                    user_id = excluded.user_id,
                    name = excluded.name,
                    date_of_birth = excluded.date_of_birth,
                    gender = excluded.gender,
                    contact = excluded.contact,
                    address = excluded.address,
                    medical_history = excluded.medical_history,
                    lifestyle_factors = excluded.lifestyle_factors
                "#,
                params![
                    patient.id,
                    patient.user_id,
                    patient.name,
                    patient.date_of_birth,
                    patient.gender,
                    patient.contact,
                    patient.address,
                    patient.medical_history,
                    patient.lifestyle_factors,
                ],
            )
            .map_err(|e| write_error("patients", &patient.user_id, e))?;
        Ok(())
    }

    fn treatments(&self, patient_id: Uuid) -> BackendResult<Vec<Treatment>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_id, treatment_type, name, dosage, frequency,
                   duration_days, start_date, end_date
            FROM treatments
            WHERE patient_id = ?1
            ORDER BY rowid
            "#,
        )?;
        let rows = stmt.query_map(params![patient_id], treatment_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn save_treatment(&mut self, treatment: &Treatment) -> BackendResult<()> {
        self.ensure_patient(treatment.patient_id)?;
        upsert_treatment(&self.conn, treatment)
    }

    fn delete_treatment(&mut self, patient_id: Uuid, treatment_id: Uuid) -> BackendResult<()> {
        let affected = self.conn.execute(
            "DELETE FROM treatments WHERE id = ?1 AND patient_id = ?2",
            params![treatment_id, patient_id],
        )?;
        deleted_or_not_found(affected, "treatments", treatment_id)
    }

    fn provider(&self, patient_id: Uuid) -> BackendResult<Option<HealthcareProvider>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, patient_id, name, specialization, contact, credentials, schedule
                FROM providers
                WHERE patient_id = ?1
                "#,
                params![patient_id],
                provider_from_row,
            )
            .optional()?)
    }

    fn save_provider(&mut self, provider: &HealthcareProvider) -> BackendResult<()> {
        self.ensure_patient(provider.patient_id)?;
        // One provider per patient: replace whatever is there
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM providers WHERE patient_id = ?1", params![provider.patient_id])?;
        tx.execute(
            r#"
            INSERT INTO providers (
                id, patient_id, name, specialization, contact, credentials, schedule
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                provider.id,
                provider.patient_id,
                provider.name,
                provider.specialization,
                provider.contact,
                provider.credentials,
                provider.schedule,
            ],
        )
        .map_err(|e| write_error("providers", &provider.id.to_string(), e))?;
        tx.commit()?;
        Ok(())
    }

    fn family_members(&self, patient_id: Uuid) -> BackendResult<Vec<FamilyMember>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_id, name, relationship, contact
            FROM family_members
            WHERE patient_id = ?1
            ORDER BY rowid
            "#,
        )?;
        let rows = stmt.query_map(params![patient_id], family_member_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn save_family_member(&mut self, member: &FamilyMember) -> BackendResult<()> {
        self.ensure_patient(member.patient_id)?;
        let affected = self
            .conn
            .execute(
                r#"
                INSERT INTO family_members (id, patient_id, name, relationship, contact)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    relationship = excluded.relationship,
                    contact = excluded.contact
                WHERE family_members.patient_id = excluded.patient_id
                "#,
                params![member.id, member.patient_id, member.name, member.relationship, member.contact],
            )
            .map_err(|e| write_error("family_members", &member.id.to_string(), e))?;
        // Zero rows: the id belongs to another patient
        deleted_or_not_found(affected, "family_members", member.id)
    }

    fn delete_family_member(&mut self, patient_id: Uuid, member_id: Uuid) -> BackendResult<()> {
        let affected = self.conn.execute(
            "DELETE FROM family_members WHERE id = ?1 AND patient_id = ?2",
            params![member_id, patient_id],
        )?;
        deleted_or_not_found(affected, "family_members", member_id)
    }

    fn insert_recovery_log(&mut self, patient_id: Uuid, record: &RecoveryScoreRecord) -> BackendResult<Uuid> {
        self.ensure_patient(patient_id)?;
        insert_log(&self.conn, patient_id, record)
    }

    fn import_batch(
        &mut self,
        patient_id: Uuid,
        records: &[RecoveryScoreRecord],
        treatments: &[Treatment],
    ) -> BackendResult<()> {
        self.ensure_patient(patient_id)?;

        let tx = self.conn.transaction()?;
        for record in records {
            insert_log(&tx, patient_id, record)?;
        }
        for treatment in treatments {
            if treatment.patient_id != patient_id {
                return Err(BackendError::ConstraintViolation {
                    constraint: format!("treatment {} not owned by patient {}", treatment.id, patient_id),
                });
            }
            upsert_treatment(&tx, treatment)?;
        }
        tx.commit()?;

        tracing::debug!(%patient_id, logs = records.len(), treatments = treatments.len(), "Committed import batch");
        Ok(())
    }

    fn recovery_logs(&self, patient_id: Uuid, limit: Option<usize>) -> BackendResult<Vec<RecoveryScoreRecord>> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, recovery_score, pain_level, mobility_scale, mental_health_index, heart_rate
            FROM recovery_logs
            WHERE patient_id = ?1
            ORDER BY date DESC, rowid DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![patient_id, limit], record_from_row)?;
        let mut records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        records.reverse();
        Ok(records)
    }

    fn first_recovery_log(&self, patient_id: Uuid) -> BackendResult<Option<RecoveryScoreRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT date, recovery_score, pain_level, mobility_scale, mental_health_index, heart_rate
                FROM recovery_logs
                WHERE patient_id = ?1
                ORDER BY date ASC, rowid ASC
                LIMIT 1
                "#,
                params![patient_id],
                record_from_row,
            )
            .optional()?)
    }
}

use chrono::{Duration, NaiveDate};
use recoveryrs::export::{export_history, ExportFormat};
use recoveryrs::legacy::{LegacyExport, LegacyRecoveryLogRow, LegacyTreatmentRow};
use recoveryrs::onboarding::{FamilyMemberInput, MedicationInput, OnboardingForm, PatientInfoInput, ProviderInput};
use recoveryrs::{
    AuthSession, HistoryWindow, MemoryBackend, MetricFormInput, RecoveryBackend, RecoveryError, RecoveryTracker,
    SqliteBackend,
};

/// Integration tests that run complete tracker workflows against each backend

#[cfg(test)]
mod integration_tests {
    use super::*;

    fn start_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
    }

    fn onboarding_form() -> OnboardingForm {
        OnboardingForm {
            patient: PatientInfoInput {
                name: "Jordan Lee".to_string(),
                date_of_birth: "1979-11-30".to_string(),
                contact: "555-0142".to_string(),
                medical_history: "ACL reconstruction".to_string(),
                ..Default::default()
            },
            medications: vec![
                MedicationInput {
                    name: "Naproxen".to_string(),
                    dosage: "250mg".to_string(),
                    frequency: "Twice daily".to_string(),
                },
                // Blank rows from the wizard are ignored
                MedicationInput::default(),
            ],
            provider: ProviderInput {
                name: "Dr. Patel".to_string(),
                specialty: "Orthopedics".to_string(),
                phone: "555-0199".to_string(),
            },
            family_members: vec![FamilyMemberInput {
                name: "Casey Lee".to_string(),
                relationship: "Spouse".to_string(),
                phone: "555-0143".to_string(),
            }],
        }
    }

    fn metrics(pain: i64, mobility: i64, mental: i64) -> MetricFormInput {
        MetricFormInput {
            pain_level: pain,
            mobility_scale: mobility,
            mental_health_index: mental,
            heart_rate: "68".to_string(),
        }
    }

    /// Register, onboard and log ten improving days
    fn seed<B: RecoveryBackend>(tracker: &mut RecoveryTracker<B>, session: &AuthSession) {
        tracker.register_profile(&session.user_id, "jordan").unwrap();
        tracker.complete_onboarding(session, &onboarding_form()).unwrap();

        for day in 0..10 {
            let pain = 9 - day;
            let mobility = day;
            tracker
                .log_metrics(session, &metrics(pain, mobility, 5), start_date() + Duration::days(day))
                .unwrap();
        }
    }

    fn check_full_workflow<B: RecoveryBackend>(backend: B) {
        let mut tracker = RecoveryTracker::new(backend);
        let session = AuthSession::new("auth-jordan");
        seed(&mut tracker, &session);

        // Day n scores round((100 - (9-n)*10 + n*10 + 50) / 3)
        let history = tracker.recovery_history(&session, HistoryWindow::Month).unwrap();
        assert_eq!(history.len(), 10);
        assert!(history.windows(2).all(|w| w[0].date <= w[1].date));
        assert_eq!(history[0].recovery_score, 20);
        assert_eq!(history[9].recovery_score, 80);

        let week = tracker.recovery_overview(&session, HistoryWindow::Week).unwrap();
        assert_eq!(week.series.len(), 7);
        assert_eq!(week.series[0].date, start_date() + Duration::days(3));
        assert_eq!(week.summary.current_score, 80);
        assert_eq!(week.summary.previous_score, 73);
        assert_eq!(week.summary.score_change, 7);
        assert!(week.summary.is_improved);
        // 40, 47, 53, 60, 67, 73, 80
        assert_eq!(week.summary.weekly_average, 60);

        let today = start_date() + Duration::days(14);
        let dashboard = tracker.dashboard(&session, today).unwrap();
        assert_eq!(dashboard.patient_name, "Jordan Lee");
        assert_eq!(dashboard.pain_level, 0);
        assert_eq!(dashboard.mobility_scale, 9);
        assert_eq!(dashboard.days_in_recovery, 14);
        assert_eq!(dashboard.active_treatments, 1);
        assert_eq!(dashboard.summary, week.summary);

        let profile = tracker.profile_overview(&session).unwrap();
        assert_eq!(profile.treatments.len(), 1);
        assert_eq!(profile.treatments[0].dosage.as_deref(), Some("250mg"));
        assert_eq!(profile.provider.as_ref().map(|p| p.name.as_str()), Some("Dr. Patel"));
        assert_eq!(profile.family_members.len(), 1);
    }

    #[test]
    fn test_full_workflow_memory_backend() {
        check_full_workflow(MemoryBackend::new());
    }

    #[test]
    fn test_full_workflow_sqlite_backend() {
        check_full_workflow(SqliteBackend::in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_history_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("recovery.db");
        let session = AuthSession::new("auth-jordan");

        {
            let mut tracker = RecoveryTracker::new(SqliteBackend::open(&db_path).unwrap());
            seed(&mut tracker, &session);
        }

        let tracker = RecoveryTracker::new(SqliteBackend::open(&db_path).unwrap());
        let overview = tracker.recovery_overview(&session, HistoryWindow::Fortnight).unwrap();
        assert_eq!(overview.series.len(), 10);
        assert_eq!(overview.last_updated, Some(start_date() + Duration::days(9)));
    }

    #[test]
    fn test_users_are_isolated() {
        let mut tracker = RecoveryTracker::new(MemoryBackend::new());
        let jordan = AuthSession::new("auth-jordan");
        seed(&mut tracker, &jordan);

        let other = AuthSession::new("auth-other");
        tracker.complete_onboarding(&other, &onboarding_form()).unwrap();

        let overview = tracker.recovery_overview(&other, HistoryWindow::Month).unwrap();
        assert!(overview.series.is_empty());
        assert_eq!(overview.summary.current_score, 0);
        assert_eq!(overview.summary.weekly_average, 0);
        assert!(overview.summary.is_improved);
    }

    #[test]
    fn test_logging_before_onboarding_fails() {
        let mut tracker = RecoveryTracker::new(SqliteBackend::in_memory().unwrap());
        let session = AuthSession::new("auth-new");

        let err = tracker
            .log_metrics(&session, &MetricFormInput::default(), start_date())
            .unwrap_err();
        assert!(matches!(err, RecoveryError::PatientNotFound { .. }));
        assert!(err.user_message().contains("complete your profile"));
    }

    #[test]
    fn test_declining_day_is_not_improved() {
        let mut tracker = RecoveryTracker::new(MemoryBackend::new());
        let session = AuthSession::new("auth-jordan");
        seed(&mut tracker, &session);

        tracker
            .log_metrics(&session, &metrics(8, 2, 3), start_date() + Duration::days(10))
            .unwrap();

        let summary = tracker.recovery_overview(&session, HistoryWindow::Week).unwrap().summary;
        // round((100 - 80 + 20 + 30) / 3) = 23
        assert_eq!(summary.current_score, 23);
        assert_eq!(summary.score_change, -57);
        assert!(!summary.is_improved);
        assert_eq!(summary.trend_label(), "57% decreased");
    }

    #[test]
    fn test_legacy_import() {
        let mut tracker = RecoveryTracker::new(SqliteBackend::in_memory().unwrap());
        let session = AuthSession::new("auth-jordan");
        tracker.complete_onboarding(&session, &OnboardingForm {
            medications: Vec::new(),
            provider: ProviderInput::default(),
            family_members: Vec::new(),
            ..onboarding_form()
        })
        .unwrap();

        let export = LegacyExport {
            recoverylogs: vec![
                LegacyRecoveryLogRow {
                    logid: "b".to_string(),
                    date: "2024-09-02".to_string(),
                    painlevels: Some("3".to_string()),
                    mobilitystatus: Some("7".to_string()),
                    notes: Some("Mental Health Index: 8/10".to_string()),
                    vitalsigns: Some(r#"{"heartRate": 64}"#.to_string()),
                    ..Default::default()
                },
                LegacyRecoveryLogRow {
                    logid: "a".to_string(),
                    date: "2024-09-01".to_string(),
                    painlevels: Some("6".to_string()),
                    mobilitystatus: Some("4".to_string()),
                    notes: Some("Mental Health Index: 5/10".to_string()),
                    adherence: Some("43".to_string()),
                    ..Default::default()
                },
                LegacyRecoveryLogRow {
                    logid: "bad".to_string(),
                    date: "yesterday".to_string(),
                    ..Default::default()
                },
            ],
            treatments: vec![LegacyTreatmentRow {
                treatmentid: "t1".to_string(),
                treatmenttype: "Medication".to_string(),
                medication: Some("Ibuprofen".to_string()),
                therapy: Some("No dosage - As needed".to_string()),
                ..Default::default()
            }],
        };

        let report = tracker.import_legacy_logs(&session, &export).unwrap();
        assert_eq!(report.logs_imported, 2);
        assert_eq!(report.treatments_imported, 1);
        assert_eq!(report.rejected.len(), 1);

        let history = tracker.recovery_history(&session, HistoryWindow::Week).unwrap();
        let scores: Vec<u8> = history.iter().map(|r| r.recovery_score).collect();
        assert_eq!(scores, vec![43, 73]);
        assert_eq!(history[1].heart_rate, Some(64));

        let treatments = tracker.profile_overview(&session).unwrap().treatments;
        assert_eq!(treatments[0].dosage, None);
        assert_eq!(treatments[0].frequency.as_deref(), Some("As needed"));
    }

    fn legacy_medication(treatmentid: &str, name: &str) -> LegacyExport {
        LegacyExport {
            recoverylogs: Vec::new(),
            treatments: vec![LegacyTreatmentRow {
                treatmentid: treatmentid.to_string(),
                treatmenttype: "Medication".to_string(),
                medication: Some(name.to_string()),
                therapy: Some("10mg - Daily".to_string()),
                ..Default::default()
            }],
        }
    }

    fn check_shared_legacy_treatment_id<B: RecoveryBackend>(backend: B) {
        let mut tracker = RecoveryTracker::new(backend);
        let alice = AuthSession::new("auth-alice");
        let bob = AuthSession::new("auth-bob");
        tracker.complete_onboarding(&alice, &onboarding_form()).unwrap();
        tracker.complete_onboarding(&bob, &onboarding_form()).unwrap();

        // Both dumps carry the same valid UUID as treatmentid
        let shared_id = "7d444840-9dc0-11d1-b245-5ffdce74fad2";
        tracker
            .import_legacy_logs(&alice, &legacy_medication(shared_id, "Alice-med"))
            .unwrap();
        tracker
            .import_legacy_logs(&bob, &legacy_medication(shared_id, "Bob-med"))
            .unwrap();

        let names = |session: &AuthSession| -> Vec<String> {
            tracker
                .profile_overview(session)
                .unwrap()
                .treatments
                .into_iter()
                .map(|t| t.name)
                .collect()
        };
        assert_eq!(names(&alice), vec!["Naproxen", "Alice-med"]);
        assert_eq!(names(&bob), vec!["Naproxen", "Bob-med"]);

        let alice_ids: Vec<_> = tracker.profile_overview(&alice).unwrap().treatments.iter().map(|t| t.id).collect();
        let bob_ids: Vec<_> = tracker.profile_overview(&bob).unwrap().treatments.iter().map(|t| t.id).collect();
        assert!(alice_ids.iter().all(|id| !bob_ids.contains(id)));
    }

    #[test]
    fn test_shared_legacy_treatment_id_memory_backend() {
        check_shared_legacy_treatment_id(MemoryBackend::new());
    }

    #[test]
    fn test_shared_legacy_treatment_id_sqlite_backend() {
        check_shared_legacy_treatment_id(SqliteBackend::in_memory().unwrap());
    }

    #[test]
    fn test_profile_editing_is_scoped_to_session() {
        let mut tracker = RecoveryTracker::new(SqliteBackend::in_memory().unwrap());
        let alice = AuthSession::new("auth-alice");
        let bob = AuthSession::new("auth-bob");
        tracker.complete_onboarding(&alice, &onboarding_form()).unwrap();
        tracker.complete_onboarding(&bob, &onboarding_form()).unwrap();

        let alice_profile = tracker.profile_overview(&alice).unwrap();
        let alice_med = alice_profile.treatments[0].clone();
        let alice_member = alice_profile.family_members[0].clone();

        let edit = MedicationInput {
            name: "Bob-med".to_string(),
            dosage: String::new(),
            frequency: "Daily".to_string(),
        };
        let err = tracker.upsert_treatment(&bob, Some(alice_med.id), &edit).unwrap_err();
        assert!(err.user_message().contains("treatments"));
        assert!(tracker.remove_treatment(&bob, alice_med.id).is_err());
        assert!(tracker.remove_family_member(&bob, alice_member.id).is_err());

        let after = tracker.profile_overview(&alice).unwrap();
        assert_eq!(after.treatments, vec![alice_med.clone()]);
        assert_eq!(after.family_members, vec![alice_member]);

        // The owner can edit and remove
        let edited = tracker.upsert_treatment(&alice, Some(alice_med.id), &edit).unwrap();
        assert_eq!(edited.id, alice_med.id);
        tracker.remove_treatment(&alice, alice_med.id).unwrap();
        assert!(tracker.profile_overview(&alice).unwrap().treatments.is_empty());
        assert_eq!(tracker.profile_overview(&bob).unwrap().treatments.len(), 1);

        let provider = tracker
            .save_provider(&alice, &ProviderInput {
                name: "Dr. Chen".to_string(),
                specialty: String::new(),
                phone: "555-0177".to_string(),
            })
            .unwrap();
        assert_eq!(provider.specialization, "General");
        assert_eq!(
            tracker.profile_overview(&bob).unwrap().provider.map(|p| p.name),
            Some("Dr. Patel".to_string())
        );
    }

    #[test]
    fn test_export_window_as_csv() {
        let mut tracker = RecoveryTracker::new(MemoryBackend::new());
        let session = AuthSession::new("auth-jordan");
        seed(&mut tracker, &session);

        let overview = tracker.recovery_overview(&session, HistoryWindow::Week).unwrap();
        let mut buffer = Vec::new();
        export_history(&overview.series, ExportFormat::Csv, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 8);
        assert!(text.lines().last().unwrap().starts_with("2024-10-10,Oct 10,80,"));
    }
}

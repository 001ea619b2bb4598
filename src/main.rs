use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};
use uuid::Uuid;

use recoveryrs::config::AppConfig;
use recoveryrs::error::{ErrorSeverity, ExportError};
use recoveryrs::export::{export_history, ExportFormat};
use recoveryrs::legacy::LegacyExport;
use recoveryrs::logging::init_logging;
use recoveryrs::onboarding::{FamilyMemberInput, MedicationInput, OnboardingForm, PatientInfoInput, ProviderInput};
use recoveryrs::trend::ChartPoint;
use recoveryrs::{
    AuthSession, HistoryWindow, MetricFormInput, RecoveryError, RecoverySummary, RecoveryTracker, SqliteBackend,
};

/// recoveryrs - Post-treatment recovery tracker
///
/// Logs daily pain, mobility and mental-health ratings, scores each day out
/// of 100, and reports how recovery is trending.
#[derive(Parser)]
#[command(name = "recoveryrs")]
#[command(version)]
#[command(about = "Recovery tracking CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Authenticated user id
    #[arg(short, long, env = "RECOVERYRS_USER", global = true)]
    user: Option<String>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or rename the profile for the current user
    Register {
        username: String,
    },

    /// Complete onboarding from a JSON form
    Onboard {
        /// Form file with patient, medications, provider and family_members
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Log today's recovery metrics
    Log {
        /// Pain level, 0 (none) to 10 (worst)
        #[arg(short, long)]
        pain: i64,

        /// Mobility, 0 (immobile) to 10 (full)
        #[arg(short, long)]
        mobility: i64,

        /// Mental health, 0 (poor) to 10 (excellent)
        #[arg(short = 'H', long)]
        mental: i64,

        /// Resting heart rate in BPM
        #[arg(short = 'r', long = "heart-rate")]
        heart_rate: String,

        /// Date of the entry (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Show the recovery summary
    Summary {
        /// History window: 7, 14 or 30 days
        #[arg(short, long)]
        window: Option<HistoryWindow>,
    },

    /// Show scored days in the window
    History {
        /// History window: 7, 14 or 30 days
        #[arg(short, long)]
        window: Option<HistoryWindow>,
    },

    /// Show dashboard figures
    Dashboard,

    /// Export the history window
    Export {
        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format (csv, json)
        #[arg(short = 'f', long, default_value = "csv")]
        format: ExportFormat,

        #[arg(short, long)]
        window: Option<HistoryWindow>,
    },

    /// Import recovery logs and treatments from a legacy JSON dump
    ImportLegacy {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show the patient profile
    Profile,

    /// Edit patient details; omitted fields keep their current value
    UpdatePatient {
        #[arg(long)]
        name: Option<String>,

        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: Option<String>,

        #[arg(long)]
        contact: Option<String>,

        #[arg(long)]
        gender: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        medical_history: Option<String>,

        #[arg(long)]
        lifestyle: Option<String>,
    },

    /// Set the healthcare provider
    Provider {
        #[arg(long)]
        name: String,

        /// Specialty (default General)
        #[arg(long, default_value = "")]
        specialty: String,

        #[arg(long)]
        phone: String,
    },

    /// Manage family contacts
    Family {
        #[command(subcommand)]
        action: FamilyAction,
    },

    /// Manage medications
    Medication {
        #[command(subcommand)]
        action: MedicationAction,
    },

    /// Show or initialize the configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand)]
enum FamilyAction {
    /// Add a family contact
    Add {
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        relationship: String,

        #[arg(long)]
        phone: String,
    },

    /// Replace a family contact
    Edit {
        id: Uuid,

        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        relationship: String,

        #[arg(long)]
        phone: String,
    },

    Remove {
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum MedicationAction {
    /// Add a medication
    Add {
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        dosage: String,

        #[arg(long)]
        frequency: String,
    },

    /// Change name, dosage and frequency of a medication
    Edit {
        id: Uuid,

        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        dosage: String,

        #[arg(long)]
        frequency: String,
    },

    Remove {
        id: Uuid,
    },
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Id")]
    id: Uuid,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Details")]
    details: String,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Score")]
    score: u8,
    #[tabled(rename = "Pain")]
    pain: u8,
    #[tabled(rename = "Mobility")]
    mobility: u8,
    #[tabled(rename = "Mental")]
    mental: u8,
    #[tabled(rename = "HR")]
    heart_rate: String,
}

impl From<&ChartPoint> for HistoryRow {
    fn from(point: &ChartPoint) -> Self {
        Self {
            date: point.formatted_date.clone(),
            score: point.recovery_score,
            pain: point.pain_level,
            mobility: point.mobility_scale,
            mental: point.mental_health_index,
            heart_rate: point.heart_rate.map_or_else(|| "-".to_string(), |hr| hr.to_string()),
        }
    }
}

#[derive(Tabled)]
struct FigureRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn figure(metric: &'static str, value: impl ToString) -> FigureRow {
    FigureRow {
        metric,
        value: value.to_string(),
    }
}

fn print_table<T: Tabled>(rows: impl IntoIterator<Item = T>) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

fn trend_text(summary: &RecoverySummary) -> ColoredString {
    if summary.is_improved {
        summary.trend_label().green()
    } else {
        summary.trend_label().red()
    }
}

fn session(user: Option<String>) -> Result<AuthSession> {
    let user = user.context("No user given; pass --user or set RECOVERYRS_USER")?;
    Ok(AuthSession::new(user))
}

fn open_tracker(config: &AppConfig) -> Result<RecoveryTracker<SqliteBackend>> {
    let db_path = config.database_file();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
    }

    let backend = SqliteBackend::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    Ok(RecoveryTracker::new(backend))
}

/// Surface service failures with the message the user should see
fn friendly(err: RecoveryError) -> anyhow::Error {
    match err.severity() {
        ErrorSeverity::Warning => tracing::warn!(error = %err, "Command rejected"),
        ErrorSeverity::Error => tracing::error!(error = %err, "Command failed"),
    }
    anyhow::anyhow!(err.user_message())
}

fn export_failed(err: ExportError) -> anyhow::Error {
    friendly(err.into())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    init_logging(&config.logging.clone().with_verbosity(cli.verbose))?;

    let today = Local::now().date_naive();

    match cli.command {
        Commands::Config { init } => {
            if init {
                let path = cli.config.unwrap_or_else(AppConfig::default_config_path);
                config.save_to_file(&path)?;
                println!("{} {}", "✓ Configuration written to".green(), path.display());
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }

        Commands::Register { username } => {
            let user = session(cli.user)?;
            let mut tracker = open_tracker(&config)?;
            let profile = tracker.register_profile(&user.user_id, &username).map_err(friendly)?;
            println!("{} {}", "✓ Profile saved for".green(), profile.username.bold());
        }

        Commands::Onboard { file } => {
            let user = session(cli.user)?;
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read onboarding form: {}", file.display()))?;
            let form: OnboardingForm = serde_json::from_str(&content).context("Invalid onboarding form")?;

            let mut tracker = open_tracker(&config)?;
            let patient = tracker.complete_onboarding(&user, &form).map_err(friendly)?;
            println!("{} {}", "✓ Onboarding completed for".green(), patient.name.bold());
        }

        Commands::Log {
            pain,
            mobility,
            mental,
            heart_rate,
            date,
        } => {
            let user = session(cli.user)?;
            let form = MetricFormInput {
                pain_level: pain,
                mobility_scale: mobility,
                mental_health_index: mental,
                heart_rate,
            };

            let mut tracker = open_tracker(&config)?;
            let record = tracker
                .log_metrics(&user, &form, date.unwrap_or(today))
                .map_err(friendly)?;
            println!(
                "{} {} {}",
                "✓ Logged".green(),
                record.date,
                format!("recovery score {}/100", record.recovery_score).bold()
            );
        }

        Commands::Summary { window } => {
            let user = session(cli.user)?;
            let window = window.unwrap_or(config.settings.default_window);
            let tracker = open_tracker(&config)?;
            let overview = tracker.recovery_overview(&user, window).map_err(friendly)?;
            let summary = overview.summary;

            println!("{}", format!("Recovery summary ({})", window).cyan().bold());
            print_table([
                figure("Current score", summary.current_score),
                figure("Previous score", summary.previous_score),
                figure("Weekly average", summary.weekly_average),
            ]);
            println!("Trend: {}", trend_text(&summary));
            match overview.last_updated {
                Some(date) => println!("{}", format!("Last updated {}", date).dimmed()),
                None => println!("{}", "No recovery logs yet".dimmed()),
            }
        }

        Commands::History { window } => {
            let user = session(cli.user)?;
            let window = window.unwrap_or(config.settings.default_window);
            let tracker = open_tracker(&config)?;
            let overview = tracker.recovery_overview(&user, window).map_err(friendly)?;

            println!("{}", format!("Recovery history ({})", window).cyan().bold());
            if overview.series.is_empty() {
                println!("{}", "No recovery logs yet".dimmed());
            } else {
                print_table(overview.series.iter().map(HistoryRow::from));
            }
        }

        Commands::Dashboard => {
            let user = session(cli.user)?;
            let tracker = open_tracker(&config)?;
            let dashboard = tracker.dashboard(&user, today).map_err(friendly)?;

            println!("{}", format!("Welcome back, {}", dashboard.patient_name).magenta().bold());
            print_table([
                figure("Pain level", format!("{}/10", dashboard.pain_level)),
                figure("Mobility", format!("{}/10", dashboard.mobility_scale)),
                figure("Mental health", format!("{}/10", dashboard.mental_health_index)),
                figure("Days in recovery", dashboard.days_in_recovery),
                figure("Active treatments", dashboard.active_treatments),
                figure("Recovery score", dashboard.summary.current_score),
                figure("Weekly average", dashboard.summary.weekly_average),
            ]);
            println!("Trend: {}", trend_text(&dashboard.summary));
        }

        Commands::Export { output, format, window } => {
            let user = session(cli.user)?;
            let window = window.unwrap_or(config.settings.default_window);
            let tracker = open_tracker(&config)?;
            let overview = tracker.recovery_overview(&user, window).map_err(friendly)?;

            match output {
                Some(path) => {
                    let file = fs::File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    export_history(&overview.series, format, file).map_err(export_failed)?;
                    eprintln!(
                        "{} {} rows to {}",
                        "✓ Exported".yellow(),
                        overview.series.len(),
                        path.display()
                    );
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut handle = stdout.lock();
                    export_history(&overview.series, format, &mut handle).map_err(export_failed)?;
                    handle.flush().map_err(|e| export_failed(e.into()))?;
                }
            }
        }

        Commands::ImportLegacy { file } => {
            let user = session(cli.user)?;
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read legacy export: {}", file.display()))?;
            let export: LegacyExport = serde_json::from_str(&content).context("Invalid legacy export")?;

            let mut tracker = open_tracker(&config)?;
            let report = tracker.import_legacy_logs(&user, &export).map_err(friendly)?;

            println!(
                "{} {} logs, {} treatments",
                "✓ Imported".green(),
                report.logs_imported,
                report.treatments_imported
            );
            for rejected in &report.rejected {
                println!("  {} {}", "skipped:".yellow(), rejected);
            }
        }

        Commands::Profile => {
            let user = session(cli.user)?;
            let tracker = open_tracker(&config)?;
            let profile = tracker.profile_overview(&user).map_err(friendly)?;
            let patient = &profile.patient;

            println!("{}", patient.name.magenta().bold());
            print_table([
                figure("Date of birth", patient.date_of_birth),
                figure("Contact", &patient.contact),
                figure("Gender", patient.gender.as_deref().unwrap_or("-")),
                figure("Address", patient.address.as_deref().unwrap_or("-")),
                figure("Medical history", patient.medical_history.as_deref().unwrap_or("-")),
                figure("Lifestyle", patient.lifestyle_factors.as_deref().unwrap_or("-")),
            ]);

            match &profile.provider {
                Some(provider) => println!(
                    "{} {} ({}), {}",
                    "Provider:".cyan(),
                    provider.name,
                    provider.specialization,
                    provider.contact
                ),
                None => println!("{}", "No provider on file".dimmed()),
            }

            println!("{}", "Medications".cyan().bold());
            print_table(profile.treatments.iter().map(|t| EntryRow {
                id: t.id,
                name: t.name.clone(),
                details: [t.dosage.as_deref(), t.frequency.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(", "),
            }));

            println!("{}", "Family contacts".cyan().bold());
            print_table(profile.family_members.iter().map(|m| EntryRow {
                id: m.id,
                name: m.name.clone(),
                details: format!("{}, {}", m.relationship, m.contact),
            }));
        }

        Commands::UpdatePatient {
            name,
            dob,
            contact,
            gender,
            address,
            medical_history,
            lifestyle,
        } => {
            let user = session(cli.user)?;
            let mut tracker = open_tracker(&config)?;
            let current = tracker.profile_overview(&user).map_err(friendly)?.patient;

            let input = PatientInfoInput {
                name: name.unwrap_or(current.name),
                date_of_birth: dob.unwrap_or_else(|| current.date_of_birth.to_string()),
                contact: contact.unwrap_or(current.contact),
                gender: gender.or(current.gender).unwrap_or_default(),
                address: address.or(current.address).unwrap_or_default(),
                medical_history: medical_history.or(current.medical_history).unwrap_or_default(),
                lifestyle_factors: lifestyle.or(current.lifestyle_factors).unwrap_or_default(),
            };
            let patient = tracker.update_patient_info(&user, &input).map_err(friendly)?;
            println!("{} {}", "✓ Updated details for".green(), patient.name.bold());
        }

        Commands::Provider { name, specialty, phone } => {
            let user = session(cli.user)?;
            let mut tracker = open_tracker(&config)?;
            let provider = tracker
                .save_provider(&user, &ProviderInput { name, specialty, phone })
                .map_err(friendly)?;
            println!("{} {}", "✓ Provider saved:".green(), provider.name.bold());
        }

        Commands::Family { action } => {
            let user = session(cli.user)?;
            let mut tracker = open_tracker(&config)?;
            match action {
                FamilyAction::Add { name, relationship, phone } => {
                    let input = FamilyMemberInput { name, relationship, phone };
                    let member = tracker.upsert_family_member(&user, None, &input).map_err(friendly)?;
                    println!("{} {} ({})", "✓ Added".green(), member.name.bold(), member.id);
                }
                FamilyAction::Edit {
                    id,
                    name,
                    relationship,
                    phone,
                } => {
                    let input = FamilyMemberInput { name, relationship, phone };
                    let member = tracker.upsert_family_member(&user, Some(id), &input).map_err(friendly)?;
                    println!("{} {}", "✓ Updated".green(), member.name.bold());
                }
                FamilyAction::Remove { id } => {
                    tracker.remove_family_member(&user, id).map_err(friendly)?;
                    println!("{} {}", "✓ Removed family contact".green(), id);
                }
            }
        }

        Commands::Medication { action } => {
            let user = session(cli.user)?;
            let mut tracker = open_tracker(&config)?;
            match action {
                MedicationAction::Add { name, dosage, frequency } => {
                    let input = MedicationInput { name, dosage, frequency };
                    let treatment = tracker.upsert_treatment(&user, None, &input).map_err(friendly)?;
                    println!("{} {} ({})", "✓ Added".green(), treatment.name.bold(), treatment.id);
                }
                MedicationAction::Edit {
                    id,
                    name,
                    dosage,
                    frequency,
                } => {
                    let input = MedicationInput { name, dosage, frequency };
                    let treatment = tracker.upsert_treatment(&user, Some(id), &input).map_err(friendly)?;
                    println!("{} {}", "✓ Updated".green(), treatment.name.bold());
                }
                MedicationAction::Remove { id } => {
                    tracker.remove_treatment(&user, id).map_err(friendly)?;
                    println!("{} {}", "✓ Removed medication".green(), id);
                }
            }
        }
    }

    Ok(())
}

//! `flourish`: command-line front end to the enrollment service.
//!
//! Reads `flourish.toml` (or the path given with `--config`) layered with
//! `FLOURISH_*` environment variables, opens the SQLite store, and runs one
//! operation. Record inputs are JSON files; results are printed as JSON.
//!
//! ```sh
//! flourish consent child-consent.json
//! FLOURISH_REFERENCE_DATE=2021-01-01 flourish consent child-consent.json
//! flourish visit enrollment-visit.json
//! ```

use std::{
  fs,
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use flourish_core::{
  consent::{NewAssent, NewConsent},
  dataset::{ChildDataset, MaternalDataset},
  feeding::NewInfantFeeding,
  visit::NewChildVisit,
};
use flourish_enrollment::{EnrollmentService, Settings};
use flourish_store_sqlite::SqliteStore;
use serde::{Serialize, de::DeserializeOwned};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Flourish child enrollment")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "flourish.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Load maternal and child dataset rows from JSON arrays.
  ImportDatasets {
    #[arg(long)]
    maternal: Option<PathBuf>,
    #[arg(long)]
    children: Option<PathBuf>,
  },
  /// Record a caregiver-child consent and assign the child a cohort.
  Consent { file: PathBuf },
  /// Place a child born in-study on the cohort A birth schedule.
  Birth {
    subject_identifier: String,
    #[arg(long)]
    dob:                NaiveDate,
  },
  /// Record a visit.
  Visit { file: PathBuf },
  /// List a subject's visits.
  Visits { subject_identifier: String },
  /// Take a subject off one schedule.
  OffSchedule {
    subject_identifier: String,
    schedule_name:      String,
    #[arg(long)]
    reason:             Option<String>,
  },
  /// List a subject's schedule memberships.
  Schedules { subject_identifier: String },
  /// Show the assent form for a subject.
  AssentForm { subject_identifier: String },
  /// Record a child assent.
  Assent { file: PathBuf },
  /// Show the defaults for a new infant feeding form.
  FeedingForm {
    subject_identifier: String,
    /// Report datetime of the form being opened (defaults to now).
    #[arg(long)]
    at:                 Option<DateTime<Utc>>,
  },
  /// Submit an infant feeding record.
  Feeding { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings: Settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("FLOURISH")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?
    .try_deserialize()
    .context("failed to deserialise Settings")?;

  let store_path = expand_tilde(&settings.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let service = EnrollmentService::new(Arc::new(store), &settings);

  match cli.command {
    Command::ImportDatasets { maternal, children } => {
      let maternal: Vec<MaternalDataset> = match maternal {
        Some(path) => read_json(&path)?,
        None => Vec::new(),
      };
      let children: Vec<ChildDataset> = match children {
        Some(path) => read_json(&path)?,
        None => Vec::new(),
      };
      print_json(&service.import_datasets(maternal, children).await?)
    }
    Command::Consent { file } => {
      let input: NewConsent = read_json(&file)?;
      let (consent, assignment) = service.record_consent(input).await?;
      print_json(&serde_json::json!({
        "consent":    consent,
        "assignment": assignment,
      }))
    }
    Command::Birth { subject_identifier, dob } => {
      print_json(&service.register_birth(&subject_identifier, dob).await?)
    }
    Command::Visit { file } => {
      let input: NewChildVisit = read_json(&file)?;
      print_json(&service.record_visit(input).await?)
    }
    Command::Visits { subject_identifier } => {
      print_json(&service.visits(&subject_identifier).await?)
    }
    Command::OffSchedule { subject_identifier, schedule_name, reason } => {
      let off = service
        .take_off_schedule(&subject_identifier, &schedule_name, reason, Utc::now())
        .await?;
      print_json(&off)
    }
    Command::Schedules { subject_identifier } => {
      print_json(&service.schedules(&subject_identifier).await?)
    }
    Command::AssentForm { subject_identifier } => {
      print_json(&service.assent_form(&subject_identifier).await?)
    }
    Command::Assent { file } => {
      let input: NewAssent = read_json(&file)?;
      print_json(&service.record_assent(input).await?)
    }
    Command::FeedingForm { subject_identifier, at } => {
      let at = at.unwrap_or_else(Utc::now);
      print_json(&service.infant_feeding_form(&subject_identifier, at).await?)
    }
    Command::Feeding { file } => {
      let input: NewInfantFeeding = read_json(&file)?;
      print_json(&service.submit_infant_feeding(input).await?)
    }
  }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
  let text = fs::read_to_string(path)
    .with_context(|| format!("failed to read {}", path.display()))?;
  serde_json::from_str(&text)
    .with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

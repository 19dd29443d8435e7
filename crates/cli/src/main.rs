use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use clinic_core::repositories::normalise_doctor_profile;
use clinic_core::slot::generate_weekday_slots;
use clinic_core::vitals::sanitize_vitals;
use clinic_core::{AllowLists, Ulid};
use clinic_types::Role;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic booking backend CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a new appointment identifier
    NewId,
    /// Sanitise a vitals payload and print the stored summary
    SanitizeVitals {
        /// JSON file holding the raw vitals object
        file: PathBuf,
    },
    /// Print the doctor profile a sign-up with this metadata would produce
    NormaliseProfile {
        /// Account role (PATIENT or DOCTOR)
        #[arg(long, default_value = "DOCTOR")]
        role: String,
        #[arg(long)]
        specialty: Option<String>,
        #[arg(long)]
        city: Option<String>,
        /// Comma-separated languages
        #[arg(long)]
        languages: Option<String>,
        /// JSON array of slot timestamps
        #[arg(long)]
        slots: Option<String>,
    },
    /// Print weekday availability as a JSON array for `doctorSlots`
    GenerateSlots {
        /// Number of calendar days to cover
        #[arg(long, default_value_t = 7)]
        days: u32,
        /// First day (YYYY-MM-DD); defaults to today (UTC)
        #[arg(long)]
        start: Option<NaiveDate>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::NewId) => {
            println!("{}", Ulid::generate());
        }
        Some(Commands::SanitizeVitals { file }) => {
            let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            match sanitize_vitals(&raw) {
                Ok(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                Err(e) => eprintln!("Invalid vitals in {}: {}", file.display(), e),
            }
        }
        Some(Commands::NormaliseProfile {
            role,
            specialty,
            city,
            languages,
            slots,
        }) => {
            let role: Role = role.parse()?;
            let metadata: BTreeMap<String, String> = [
                ("doctorSpecialty", specialty),
                ("doctorCity", city),
                ("doctorLanguages", languages),
                ("doctorSlots", slots),
            ]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
            .collect();

            let profile = normalise_doctor_profile(role, &metadata, &AllowLists::standard());
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Some(Commands::GenerateSlots { days, start }) => {
            let start = start.unwrap_or_else(|| Utc::now().date_naive());
            let slots = generate_weekday_slots(start, days);
            println!("{}", serde_json::to_string(&slots)?);
        }
        None => {
            println!("Use 'clinic --help' for commands");
        }
    }

    Ok(())
}

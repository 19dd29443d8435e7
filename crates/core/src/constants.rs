//! Constants used throughout the clinic core crate.
//!
//! The allow-lists here are the raw material for [`crate::config::AllowLists`]; handlers consult
//! the sets carried in `CoreConfig`, never these arrays directly.

/// Default table holding user records, keyed by `userId`.
pub const DEFAULT_USERS_TABLE: &str = "users";

/// Default table holding appointments, keyed by `appointmentId`.
pub const DEFAULT_APPOINTMENTS_TABLE: &str = "appointments";

/// Default table holding health-index snapshots, keyed by (`patientId`, `recordId`).
pub const DEFAULT_HEALTH_INDEX_TABLE: &str = "health-index";

/// Secondary index on appointments by (`doctorId`, `slotISO`).
pub const DOCTOR_SLOT_INDEX: &str = "GSI1";

/// Sort-key sentinel for the most recent health-index snapshot of a patient.
pub const LATEST_RECORD_ID: &str = "latest";

/// Event emitted once an appointment has been persisted.
pub const BOOKED_EVENT: &str = "BOOKED";

pub const MAX_ALLERGY_LEN: usize = 80;
pub const MAX_MEDICATIONS_LEN: usize = 240;
pub const MAX_EXTRA_FIELD_LEN: usize = 60;

/// Vitals every booking must carry.
pub const MANDATORY_VITALS: [&str; 5] = [
    "heightCm",
    "weightKg",
    "bloodPressureSystolic",
    "bloodPressureDiastolic",
    "heartRate",
];

/// Chief complaints a patient can book for, with the specialty each one is routed to.
pub const COMPLAINTS: [(&str, &str); 14] = [
    ("Chest pain", "Cardiology"),
    ("Shortness of breath", "Pulmonology"),
    ("Skin rash/itch", "Dermatology"),
    ("Headache/migraine", "Neurology"),
    ("Knee/shoulder/back pain", "Orthopedics"),
    ("Fever/cold/flu", "General Practice"),
    ("Eye irritation/blurred vision", "Ophthalmology"),
    ("Ear pain/sore throat", "ENT"),
    ("High blood sugar/diabetes follow-up", "Endocrinology"),
    ("Abdominal pain/acid reflux", "Gastroenterology"),
    ("Anxiety/depression check-in", "Psychiatry"),
    ("Urinary issues", "Urology"),
    ("Women\u{2019}s health consultation", "Gynecology"),
    ("Child vaccination/fever", "Pediatrics"),
];

pub const SPECIALTIES: [&str; 14] = [
    "Cardiology",
    "General Practice",
    "Dermatology",
    "Neurology",
    "Orthopedics",
    "Pediatrics",
    "Ophthalmology",
    "ENT",
    "Endocrinology",
    "Gastroenterology",
    "Psychiatry",
    "Pulmonology",
    "Urology",
    "Gynecology",
];

pub const LANGUAGES: [&str; 4] = ["English", "French", "German", "Spanish"];

pub const CITIES: [&str; 4] = ["Paris", "Lyon", "Marseille", "Toulouse"];

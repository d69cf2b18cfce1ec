//! Office roster: the patients, claims and care tasks shown on the board.
//!
//! The backend only exposes per-entity task endpoints, so the roster is read
//! from a JSON file or falls back to the built-in demo office.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: u64,
    pub name: String,
    pub dob: String,
    pub insurance: String,
    pub policy_number: String,
    pub status: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: u64,
    pub patient_name: String,
    pub claim_number: String,
    pub service_date: String,
    /// Display amount, e.g. `$1,250.00`.
    pub amount: String,
    pub status: String,
    pub days_pending: u32,
    pub reason: String,
}

impl Claim {
    /// Parse the display amount; unparsable amounts count as zero.
    pub fn amount_value(&self) -> f64 {
        parse_amount(&self.amount).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareTask {
    pub id: u64,
    pub patient_name: String,
    pub task_type: String,
    pub priority: String,
    pub due_date: String,
    pub status: String,
    pub contact_method: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub claims: Vec<Claim>,
    #[serde(default)]
    pub care_tasks: Vec<CareTask>,
}

pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    cleaned.parse::<f64>().ok()
}

/// Default roster location under the user config dir.
pub fn default_roster_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("careops").join("roster.json"))
}

/// Load the roster from `explicit`, else from the default location if present,
/// else return the demo office.
pub fn load(explicit: Option<&Path>) -> Result<Roster> {
    if let Some(p) = explicit {
        return load_file(p);
    }
    match default_roster_path() {
        Some(p) if p.exists() => load_file(&p),
        _ => Ok(demo()),
    }
}

fn load_file(path: &Path) -> Result<Roster> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("read roster {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parse roster {}", path.display()))
}

fn patient(id: u64, name: &str, dob: &str, insurance: &str, policy: &str, phone: &str) -> Patient {
    Patient {
        id,
        name: name.into(),
        dob: dob.into(),
        insurance: insurance.into(),
        policy_number: policy.into(),
        status: "pending_verification".into(),
        phone: phone.into(),
    }
}

#[allow(clippy::too_many_arguments)]
fn claim(
    id: u64,
    patient_name: &str,
    claim_number: &str,
    service_date: &str,
    amount: &str,
    status: &str,
    days_pending: u32,
    reason: &str,
) -> Claim {
    Claim {
        id,
        patient_name: patient_name.into(),
        claim_number: claim_number.into(),
        service_date: service_date.into(),
        amount: amount.into(),
        status: status.into(),
        days_pending,
        reason: reason.into(),
    }
}

#[allow(clippy::too_many_arguments)]
fn care_task(
    id: u64,
    patient_name: &str,
    task_type: &str,
    priority: &str,
    due_date: &str,
    contact_method: &str,
    phone: &str,
    email: &str,
    address: &str,
    notes: &str,
) -> CareTask {
    CareTask {
        id,
        patient_name: patient_name.into(),
        task_type: task_type.into(),
        priority: priority.into(),
        due_date: due_date.into(),
        status: "pending".into(),
        contact_method: contact_method.into(),
        phone: phone.into(),
        email: email.into(),
        address: address.into(),
        notes: notes.into(),
    }
}

/// The demo office the backend's mock data is keyed on.
pub fn demo() -> Roster {
    Roster {
        patients: vec![
            patient(1, "Sarah Johnson", "1985-03-15", "Blue Cross Blue Shield", "BC123456789", "(555) 123-4567"),
            patient(2, "Michael Chen", "1978-11-22", "Aetna", "AET987654321", "(555) 987-6543"),
            patient(3, "Emily Rodriguez", "1992-07-08", "UnitedHealthcare", "UHC456789123", "(555) 456-7890"),
            patient(4, "David Kim", "1990-12-03", "Cigna", "CIG789012345", "(555) 234-5678"),
            patient(5, "Lisa Thompson", "1987-05-20", "Humana", "HUM345678901", "(555) 345-6789"),
            patient(6, "Robert Wilson", "1975-09-14", "Kaiser Permanente", "KP567890123", "(555) 456-7890"),
            patient(7, "Maria Garcia", "1993-01-28", "Blue Cross Blue Shield", "BC678901234", "(555) 567-8901"),
            patient(8, "James Anderson", "1982-08-11", "Aetna", "AET890123456", "(555) 678-9012"),
        ],
        claims: vec![
            claim(101, "Amanda Foster", "CLM2024001", "2024-01-15", "$450.00", "denied", 12, "Missing prior authorization"),
            claim(102, "Brian Martinez", "CLM2024002", "2024-01-18", "$275.50", "pending", 8, "Under review"),
            claim(103, "Catherine Lee", "CLM2024003", "2024-01-20", "$125.00", "denied", 15, "Duplicate claim"),
            claim(104, "Daniel Park", "CLM2024004", "2024-01-22", "$680.75", "pending", 6, "Additional documentation requested"),
            claim(105, "Elena Vasquez", "CLM2024005", "2024-01-25", "$320.25", "denied", 18, "Service not covered"),
            claim(106, "Frank O'Connor", "CLM2024006", "2024-01-28", "$195.00", "pending", 4, "Processing delay"),
            claim(107, "Grace Liu", "CLM2024007", "2024-02-01", "$540.00", "denied", 22, "Incorrect billing code"),
            claim(108, "Henry Jackson", "CLM2024008", "2024-02-03", "$385.50", "pending", 10, "Awaiting provider response"),
        ],
        care_tasks: vec![
            care_task(201, "Jennifer Walsh", "Follow-up Appointment", "high", "2024-02-15", "phone", "(555) 111-2222", "j.walsh@email.com", "123 Oak St, Boston, MA", "Post-surgery follow-up required"),
            care_task(202, "Thomas Brown", "Lab Results Review", "medium", "2024-02-16", "email", "(555) 222-3333", "t.brown@email.com", "456 Pine Ave, Cambridge, MA", "Discuss cholesterol levels"),
            care_task(203, "Angela Martinez", "Medication Refill", "high", "2024-02-14", "phone", "(555) 333-4444", "a.martinez@email.com", "789 Elm Dr, Somerville, MA", "Diabetes medication running low"),
            care_task(204, "Kevin Lee", "Specialist Referral", "medium", "2024-02-17", "mail", "(555) 444-5555", "k.lee@email.com", "321 Maple Ln, Newton, MA", "Cardiology referral needed"),
            care_task(205, "Rachel Green", "Appointment Reminder", "low", "2024-02-18", "email", "(555) 555-6666", "r.green@email.com", "654 Cedar St, Brookline, MA", "Annual physical next week"),
            care_task(206, "Daniel Kim", "Test Scheduling", "high", "2024-02-15", "phone", "(555) 666-7777", "d.kim@email.com", "987 Birch Rd, Quincy, MA", "MRI scheduling urgent"),
            care_task(207, "Sophie Turner", "Care Plan Review", "medium", "2024-02-19", "mail", "(555) 777-8888", "s.turner@email.com", "147 Spruce Ave, Medford, MA", "Chronic condition management"),
            care_task(208, "Marcus Johnson", "Discharge Follow-up", "high", "2024-02-14", "phone", "(555) 888-9999", "m.johnson@email.com", "258 Willow St, Arlington, MA", "Post-hospital discharge check"),
        ],
    }
}

//! Filter and sort views over the board.
//!
//! Pure predicates and comparators; the visible eligible set they produce is
//! what a batch run iterates.

use crate::board::{Board, CardDetails, CardKind, CardStatus, EntityCard};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmountBand {
    #[default]
    All,
    /// Below $200.
    Low,
    /// $200 to $500 inclusive.
    Medium,
    /// Above $500.
    High,
}

impl AmountBand {
    pub fn matches(self, amount: f64) -> bool {
        match self {
            AmountBand::All => true,
            AmountBand::Low => amount < 200.0,
            AmountBand::Medium => (200.0..=500.0).contains(&amount),
            AmountBand::High => amount > 500.0,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(AmountBand::All),
            "low" => Some(AmountBand::Low),
            "medium" => Some(AmountBand::Medium),
            "high" => Some(AmountBand::High),
            _ => None,
        }
    }

    pub fn next(self) -> Self {
        match self {
            AmountBand::All => AmountBand::Low,
            AmountBand::Low => AmountBand::Medium,
            AmountBand::Medium => AmountBand::High,
            AmountBand::High => AmountBand::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AmountBand::All => "all",
            AmountBand::Low => "low",
            AmountBand::Medium => "medium",
            AmountBand::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatientSort {
    #[default]
    Name,
    Insurance,
    Dob,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimSort {
    #[default]
    Patient,
    /// Largest first.
    Amount,
    /// Longest pending first.
    Days,
    Date,
}

/// Per-kind filter settings. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardFilter {
    pub search: String,
    pub insurance: Option<String>,
    pub claim_status: Option<String>,
    pub amount: AmountBand,
    pub priority: Option<String>,
    pub task_type: Option<String>,
    pub contact: Option<String>,
}

fn eq_or_all(want: &Option<String>, have: &str) -> bool {
    want.as_deref().map_or(true, |w| w == have)
}

impl CardFilter {
    pub fn matches(&self, card: &EntityCard) -> bool {
        let search = self.search.to_lowercase();
        match &card.details {
            CardDetails::Patient(p) => {
                p.name.to_lowercase().contains(&search) && eq_or_all(&self.insurance, &p.insurance)
            }
            CardDetails::Claim(c) => {
                c.patient_name.to_lowercase().contains(&search)
                    && eq_or_all(&self.claim_status, &c.status)
                    && self.amount.matches(c.amount_value())
            }
            CardDetails::CareTask(t) => {
                eq_or_all(&self.priority, &t.priority)
                    && eq_or_all(&self.task_type, &t.task_type)
                    && eq_or_all(&self.contact, &t.contact_method)
            }
        }
    }
}

pub fn compare_patients(sort: PatientSort, a: &EntityCard, b: &EntityCard) -> Ordering {
    match (&a.details, &b.details) {
        (CardDetails::Patient(a), CardDetails::Patient(b)) => match sort {
            PatientSort::Name => a.name.cmp(&b.name),
            PatientSort::Insurance => a.insurance.cmp(&b.insurance),
            // ISO dates order lexicographically.
            PatientSort::Dob => a.dob.cmp(&b.dob),
        },
        _ => Ordering::Equal,
    }
}

pub fn compare_claims(sort: ClaimSort, a: &EntityCard, b: &EntityCard) -> Ordering {
    match (&a.details, &b.details) {
        (CardDetails::Claim(a), CardDetails::Claim(b)) => match sort {
            ClaimSort::Patient => a.patient_name.cmp(&b.patient_name),
            ClaimSort::Amount => b
                .amount_value()
                .partial_cmp(&a.amount_value())
                .unwrap_or(Ordering::Equal),
            ClaimSort::Days => b.days_pending.cmp(&a.days_pending),
            ClaimSort::Date => a.service_date.cmp(&b.service_date),
        },
        _ => Ordering::Equal,
    }
}

/// Sort order applied to one card list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardSort {
    Patients(PatientSort),
    Claims(ClaimSort),
    /// Care tasks keep roster order.
    Roster,
}

impl CardSort {
    pub fn default_for(kind: CardKind) -> Self {
        match kind {
            CardKind::Patient => CardSort::Patients(PatientSort::default()),
            CardKind::Claim => CardSort::Claims(ClaimSort::default()),
            CardKind::CareTask => CardSort::Roster,
        }
    }

    pub fn next(self) -> Self {
        match self {
            CardSort::Patients(PatientSort::Name) => CardSort::Patients(PatientSort::Insurance),
            CardSort::Patients(PatientSort::Insurance) => CardSort::Patients(PatientSort::Dob),
            CardSort::Patients(PatientSort::Dob) => CardSort::Patients(PatientSort::Name),
            CardSort::Claims(ClaimSort::Patient) => CardSort::Claims(ClaimSort::Amount),
            CardSort::Claims(ClaimSort::Amount) => CardSort::Claims(ClaimSort::Days),
            CardSort::Claims(ClaimSort::Days) => CardSort::Claims(ClaimSort::Date),
            CardSort::Claims(ClaimSort::Date) => CardSort::Claims(ClaimSort::Patient),
            CardSort::Roster => CardSort::Roster,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CardSort::Patients(PatientSort::Name) => "name",
            CardSort::Patients(PatientSort::Insurance) => "insurance",
            CardSort::Patients(PatientSort::Dob) => "date of birth",
            CardSort::Claims(ClaimSort::Patient) => "patient",
            CardSort::Claims(ClaimSort::Amount) => "amount",
            CardSort::Claims(ClaimSort::Days) => "days pending",
            CardSort::Claims(ClaimSort::Date) => "service date",
            CardSort::Roster => "roster order",
        }
    }

    fn compare(self, a: &EntityCard, b: &EntityCard) -> Ordering {
        match self {
            CardSort::Patients(s) => compare_patients(s, a, b),
            CardSort::Claims(s) => compare_claims(s, a, b),
            CardSort::Roster => Ordering::Equal,
        }
    }
}

/// Visible cards of `kind`, filtered and sorted (stable).
pub fn visible<'a>(
    board: &'a Board,
    kind: CardKind,
    filter: &CardFilter,
    sort: CardSort,
) -> Vec<&'a EntityCard> {
    let mut cards: Vec<&EntityCard> = board.cards(kind).filter(|c| filter.matches(c)).collect();
    cards.sort_by(|a, b| sort.compare(a, b));
    cards
}

/// Ids a batch run should iterate: visible cards still pending.
pub fn eligible_ids(board: &Board, kind: CardKind, filter: &CardFilter, sort: CardSort) -> Vec<u64> {
    visible(board, kind, filter, sort)
        .into_iter()
        .filter(|c| awaits_action(c))
        .map(|c| c.id)
        .collect()
}

/// Idle, and for claims only the ones still denied or pending.
fn awaits_action(card: &EntityCard) -> bool {
    card.status == CardStatus::Idle
        && match card.kind {
            CardKind::Claim => matches!(card.original_status.as_str(), "denied" | "pending"),
            CardKind::Patient | CardKind::CareTask => true,
        }
}

pub fn count_caption(kind: CardKind, visible: usize) -> String {
    match kind {
        CardKind::Patient => format!("{visible} patients pending verification"),
        CardKind::Claim => format!("{visible} claims need follow-up"),
        CardKind::CareTask => format!("{visible} tasks pending"),
    }
}

//! Entity cards and their visual status.
//!
//! The `Board` owns every card's visual status; the engine changes it only
//! through the projector operations below. `project` is the pure mapping from
//! a card's status to what the UI shows.

use crate::model::{TaskOutcome, Workflow};
use crate::roster::{CareTask, Claim, Patient, Roster};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Patient,
    Claim,
    CareTask,
}

impl CardKind {
    pub fn workflow(self) -> Workflow {
        match self {
            CardKind::Patient => Workflow::Verification,
            CardKind::Claim => Workflow::Followup,
            CardKind::CareTask => Workflow::Coordination,
        }
    }
}

/// Visual status of a card, independent of the persisted status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    /// Pending; also the restorable state after a stop or failure.
    Idle,
    InProgress,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Enabled(&'static str),
    Disabled(&'static str),
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub badge: String,
    pub badge_class: String,
    pub trigger: Trigger,
}

/// Map a card's status to badge text/class and trigger state.
pub fn project(kind: CardKind, status: CardStatus, original_status: &str) -> CardView {
    let view = |badge: &str, class: &str, trigger| CardView {
        badge: badge.to_string(),
        badge_class: class.to_string(),
        trigger,
    };
    let in_progress = Trigger::Disabled("🤖 In Progress...");
    match (kind, status) {
        (CardKind::Patient, CardStatus::Idle) => view(
            "Pending Verification",
            "status-pending",
            Trigger::Enabled("🎯 AI Verify Now"),
        ),
        (CardKind::Patient, CardStatus::InProgress) => {
            view("📞 AI Calling...", "status-calling", in_progress)
        }
        (CardKind::Patient, CardStatus::Succeeded) => {
            view("✅ Verified", "status-verified", Trigger::Hidden)
        }
        (CardKind::Patient, CardStatus::Failed) => {
            view("❌ Failed", "status-denied", Trigger::Hidden)
        }
        (CardKind::Claim, CardStatus::Idle) => CardView {
            badge: capitalize(original_status),
            badge_class: format!("status-{original_status}"),
            trigger: Trigger::Enabled("🔄 AI Follow-up Now"),
        },
        (CardKind::Claim, CardStatus::InProgress) => {
            view("🔄 AI Processing...", "status-processing", in_progress)
        }
        (CardKind::Claim, CardStatus::Succeeded) => {
            view("✅ Resolved", "status-resolved", Trigger::Hidden)
        }
        (CardKind::Claim, CardStatus::Failed) => {
            view("❌ Unresolved", "status-denied", Trigger::Hidden)
        }
        (CardKind::CareTask, CardStatus::Idle) => view(
            "Pending",
            "status-pending",
            Trigger::Enabled("🎯 AI Coordinate Now"),
        ),
        (CardKind::CareTask, CardStatus::InProgress) => {
            view("🔄 AI Processing...", "status-processing", in_progress)
        }
        (CardKind::CareTask, CardStatus::Succeeded) => {
            view("✅ Completed", "status-resolved", Trigger::Hidden)
        }
        (CardKind::CareTask, CardStatus::Failed) => {
            view("❌ Not Reached", "status-denied", Trigger::Hidden)
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardDetails {
    Patient(Patient),
    Claim(Claim),
    CareTask(CareTask),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityCard {
    pub kind: CardKind,
    pub id: u64,
    pub original_status: String,
    pub status: CardStatus,
    pub details: CardDetails,
}

impl EntityCard {
    fn new(kind: CardKind, id: u64, original_status: String, details: CardDetails) -> Self {
        Self {
            kind,
            id,
            original_status,
            status: CardStatus::Idle,
            details,
        }
    }

    pub fn title(&self) -> &str {
        match &self.details {
            CardDetails::Patient(p) => &p.name,
            CardDetails::Claim(c) => &c.patient_name,
            CardDetails::CareTask(t) => &t.patient_name,
        }
    }

    pub fn subtitle(&self) -> String {
        match &self.details {
            CardDetails::Patient(p) => format!("{} · {}", p.insurance, p.policy_number),
            CardDetails::Claim(c) => format!(
                "Claim: {} · {} · {} days",
                c.claim_number, c.amount, c.days_pending
            ),
            CardDetails::CareTask(t) => format!(
                "Task: {} · {} · {}",
                t.task_type, t.priority, t.contact_method
            ),
        }
    }

    /// Label shown in the monitor while this card's task runs.
    pub fn task_label(&self) -> String {
        match &self.details {
            CardDetails::Patient(p) => p.name.clone(),
            CardDetails::Claim(c) => format!("{} - {}", c.patient_name, c.claim_number),
            CardDetails::CareTask(t) => format!("{} - {}", t.patient_name, t.task_type),
        }
    }

    pub fn view(&self) -> CardView {
        project(self.kind, self.status, &self.original_status)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Board {
    cards: Vec<EntityCard>,
}

impl Board {
    pub fn from_roster(roster: &Roster) -> Self {
        let mut cards = Vec::new();
        for p in &roster.patients {
            cards.push(EntityCard::new(
                CardKind::Patient,
                p.id,
                p.status.clone(),
                CardDetails::Patient(p.clone()),
            ));
        }
        for c in &roster.claims {
            cards.push(EntityCard::new(
                CardKind::Claim,
                c.id,
                c.status.clone(),
                CardDetails::Claim(c.clone()),
            ));
        }
        for t in &roster.care_tasks {
            cards.push(EntityCard::new(
                CardKind::CareTask,
                t.id,
                t.status.clone(),
                CardDetails::CareTask(t.clone()),
            ));
        }
        Self { cards }
    }

    pub fn cards(&self, kind: CardKind) -> impl Iterator<Item = &EntityCard> {
        self.cards.iter().filter(move |c| c.kind == kind)
    }

    pub fn get(&self, kind: CardKind, id: u64) -> Option<&EntityCard> {
        self.cards.iter().find(|c| c.kind == kind && c.id == id)
    }

    fn get_mut(&mut self, kind: CardKind, id: u64) -> Option<&mut EntityCard> {
        self.cards.iter_mut().find(|c| c.kind == kind && c.id == id)
    }

    pub fn status(&self, kind: CardKind, id: u64) -> Option<CardStatus> {
        self.get(kind, id).map(|c| c.status)
    }

    pub fn mark_in_progress(&mut self, kind: CardKind, id: u64) {
        if let Some(card) = self.get_mut(kind, id) {
            card.status = CardStatus::InProgress;
        }
    }

    /// Move a card to its terminal variant for `outcome`.
    pub fn settle(&mut self, kind: CardKind, id: u64, outcome: &TaskOutcome) {
        if let Some(card) = self.get_mut(kind, id) {
            card.status = if outcome.is_success() {
                CardStatus::Succeeded
            } else {
                CardStatus::Failed
            };
        }
    }

    /// Return a card to its pre-task state.
    pub fn restore(&mut self, kind: CardKind, id: u64) {
        if let Some(card) = self.get_mut(kind, id) {
            card.status = CardStatus::Idle;
        }
    }

    /// Restore every in-progress card; returns how many were touched.
    pub fn restore_all_in_progress(&mut self) -> usize {
        let mut n = 0;
        for card in self
            .cards
            .iter_mut()
            .filter(|c| c.status == CardStatus::InProgress)
        {
            card.status = CardStatus::Idle;
            n += 1;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FollowupResult, VerificationResult};
    use crate::roster;

    fn verification(status: &str) -> TaskOutcome {
        TaskOutcome::Verification(VerificationResult {
            verification_status: status.into(),
            patient_name: "Sarah Johnson".into(),
            insurance_active: Some(status == "success"),
            coverage_type: Some("PPO".into()),
            copay: Some("$25".into()),
            deductible_remaining: Some("$120".into()),
            prior_auth_required: Some(false),
            effective_date: Some("2024-01-01".into()),
            call_duration: "3m 12s".into(),
            confidence_score: 97,
            failure_reason: None,
            recommended_action: None,
        })
    }

    #[test]
    fn claim_restores_to_its_original_status() {
        let mut board = Board::from_roster(&roster::demo());
        board.mark_in_progress(CardKind::Claim, 101);
        let view = board.get(CardKind::Claim, 101).unwrap().view();
        assert_eq!(view.badge, "🔄 AI Processing...");
        assert_eq!(view.trigger, Trigger::Disabled("🤖 In Progress..."));

        board.restore(CardKind::Claim, 101);
        let view = board.get(CardKind::Claim, 101).unwrap().view();
        assert_eq!(view.badge, "Denied");
        assert_eq!(view.badge_class, "status-denied");
        assert_eq!(view.trigger, Trigger::Enabled("🔄 AI Follow-up Now"));
    }

    #[test]
    fn verification_outcome_picks_terminal_variant() {
        let mut board = Board::from_roster(&roster::demo());
        board.settle(CardKind::Patient, 1, &verification("success"));
        board.settle(CardKind::Patient, 2, &verification("failed"));

        let ok = board.get(CardKind::Patient, 1).unwrap().view();
        assert_eq!(ok.badge, "✅ Verified");
        assert_eq!(ok.trigger, Trigger::Hidden);
        let failed = board.get(CardKind::Patient, 2).unwrap().view();
        assert_eq!(failed.badge, "❌ Failed");
        assert_eq!(failed.trigger, Trigger::Hidden);
    }

    #[test]
    fn followup_always_resolves() {
        let mut board = Board::from_roster(&roster::demo());
        let outcome = TaskOutcome::Followup(FollowupResult {
            claim_number: "CLM2024007".into(),
            patient_name: "Grace Liu".into(),
            original_status: "denied".into(),
            new_status: "resubmitted".into(),
            action_taken: "Corrected billing code and resubmitted".into(),
            expected_resolution: "3-5 business days".into(),
            processing_time: "2m 15s".into(),
            confidence_score: 96,
            recovery_amount: "$540.00".into(),
        });
        board.settle(CardKind::Claim, 107, &outcome);
        assert_eq!(
            board.status(CardKind::Claim, 107),
            Some(CardStatus::Succeeded)
        );
    }

    #[test]
    fn restore_all_only_touches_in_progress_cards() {
        let mut board = Board::from_roster(&roster::demo());
        board.mark_in_progress(CardKind::Patient, 3);
        board.mark_in_progress(CardKind::CareTask, 204);
        board.settle(CardKind::Patient, 4, &verification("success"));

        assert_eq!(board.restore_all_in_progress(), 2);
        assert_eq!(board.status(CardKind::Patient, 3), Some(CardStatus::Idle));
        assert_eq!(board.status(CardKind::CareTask, 204), Some(CardStatus::Idle));
        assert_eq!(
            board.status(CardKind::Patient, 4),
            Some(CardStatus::Succeeded)
        );
    }

    #[test]
    fn task_labels_match_card_kind() {
        let board = Board::from_roster(&roster::demo());
        assert_eq!(
            board.get(CardKind::Claim, 102).unwrap().task_label(),
            "Brian Martinez - CLM2024002"
        );
        assert_eq!(
            board.get(CardKind::CareTask, 206).unwrap().task_label(),
            "Daniel Kim - Test Scheduling"
        );
    }
}

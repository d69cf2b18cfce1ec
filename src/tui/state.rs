use crate::board::{Board, CardDetails, CardKind, CardStatus, EntityCard, Trigger};
use crate::filters::{self, CardFilter, CardSort};
use crate::model::Workflow;
use crate::monitor::MonitorState;
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};
use std::sync::{Arc, Mutex, MutexGuard};

pub const TAB_HELP: usize = 3;

/// One card list: its filter, sort and cursor.
#[derive(Debug, Clone)]
pub struct ListView {
    pub filter: CardFilter,
    pub sort: CardSort,
    pub selected: usize,
}

impl ListView {
    fn new(kind: CardKind) -> Self {
        Self {
            filter: CardFilter::default(),
            sort: CardSort::default_for(kind),
            selected: 0,
        }
    }
}

pub struct UiState {
    pub tab: usize,
    pub info: String,
    /// Shared with the engine, which owns card statuses; the UI only reads it.
    pub board: Arc<Mutex<Board>>,
    pub lists: [ListView; 3],
    pub search_editing: bool,
    pub monitor: MonitorState,
    /// Caption of the last batch, shown on that workflow's tab.
    pub batch: Option<(Workflow, String)>,
}

impl UiState {
    pub fn new(board: Arc<Mutex<Board>>) -> Self {
        Self {
            tab: 0,
            info: String::new(),
            board,
            lists: [
                ListView::new(CardKind::Patient),
                ListView::new(CardKind::Claim),
                ListView::new(CardKind::CareTask),
            ],
            search_editing: false,
            monitor: MonitorState::default(),
            batch: None,
        }
    }

    pub fn board(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Card kind of the current tab; `None` on the help tab.
    pub fn kind(&self) -> Option<CardKind> {
        tab_kind(self.tab)
    }

    pub fn list(&self) -> Option<&ListView> {
        self.lists.get(self.tab)
    }

    pub fn list_mut(&mut self) -> Option<&mut ListView> {
        self.lists.get_mut(self.tab)
    }

    /// Ids of the cards currently visible on this tab, in display order.
    pub fn visible_ids(&self) -> Vec<u64> {
        let (Some(kind), Some(list)) = (self.kind(), self.list()) else {
            return Vec::new();
        };
        let board = self.board();
        filters::visible(&board, kind, &list.filter, list.sort)
            .into_iter()
            .map(|c| c.id)
            .collect()
    }

    pub fn eligible_ids(&self) -> Vec<u64> {
        let (Some(kind), Some(list)) = (self.kind(), self.list()) else {
            return Vec::new();
        };
        filters::eligible_ids(&self.board(), kind, &list.filter, list.sort)
    }

    /// The highlighted card's id and whether it can be triggered.
    pub fn selected_card(&self) -> Option<(u64, bool)> {
        let kind = self.kind()?;
        let list = self.list()?;
        let ids = self.visible_ids();
        let id = *ids.get(list.selected.min(ids.len().saturating_sub(1)))?;
        let idle = self.board().status(kind, id) == Some(CardStatus::Idle);
        Some((id, idle))
    }

    pub fn move_selection(&mut self, up: bool) {
        let n = self.visible_ids().len();
        if let Some(list) = self.list_mut() {
            if up {
                list.selected = list.selected.saturating_sub(1);
            } else if list.selected + 1 < n {
                list.selected += 1;
            }
        }
    }

    /// Cycle the tab's secondary filter: insurance, amount band or priority.
    pub fn cycle_filter(&mut self) {
        let Some(kind) = self.kind() else { return };
        let values: Vec<String> = {
            let board = self.board();
            let mut v: Vec<String> = board
                .cards(kind)
                .filter_map(|c| match &c.details {
                    CardDetails::Patient(p) => Some(p.insurance.clone()),
                    CardDetails::CareTask(t) => Some(t.priority.clone()),
                    CardDetails::Claim(_) => None,
                })
                .collect();
            v.sort();
            v.dedup();
            v
        };
        let Some(list) = self.list_mut() else { return };
        match kind {
            CardKind::Patient => list.filter.insurance = cycle(&list.filter.insurance, &values),
            CardKind::Claim => list.filter.amount = list.filter.amount.next(),
            CardKind::CareTask => list.filter.priority = cycle(&list.filter.priority, &values),
        }
        list.selected = 0;
    }

    pub fn cycle_sort(&mut self) {
        if let Some(list) = self.list_mut() {
            list.sort = list.sort.next();
            list.selected = 0;
        }
    }

    /// Short description of the active filter and sort for the status line.
    pub fn filter_summary(&self) -> String {
        let (Some(kind), Some(list)) = (self.kind(), self.list()) else {
            return String::new();
        };
        let f = &list.filter;
        let secondary = match kind {
            CardKind::Patient => format!("insurance: {}", f.insurance.as_deref().unwrap_or("all")),
            CardKind::Claim => format!("amount: {}", f.amount.as_str()),
            CardKind::CareTask => format!("priority: {}", f.priority.as_deref().unwrap_or("all")),
        };
        let mut out = format!("{secondary} · sort: {}", list.sort.label());
        if !f.search.is_empty() || self.search_editing {
            out.push_str(&format!(" · search: {}", f.search));
            if self.search_editing {
                out.push('▏');
            }
        }
        out
    }
}

pub fn tab_kind(tab: usize) -> Option<CardKind> {
    match tab {
        0 => Some(CardKind::Patient),
        1 => Some(CardKind::Claim),
        2 => Some(CardKind::CareTask),
        _ => None,
    }
}

/// Next value after `current` in `values`, wrapping through "all" (`None`).
fn cycle(current: &Option<String>, values: &[String]) -> Option<String> {
    match current {
        None => values.first().cloned(),
        Some(cur) => values
            .iter()
            .position(|v| v == cur)
            .and_then(|i| values.get(i + 1))
            .cloned(),
    }
}

pub fn badge_color(class: &str) -> Color {
    match class {
        "status-pending" => Color::Yellow,
        "status-calling" | "status-processing" => Color::Cyan,
        "status-verified" | "status-resolved" => Color::Green,
        "status-denied" => Color::Red,
        _ => Color::Gray,
    }
}

pub fn card_line(card: &EntityCard, selected: bool) -> Line<'static> {
    let view = card.view();
    let marker = if selected { "▶ " } else { "  " };
    let name_style = if selected {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let mut spans = vec![
        Span::raw(marker),
        Span::styled(card.title().to_string(), name_style),
        Span::raw("  "),
        Span::styled(view.badge, Style::default().fg(badge_color(&view.badge_class))),
    ];
    // Only the highlighted card shows its action.
    if selected {
        match view.trigger {
            Trigger::Enabled(caption) => {
                spans.push(Span::styled(format!("  [{caption}]"), Style::default().fg(Color::Magenta)));
            }
            Trigger::Disabled(caption) => {
                spans.push(Span::styled(format!("  {caption}"), Style::default().fg(Color::DarkGray)));
            }
            Trigger::Hidden => {}
        }
    }
    Line::from(spans)
}

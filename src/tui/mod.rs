mod help;
mod state;

use crate::board::CardKind;
use crate::filters;
use crate::model::{RunConfig, StepStatus, TaskEvent, Workflow};
use crate::monitor::MonitorState;
use crate::orchestrator::{self, UiCommand};
use crate::roster;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{card_line, UiState, TAB_HELP};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(cfg: RunConfig) -> Result<()> {
    let roster = roster::load(cfg.roster_path.as_deref())?;
    // Unbounded channels keep the engine from ever waiting on the UI.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<TaskEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let engine = crate::cli::build_engine(&cfg, &roster, event_tx.clone())?;
    let board = engine.board().clone();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(UiState::new(board), event_rx, cmd_tx));

    let res = orchestrator::run_controller(engine, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut state: UiState,
    mut event_rx: UnboundedReceiver<TaskEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if state.search_editing {
                    edit_search(&mut state, k.code);
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % 4;
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = TAB_HELP;
                    }
                    (_, KeyCode::Up) | (_, KeyCode::Char('k')) => state.move_selection(true),
                    (_, KeyCode::Down) | (_, KeyCode::Char('j')) => state.move_selection(false),
                    (_, KeyCode::Enter) => {
                        let Some(kind) = state.kind() else { continue };
                        match state.selected_card() {
                            Some((entity_id, true)) => {
                                let _ = cmd_tx.send(UiCommand::RunOne {
                                    workflow: kind.workflow(),
                                    entity_id,
                                });
                            }
                            Some((_, false)) => {
                                state.info = "No action available for this card.".into();
                            }
                            None => {}
                        }
                    }
                    (_, KeyCode::Char('a')) => {
                        if let Some(kind) = state.kind() {
                            let ids = state.eligible_ids();
                            let _ = cmd_tx.send(UiCommand::RunAll {
                                workflow: kind.workflow(),
                                ids,
                            });
                        }
                    }
                    (_, KeyCode::Char('s')) => {
                        let _ = cmd_tx.send(UiCommand::Stop);
                    }
                    (_, KeyCode::Char('/')) => {
                        if matches!(state.kind(), Some(CardKind::Patient | CardKind::Claim)) {
                            state.search_editing = true;
                        }
                    }
                    (_, KeyCode::Char('f')) => state.cycle_filter(),
                    (_, KeyCode::Char('o')) => state.cycle_sort(),
                    (_, KeyCode::Char('x')) => state.monitor.close_results(),
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn edit_search(state: &mut UiState, code: KeyCode) {
    let Some(list) = state.list_mut() else {
        state.search_editing = false;
        return;
    };
    match code {
        KeyCode::Char(c) => list.filter.search.push(c),
        KeyCode::Backspace => {
            list.filter.search.pop();
        }
        KeyCode::Enter | KeyCode::Esc => {
            state.search_editing = false;
            return;
        }
        _ => return,
    }
    list.selected = 0;
}

fn apply_event(state: &mut UiState, ev: TaskEvent) {
    state.monitor.apply(&ev, Instant::now());
    match ev {
        TaskEvent::Notice(n) => state.info = n.to_message(),
        TaskEvent::StopRequested => state.info = "AI process stopped by user".into(),
        TaskEvent::BatchStarted { workflow, total } => {
            state.batch = Some((workflow, format!("⏳ Processing All... (0/{total})")));
        }
        TaskEvent::TaskStarted { workflow, .. } => {
            if let Some((wf, caption)) = state.batch.as_mut() {
                if *wf == workflow && caption.starts_with('⏳') {
                    bump_progress(caption);
                }
            }
        }
        TaskEvent::BatchFinished {
            workflow, stopped, ..
        } => {
            let caption = if stopped {
                "⏹️ Stopped".to_string()
            } else {
                workflow.batch_done_caption().to_string()
            };
            state.batch = Some((workflow, caption));
        }
        TaskEvent::TaskFailed { .. }
        | TaskEvent::TaskCancelled { .. }
        | TaskEvent::TaskCompleted { .. }
        | TaskEvent::Step { .. } => {}
    }
}

/// `(n/total)` → `(n+1/total)` in the batch caption.
fn bump_progress(caption: &mut String) {
    let Some(open) = caption.rfind('(') else { return };
    let Some((done, total)) = caption[open + 1..]
        .trim_end_matches(')')
        .split_once('/')
        .and_then(|(d, t)| Some((d.parse::<usize>().ok()?, t.to_string())))
    else {
        return;
    };
    caption.truncate(open);
    caption.push_str(&format!("({}/{total})", done + 1));
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Verification"),
        Line::from("Claims"),
        Line::from("Care"),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(Block::default().borders(Borders::ALL).title("careops"))
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.kind() {
        Some(kind) => draw_workspace(chunks[1], f, state, kind),
        None => help::draw_help(chunks[1], f),
    }
}

fn draw_workspace(area: Rect, f: &mut ratatui::Frame, state: &UiState, kind: CardKind) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(4)].as_ref())
        .split(area);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(rows[0]);

    draw_cards(cols[0], f, state, kind);
    draw_monitor(cols[1], f, state, kind.workflow());
    draw_status(rows[1], f, state, kind.workflow());
}

fn draw_cards(area: Rect, f: &mut ratatui::Frame, state: &UiState, kind: CardKind) {
    let Some(list) = state.list() else { return };
    let board = state.board();
    let cards = filters::visible(&board, kind, &list.filter, list.sort);
    let selected = list.selected.min(cards.len().saturating_sub(1));

    // Each card takes two lines; keep the cursor on screen.
    let per_page = (area.height.saturating_sub(2) as usize / 2).max(1);
    let offset = selected.saturating_sub(per_page - 1);

    let mut lines = Vec::new();
    for (i, card) in cards.iter().enumerate().skip(offset).take(per_page) {
        lines.push(card_line(card, i == selected));
        lines.push(Line::from(vec![
            Span::raw("    "),
            Span::styled(card.subtitle(), Style::default().fg(Color::Gray)),
        ]));
    }
    if cards.is_empty() {
        lines.push(Line::from("No cards match the current filters."));
    }

    let title = filters::count_caption(kind, cards.len());
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn step_style(status: StepStatus) -> Style {
    match status {
        StepStatus::Pending => Style::default().fg(Color::Gray),
        StepStatus::Active => Style::default().fg(Color::Cyan),
        StepStatus::Completed => Style::default().fg(Color::Green),
        StepStatus::Cancelled => Style::default().fg(Color::Red),
    }
}

fn draw_monitor(area: Rect, f: &mut ratatui::Frame, state: &UiState, tab_workflow: Workflow) {
    let now = Instant::now();
    let (title, lines) = match &state.monitor {
        MonitorState::Idle => (
            tab_workflow.idle_title().to_string(),
            vec![
                Line::from("AI assistant ready."),
                Line::from(""),
                Line::from(Span::styled(
                    "Press enter on a card, or `a` to run all visible.",
                    Style::default().fg(Color::Gray),
                )),
            ],
        ),
        MonitorState::Progress {
            label,
            title,
            steps,
            ..
        } => {
            let timer = state.monitor.timer(now).unwrap_or_default();
            let mut lines = vec![
                Line::from(Span::styled(label.clone(), Style::default().fg(Color::Yellow))),
                Line::from(""),
            ];
            for step in steps {
                lines.push(Line::from(vec![
                    Span::raw(format!("{} ", step.icon)),
                    Span::styled(step.label.clone(), step_style(step.status)),
                ]));
            }
            (format!("{title}  ⏱ {timer}"), lines)
        }
        MonitorState::Results { view, .. } => {
            let width = view.rows.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
            let mut lines: Vec<Line> = view
                .rows
                .iter()
                .map(|(label, value)| {
                    Line::from(vec![
                        Span::styled(format!("{label:<width$}  "), Style::default().fg(Color::Gray)),
                        Span::raw(value.clone()),
                    ])
                })
                .collect();
            lines.push(Line::from(""));
            lines.push(Line::from(view.footer.clone()));
            lines.push(Line::from(Span::styled(
                "x to close",
                Style::default().fg(Color::Gray),
            )));
            (view.title.clone(), lines)
        }
    };
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState, workflow: Workflow) {
    let batch = match &state.batch {
        Some((wf, caption)) if *wf == workflow => caption.clone(),
        _ => workflow.batch_idle_caption().to_string(),
    };
    let lines = vec![
        Line::from(vec![
            Span::styled("Batch: ", Style::default().fg(Color::Gray)),
            Span::raw(batch),
            Span::raw("   "),
            Span::styled(state.filter_summary(), Style::default().fg(Color::Gray)),
        ]),
        Line::from(state.info.clone()),
    ];
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::model::Notice;
    use std::sync::{Arc, Mutex};

    fn state() -> UiState {
        UiState::new(Arc::new(Mutex::new(Board::from_roster(&roster::demo()))))
    }

    #[test]
    fn batch_caption_tracks_progress_and_stop() {
        let mut s = state();
        apply_event(
            &mut s,
            TaskEvent::BatchStarted {
                workflow: Workflow::Followup,
                total: 3,
            },
        );
        apply_event(
            &mut s,
            TaskEvent::TaskStarted {
                workflow: Workflow::Followup,
                entity_id: 101,
                label: "Amanda Foster - CLM2024001".into(),
            },
        );
        assert_eq!(
            s.batch.as_ref().map(|(_, c)| c.as_str()),
            Some("⏳ Processing All... (1/3)")
        );

        apply_event(&mut s, TaskEvent::StopRequested);
        apply_event(
            &mut s,
            TaskEvent::BatchFinished {
                workflow: Workflow::Followup,
                processed: 1,
                stopped: true,
            },
        );
        assert_eq!(s.batch.as_ref().map(|(_, c)| c.as_str()), Some("⏹️ Stopped"));
        assert!(matches!(s.monitor, MonitorState::Idle));
    }

    #[test]
    fn notices_land_on_the_status_line() {
        let mut s = state();
        apply_event(&mut s, TaskEvent::Notice(Notice::AlreadyRunning));
        assert_eq!(s.info, "Process already running. Use stop button to cancel.");
    }

    #[test]
    fn search_edits_the_current_tab_only() {
        let mut s = state();
        s.tab = 1;
        s.search_editing = true;
        for c in "lee".chars() {
            edit_search(&mut s, KeyCode::Char(c));
        }
        edit_search(&mut s, KeyCode::Enter);
        assert!(!s.search_editing);
        assert_eq!(s.lists[1].filter.search, "lee");
        assert!(s.lists[0].filter.search.is_empty());
        assert_eq!(s.visible_ids(), vec![103]);
    }
}

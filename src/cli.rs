use crate::board::{Board, CardKind};
use crate::engine::{HttpBackend, ProcessState, TaskEngine};
use crate::filters::{self, AmountBand, CardFilter, CardSort};
use crate::model::{
    EntityReport, RunConfig, RunReport, StepStatus, TaskEvent, TaskReport, Timing, WorkDelay,
    Workflow,
};
use crate::roster::{self, Roster};
use crate::text_summary;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "careops",
    version,
    about = "AI office assistant: insurance verification, claims follow-up and care coordination"
)]
pub struct Cli {
    /// Base URL of the office backend
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    pub base_url: String,

    /// JSON roster of patients, claims and care tasks (default: config dir, else demo data)
    #[arg(long)]
    pub roster: Option<PathBuf>,

    /// Print JSON report and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print text progress and results and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Export the run report as JSON
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Pause between showing a step and marking it active
    #[arg(long, default_value = "500ms")]
    pub settle_delay: humantime::Duration,

    /// Shortest simulated processing time per step
    #[arg(long, default_value = "1s")]
    pub work_delay_min: humantime::Duration,

    /// Longest simulated processing time per step
    #[arg(long, default_value = "3s")]
    pub work_delay_max: humantime::Duration,

    /// Pause between two items of a batch
    #[arg(long, default_value = "2s")]
    pub pacing_delay: humantime::Duration,

    /// Grace period before a stop force-releases the busy flag
    #[arg(long, default_value = "100ms")]
    pub stop_grace: humantime::Duration,

    /// Write logs to this file (RUST_LOG controls the level)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Verify insurance for patients
    Verify(VerifyArgs),
    /// Follow up on claims
    FollowUp(FollowUpArgs),
    /// Coordinate care tasks
    Coordinate(CoordinateArgs),
    /// Print the roster with current statuses
    Roster,
}

#[derive(Debug, Args, Clone)]
pub struct VerifyArgs {
    /// Patient ids; several ids run as a batch
    pub ids: Vec<u64>,
    /// Run every visible patient still pending
    #[arg(long)]
    pub all: bool,
    /// Case-insensitive patient name filter
    #[arg(long)]
    pub search: Option<String>,
    /// Insurance provider filter
    #[arg(long)]
    pub insurance: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct FollowUpArgs {
    /// Claim ids; several ids run as a batch
    pub ids: Vec<u64>,
    /// Run every visible claim still pending
    #[arg(long)]
    pub all: bool,
    /// Case-insensitive patient name filter
    #[arg(long)]
    pub search: Option<String>,
    /// Claim status filter (pending, denied, ...)
    #[arg(long)]
    pub status: Option<String>,
    /// Amount band: low (< $200), medium ($200-$500), high (> $500)
    #[arg(long, value_parser = parse_amount_band)]
    pub amount: Option<AmountBand>,
}

#[derive(Debug, Args, Clone)]
pub struct CoordinateArgs {
    /// Care task ids; several ids run as a batch
    pub ids: Vec<u64>,
    /// Run every visible task still pending
    #[arg(long)]
    pub all: bool,
    /// Priority filter (high, medium, low)
    #[arg(long)]
    pub priority: Option<String>,
    /// Task type filter
    #[arg(long)]
    pub task_type: Option<String>,
    /// Contact method filter (phone, email, mail)
    #[arg(long)]
    pub contact: Option<String>,
}

fn parse_amount_band(s: &str) -> Result<AmountBand, String> {
    AmountBand::parse(s).ok_or_else(|| format!("unknown amount band `{s}` (low, medium, high)"))
}

/// Which entities a workflow command targets.
#[derive(Debug, Clone)]
pub(crate) struct Selection {
    pub workflow: Workflow,
    pub ids: Vec<u64>,
    pub all: bool,
    pub filter: CardFilter,
}

impl Command {
    fn selection(&self) -> Option<Selection> {
        let sel = match self {
            Command::Verify(a) => Selection {
                workflow: Workflow::Verification,
                ids: a.ids.clone(),
                all: a.all,
                filter: CardFilter {
                    search: a.search.clone().unwrap_or_default(),
                    insurance: a.insurance.clone(),
                    ..Default::default()
                },
            },
            Command::FollowUp(a) => Selection {
                workflow: Workflow::Followup,
                ids: a.ids.clone(),
                all: a.all,
                filter: CardFilter {
                    search: a.search.clone().unwrap_or_default(),
                    claim_status: a.status.clone(),
                    amount: a.amount.unwrap_or_default(),
                    ..Default::default()
                },
            },
            Command::Coordinate(a) => Selection {
                workflow: Workflow::Coordination,
                ids: a.ids.clone(),
                all: a.all,
                filter: CardFilter {
                    priority: a.priority.clone(),
                    task_type: a.task_type.clone(),
                    contact: a.contact.clone(),
                    ..Default::default()
                },
            },
            Command::Roster => return None,
        };
        Some(sel)
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;

    match args.command.clone() {
        None if !args.json && !args.text => {
            #[cfg(feature = "tui")]
            {
                return crate::tui::run(cfg).await;
            }
            #[cfg(not(feature = "tui"))]
            {
                return Err(anyhow::anyhow!(
                    "built without TUI support; give a command (verify, follow-up, coordinate, roster)"
                ));
            }
        }
        None => Err(anyhow::anyhow!(
            "--json/--text need a command (verify, follow-up, coordinate, roster)"
        )),
        Some(Command::Roster) => print_roster(&args, &cfg),
        Some(cmd) => {
            let Some(sel) = cmd.selection() else {
                return Ok(());
            };
            run_headless(args, cfg, sel).await
        }
    }
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<RunConfig> {
    let min = Duration::from(args.work_delay_min);
    let max = Duration::from(args.work_delay_max);
    let work_delay = if min == max {
        WorkDelay::Fixed(min)
    } else {
        WorkDelay::Uniform { min, max }
    };
    work_delay.validate().map_err(|e| anyhow::anyhow!(e))?;

    Ok(RunConfig {
        base_url: args.base_url.clone(),
        user_agent: format!("careops/{}", env!("CARGO_PKG_VERSION")),
        roster_path: args.roster.clone(),
        timing: Timing {
            settle_delay: Duration::from(args.settle_delay),
            work_delay,
            pacing_delay: Duration::from(args.pacing_delay),
            stop_grace: Duration::from(args.stop_grace),
        },
    })
}

/// Wire up an engine over the HTTP backend for `roster`.
pub(crate) fn build_engine(
    cfg: &RunConfig,
    roster: &Roster,
    event_tx: mpsc::UnboundedSender<TaskEvent>,
) -> Result<Arc<TaskEngine>> {
    let backend = HttpBackend::new(cfg).context("failed to build HTTP client")?;
    Ok(Arc::new(TaskEngine::new(
        Arc::new(ProcessState::new()),
        Arc::new(Mutex::new(Board::from_roster(roster))),
        Arc::new(backend),
        cfg.timing.clone(),
        event_tx,
    )))
}

/// Resolve the ids to run: explicit ids, or the visible pending set for `--all`.
pub(crate) fn resolve_ids(board: &Board, sel: &Selection) -> Result<Vec<u64>> {
    let kind = sel.workflow.card_kind();
    if sel.all {
        return Ok(filters::eligible_ids(
            board,
            kind,
            &sel.filter,
            CardSort::default_for(kind),
        ));
    }
    if sel.ids.is_empty() {
        anyhow::bail!("give one or more ids, or --all");
    }
    Ok(sel.ids.clone())
}

async fn run_headless(args: Cli, cfg: RunConfig, sel: Selection) -> Result<()> {
    let roster = roster::load(cfg.roster_path.as_deref())?;
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<TaskEvent>();
    let engine = build_engine(&cfg, &roster, evt_tx)?;

    let ids = {
        let board = engine.board().lock().unwrap_or_else(|e| e.into_inner());
        resolve_ids(&board, &sel)?
    };
    let workflow = sel.workflow;
    let single = !sel.all && ids.len() == 1;

    let run = {
        let engine = engine.clone();
        async move {
            if single {
                let report = engine.run_task(workflow, ids[0], None).await;
                let stopped = matches!(report, TaskReport::Cancelled);
                (
                    vec![EntityReport {
                        entity_id: ids[0],
                        report,
                    }],
                    stopped,
                )
            } else {
                let report = engine.run_all(workflow, &ids).await;
                (report.entries, report.stopped)
            }
        }
    };
    tokio::pin!(run);

    let (entries, stopped) = loop {
        tokio::select! {
            done = &mut run => break done,
            Some(ev) = evt_rx.recv() => print_event(&args, &out_tx, ev),
            res = tokio::signal::ctrl_c() => {
                if res.is_ok() {
                    engine.stop_all();
                }
            }
        }
    };
    while let Ok(ev) = evt_rx.try_recv() {
        print_event(&args, &out_tx, ev);
    }

    let report = RunReport {
        timestamp_utc: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .context("format timestamp")?,
        base_url: cfg.base_url.clone(),
        workflow,
        stopped,
        entries,
    };

    handle_exports(&args, &report)?;
    if args.json {
        let out = serde_json::to_string_pretty(&report)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        for line in report.entries.iter().filter_map(text_summary::report_line) {
            let _ = out_tx.send(OutputLine::Stderr(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

/// Route one engine event to stderr progress lines or stdout result cards.
fn print_event(args: &Cli, out_tx: &mpsc::UnboundedSender<OutputLine>, ev: TaskEvent) {
    let line = match ev {
        TaskEvent::Notice(n) => Some(n.to_message()),
        TaskEvent::StopRequested => Some("Stopping…".into()),
        // JSON mode keeps stderr to notices only.
        _ if args.json => None,
        TaskEvent::TaskStarted { label, .. } => Some(format!("== {label} ==")),
        TaskEvent::Step { total, record, .. } => match record.status {
            StepStatus::Completed | StepStatus::Cancelled => Some(format!(
                "[{}/{}] {} {}",
                record.index + 1,
                total,
                record.icon,
                record.label
            )),
            StepStatus::Pending | StepStatus::Active => None,
        },
        TaskEvent::TaskCompleted { outcome, .. } => {
            for line in text_summary::render_outcome(&outcome).lines() {
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
            None
        }
        TaskEvent::TaskCancelled { entity_id, .. } => {
            Some(format!("#{entity_id}: stopped by user"))
        }
        TaskEvent::TaskFailed {
            entity_id, reason, ..
        } => Some(format!("#{entity_id}: {reason}")),
        TaskEvent::BatchStarted { workflow, total } => Some(format!(
            "Processing All... ({total} {})",
            match workflow.card_kind() {
                CardKind::Patient => "patients",
                CardKind::Claim => "claims",
                CardKind::CareTask => "tasks",
            }
        )),
        TaskEvent::BatchFinished {
            workflow,
            processed,
            stopped,
        } => Some(if stopped {
            format!("⏹️ Stopped after {processed}")
        } else {
            workflow.batch_done_caption().to_string()
        }),
    };
    if let Some(line) = line {
        let _ = out_tx.send(OutputLine::Stderr(line));
    }
}

fn print_roster(args: &Cli, cfg: &RunConfig) -> Result<()> {
    let roster = roster::load(cfg.roster_path.as_deref())?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&roster)?);
        return Ok(());
    }
    let board = Board::from_roster(&roster);
    for kind in [CardKind::Patient, CardKind::Claim, CardKind::CareTask] {
        let cards: Vec<_> = board.cards(kind).collect();
        println!("{}", filters::count_caption(kind, cards.len()));
        for card in cards {
            println!(
                "  #{:<4} {:<28} {:<40} {}",
                card.id,
                card.title(),
                card.subtitle(),
                card.view().badge
            );
        }
    }
    Ok(())
}

/// Handle export operations for both text and JSON modes.
fn handle_exports(args: &Cli, report: &RunReport) -> Result<()> {
    if let Some(p) = args.export_json.as_deref() {
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(p, json).with_context(|| format!("write {}", p.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Cli {
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_the_dashboard_pacing() {
        let cfg = build_config(&parse(&["careops"])).unwrap();
        assert_eq!(cfg.base_url, "http://127.0.0.1:8000");
        assert_eq!(cfg.timing.settle_delay, Duration::from_millis(500));
        assert_eq!(
            cfg.timing.work_delay,
            WorkDelay::Uniform {
                min: Duration::from_secs(1),
                max: Duration::from_secs(3)
            }
        );
        assert_eq!(cfg.timing.pacing_delay, Duration::from_secs(2));
        assert_eq!(cfg.timing.stop_grace, Duration::from_millis(100));
    }

    #[test]
    fn zero_or_inverted_work_delay_is_rejected() {
        assert!(build_config(&parse(&["careops", "--work-delay-min", "0s"])).is_err());
        assert!(build_config(&parse(&[
            "careops",
            "--work-delay-min",
            "3s",
            "--work-delay-max",
            "1s"
        ]))
        .is_err());
    }

    #[test]
    fn follow_up_all_uses_filtered_pending_claims() {
        let cli = parse(&["careops", "--text", "follow-up", "--all", "--amount", "high"]);
        let sel = cli.command.unwrap().selection().unwrap();
        assert_eq!(sel.workflow, Workflow::Followup);

        let board = Board::from_roster(&roster::demo());
        let ids = resolve_ids(&board, &sel).unwrap();
        assert!(!ids.is_empty());
        for id in ids {
            let card = board.get(CardKind::Claim, id).unwrap();
            let crate::board::CardDetails::Claim(c) = &card.details else {
                panic!("not a claim");
            };
            assert!(c.amount_value() > 500.0);
        }
    }

    #[test]
    fn workflow_command_needs_ids_or_all() {
        let cli = parse(&["careops", "verify"]);
        let sel = cli.command.unwrap().selection().unwrap();
        let board = Board::from_roster(&roster::demo());
        assert!(resolve_ids(&board, &sel).is_err());
    }

    #[test]
    fn unknown_amount_band_fails_to_parse() {
        assert!(Cli::try_parse_from(["careops", "follow-up", "--amount", "huge"]).is_err());
    }
}

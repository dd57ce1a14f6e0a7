use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use leverlog::{
    analyze_and_save, unified_metrics, CadenceGuard, CampaignConfig, CampaignState, ChangeGate, ChangeLedger,
    ChangeRequest, CollectedData, Config, GateVerdict, ImpactAnalysis, InterventionItem, InterventionQueue,
    LedgerError, LeverPull, LeverType, LeverValue, Phase, PhaseManager, PhaseMetrics, Priority, RuleValidator,
    Significance, UnifiedMetrics, Verdict,
};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Day-count arguments; ten years covers any real lookback
const MAX_DAYS: i64 = 3650;

#[derive(Parser, Debug)]
#[command(name = "leverlog")]
#[command(author, version, about = "Change governance for paid-search campaigns - validate, record and score lever pulls")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record and inspect lever pulls
    Lever {
        #[command(subcommand)]
        action: LeverAction,
    },

    /// Check the one-lever-per-week rule for a campaign
    Cadence {
        /// Campaign id or name
        campaign: String,

        /// Window length in days (default from config)
        #[arg(short, long, value_parser = clap::value_parser!(i64).range(1..=MAX_DAYS))]
        days: Option<i64>,
    },

    /// Record and inspect weekly metric snapshots
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },

    /// Compare metrics before and after every recorded lever pull
    Impact {
        /// Length of the post-change window in days
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_DAYS))]
        days_after: Option<i64>,

        /// Print the analyses as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check phase progression for a campaign
    Phase {
        #[command(subcommand)]
        action: PhaseAction,
    },

    /// Manage the manual intervention backlog
    Intervention {
        #[command(subcommand)]
        action: InterventionAction,
    },

    /// Check proposed values against the business rules
    Validate {
        #[command(subcommand)]
        action: ValidateAction,
    },

    /// Show the effective configuration and data directory
    Config,

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
enum LeverAction {
    /// Record a lever pull (budget and tCPA changes are validated first)
    Add {
        /// budget, tCPA, geo_targeting, asset_group, keyword, bid_adjustment
        lever_type: LeverType,

        /// Value before the change
        old: String,

        /// Value after the change
        new: String,

        /// Campaign id or name
        #[arg(short, long)]
        campaign: String,

        /// Why the change was made
        #[arg(short, long, default_value = "")]
        reason: String,

        /// Expected impact
        #[arg(short = 'n', long, default_value = "")]
        impact_note: String,

        /// Record even when the new value breaks a hard rule
        #[arg(long)]
        force: bool,
    },

    /// Ask the change gate whether a pull may be applied now
    Check {
        lever_type: LeverType,

        /// Value before the change
        old: String,

        /// Value after the change
        new: String,

        /// Campaign id or name
        #[arg(short, long)]
        campaign: String,

        /// Campaign state JSON (spend, conversions) for stop-loss and tCPA gates
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recent lever pulls
    List {
        /// How many days back to look (default: the retention window)
        #[arg(short, long, value_parser = clap::value_parser!(i64).range(1..=MAX_DAYS))]
        days: Option<i64>,

        /// Group by week instead
        #[arg(short, long)]
        weekly: bool,
    },

    /// List every retained pull of one lever type
    ByType {
        lever_type: LeverType,
    },
}

#[derive(Subcommand, Debug)]
enum SnapshotAction {
    /// Record this week's snapshot from a JSON file of collected data
    Record {
        /// JSON with `ads`, `analytics` and optional `unified` sections
        file: PathBuf,
    },

    /// Show the rolling snapshot window
    List,
}

#[derive(Subcommand, Debug)]
enum PhaseAction {
    /// Check eligibility for the next phase from a campaign metrics JSON file
    Check {
        /// JSON with conversion counts, CPL, pacing and lead quality
        file: PathBuf,

        /// phase_1, phase_2 or phase_3
        #[arg(short, long)]
        phase: Phase,

        /// Date the current phase started (YYYY-MM-DD); enables the timeline check
        #[arg(long)]
        since: Option<chrono::NaiveDate>,

        /// Take days since the last change from this campaign's lever history
        #[arg(short, long)]
        campaign: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum InterventionAction {
    /// Add a manual task
    Add {
        /// Area the task belongs to (Assets, Geo, Budget...)
        category: String,

        /// What has to be done
        action: String,

        /// high, medium or low
        #[arg(short, long, default_value = "medium")]
        priority: Priority,

        /// Free-text due date
        #[arg(long)]
        due: Option<String>,

        #[arg(short, long, default_value = "")]
        notes: String,
    },

    /// Mark a task completed
    Done {
        id: u64,
    },

    /// List pending tasks
    List {
        /// Only tasks of this priority (pending or not)
        #[arg(short, long)]
        priority: Option<Priority>,
    },
}

#[derive(Subcommand, Debug)]
enum ValidateAction {
    /// Check a daily budget change
    Budget { old: f64, new: f64 },

    /// Check a tCPA change
    Tcpa { old: f64, new: f64 },

    /// Check a campaign name against the naming convention
    Naming { name: String },

    /// Run every structure check on a campaign config JSON file
    Structure { file: PathBuf },

    /// Check a campaign state JSON file for stop-loss conditions
    StopLoss { file: PathBuf },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr; `LEVERLOG_LOG` wins over `RUST_LOG`, default `warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_env("LEVERLOG_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the process exit code: non-zero when a rule check failed
fn run(cli: Cli) -> leverlog::Result<i32> {
    let config = Config::load();
    let data_dir = leverlog::config::data_dir();

    match cli.command {
        Command::Lever { action } => run_lever(action, &config, &data_dir),
        Command::Cadence { campaign, days } => {
            let ledger = ChangeLedger::open(&data_dir, config.retention.clone())?;
            let guard = match days {
                Some(days) => CadenceGuard::with_window(&ledger, days),
                None => CadenceGuard::new(&ledger),
            };
            let report = guard.check_cadence(&campaign);

            if report.violated {
                println!("{} {}", "✗".red(), report.message);
            } else {
                println!("{} {}", "✓".green(), report.message);
            }
            for lever in &report.levers {
                print_lever(lever);
            }
            Ok(if report.violated { 1 } else { 0 })
        }
        Command::Snapshot { action } => run_snapshot(action, &config, &data_dir),
        Command::Impact { days_after, json } => {
            let ledger = ChangeLedger::open(&data_dir, config.retention.clone())?;
            let mut impact_config = config.impact.clone();
            if let Some(days) = days_after {
                impact_config.days_after = days;
            }
            let analyses =
                analyze_and_save(&data_dir, ledger.levers(), ledger.snapshots(), &impact_config)?;

            if json {
                print_json("impact analysis", &analyses)?;
            } else if analyses.is_empty() {
                println!("No lever pulls recorded.");
            } else {
                for analysis in &analyses {
                    print_analysis(analysis);
                }
            }
            Ok(0)
        }
        Command::Phase { action } => run_phase(action, &config, &data_dir),
        Command::Intervention { action } => run_intervention(action, &data_dir),
        Command::Validate { action } => run_validate(action, config),
        Command::Config => {
            println!("{} {}", "Data directory:".bold(), data_dir.display());
            match toml::to_string_pretty(&config) {
                Ok(text) => println!("\n{}", text),
                Err(e) => eprintln!("Could not render config: {}", e),
            }
            Ok(0)
        }
        Command::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "leverlog", &mut std::io::stdout());
            Ok(0)
        }
    }
}

fn run_lever(action: LeverAction, config: &Config, data_dir: &Path) -> leverlog::Result<i32> {
    let mut ledger = ChangeLedger::open(data_dir, config.retention.clone())?;

    match action {
        LeverAction::Add {
            lever_type,
            old,
            new,
            campaign,
            reason,
            impact_note,
            force,
        } => {
            let old = LeverValue::parse(&old);
            let new = LeverValue::parse(&new);

            let validator = RuleValidator::new(config.clone());
            let verdict = match (lever_type, new.as_number()) {
                (LeverType::Budget, Some(n)) => {
                    Some(validator.validate_budget(old.as_number().unwrap_or(0.0), n))
                }
                (LeverType::Tcpa, Some(n)) => {
                    Some(validator.validate_tcpa(old.as_number().unwrap_or(0.0), n))
                }
                (LeverType::Budget | LeverType::Tcpa, None) => Some(Verdict {
                    valid: false,
                    missing: vec![format!("{} value '{}' is not a number", lever_type.label(), new)],
                    ..Verdict::default()
                }),
                _ => None,
            };
            if let Some(verdict) = &verdict {
                print_verdict(&format!("{} change", lever_type.label()), verdict);
                if !verdict.valid && !force {
                    eprintln!("Not recorded. Use --force to record anyway.");
                    return Ok(1);
                }
            }

            let report = CadenceGuard::new(&ledger).check_cadence(&campaign);
            if report.count > 0 {
                println!(
                    "{} {} lever(s) already pulled on this campaign in the last {} days",
                    "Warning:".yellow(),
                    report.count,
                    ledger.retention().cadence_days
                );
            }

            let lever = ledger.record_lever(lever_type, old, new, &campaign, &reason, &impact_note)?;
            println!(
                "{} {} change on {}: {} → {} ({})",
                "Recorded".green(),
                lever.lever_type.label(),
                lever.campaign_id,
                lever.old_value,
                lever.new_value,
                lever.change
            );
            Ok(0)
        }
        LeverAction::Check {
            lever_type,
            old,
            new,
            campaign,
            state,
            json,
        } => {
            let state: CampaignState = match state {
                Some(path) => read_json(&path)?,
                None => CampaignState::default(),
            };
            let request = ChangeRequest {
                campaign_id: campaign,
                lever_type,
                old_value: LeverValue::parse(&old),
                new_value: LeverValue::parse(&new),
            };
            let validator = RuleValidator::new(config.clone());
            let verdict = ChangeGate::new(&ledger, &validator).evaluate(&request, &state);

            if json {
                print_json("gate verdict", &verdict)?;
            } else {
                print_gate_verdict(&request, &verdict);
            }
            Ok(if verdict.approved { 0 } else { 1 })
        }
        LeverAction::List { days, weekly } => {
            let days = days.unwrap_or(ledger.retention().lever_days);
            if weekly {
                let groups = ledger.levers_by_week_at(chrono::Local::now());
                if groups.is_empty() {
                    println!("No lever pulls recorded.");
                }
                for group in groups {
                    println!(
                        "{}",
                        format!("Week {} - {}", group.week_start, group.week_end).bold()
                    );
                    for lever in group.levers {
                        print_lever(lever);
                    }
                }
            } else {
                let levers = ledger.get_recent(days);
                if levers.is_empty() {
                    println!("No lever pulls in the last {} days.", days);
                }
                for lever in levers {
                    print_lever(lever);
                }
            }
            Ok(0)
        }
        LeverAction::ByType { lever_type } => {
            let levers = ledger.get_by_type(lever_type);
            if levers.is_empty() {
                println!("No {} pulls recorded.", lever_type.label());
            }
            for lever in levers {
                print_lever(lever);
            }
            Ok(0)
        }
    }
}

fn run_snapshot(action: SnapshotAction, config: &Config, data_dir: &Path) -> leverlog::Result<i32> {
    let mut ledger = ChangeLedger::open(data_dir, config.retention.clone())?;

    match action {
        SnapshotAction::Record { file } => {
            let data: CollectedData = read_json(&file)?;
            let unified = if data.unified == UnifiedMetrics::default() {
                unified_metrics(&data.ads, &data.analytics)
            } else {
                data.unified.clone()
            };

            let snapshot = ledger.record_weekly_snapshot(&data.analytics, &data.ads, &unified)?;
            println!(
                "{} snapshot for week {} - {}",
                "Recorded".green(),
                snapshot.week_start,
                snapshot.week_end
            );
            for change in &snapshot.detected_changes {
                println!("   {}", change);
            }
            Ok(0)
        }
        SnapshotAction::List => {
            let snapshots = ledger.rolling_snapshots();
            if snapshots.is_empty() {
                println!("No snapshots recorded.");
            }
            for s in snapshots {
                println!(
                    "{}  sessions {:>6}  users {:>6}  bounce {:>5.1}%  duration {:>4.1}m  ROAS {:.2}",
                    format!("{} - {}", s.week_start, s.week_end).bold(),
                    s.metrics.sessions,
                    s.metrics.users,
                    s.metrics.bounce_rate,
                    s.metrics.session_duration,
                    s.metrics.roas
                );
                for change in &s.detected_changes {
                    println!("   {}", change.dimmed());
                }
            }
            Ok(0)
        }
    }
}

fn run_phase(action: PhaseAction, config: &Config, data_dir: &Path) -> leverlog::Result<i32> {
    match action {
        PhaseAction::Check {
            file,
            phase,
            since,
            campaign,
            json,
        } => {
            let mut metrics: PhaseMetrics = read_json(&file)?;
            if let Some(campaign) = campaign {
                let ledger = ChangeLedger::open(data_dir, config.retention.clone())?;
                let now = chrono::Local::now();
                let quiet = match ledger.last_pull(&campaign, None) {
                    Some(last) => now.signed_duration_since(last.timestamp).num_days(),
                    None => ledger.retention().lever_days,
                };
                metrics.days_since_last_change = u32::try_from(quiet.max(0)).unwrap_or(u32::MAX);
            }

            let manager = PhaseManager::new(config.phases.clone());
            let eligibility = manager.check_eligibility(&metrics, phase);
            let today = chrono::Local::now().date_naive();
            let progress = since.map(|start| manager.check_progress(start, today, &eligibility, None));

            if json {
                let out = serde_json::json!({
                    "eligibility": &eligibility,
                    "progress": &progress,
                });
                print_json("phase check", &out)?;
            } else {
                let next = phase.next().map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
                if eligibility.eligible_for_next {
                    println!("{} {} eligible for {}", "✓".green(), phase, next);
                } else {
                    println!("{} {} not ready to advance (next: {})", "✗".red(), phase, next);
                }
                for factor in &eligibility.blocking_factors {
                    println!("   {} {}", "blocking".red(), factor);
                }
                for opportunity in &eligibility.optimization_opportunities {
                    println!("   {} {}", "opportunity".yellow(), opportunity);
                }
                println!("   {}", eligibility.recommended_action);
                if let Some(progress) = &progress {
                    let line = format!("Day {}: {}", progress.days_in_phase, progress.message);
                    if progress.lag_alert {
                        println!("{}", line.red().bold());
                    } else if progress.lagging {
                        println!("{}", line.yellow());
                    } else {
                        println!("{}", line);
                    }
                }
            }
            Ok(match progress {
                Some(progress) if progress.lag_alert => 1,
                _ => 0,
            })
        }
    }
}

fn run_intervention(action: InterventionAction, data_dir: &Path) -> leverlog::Result<i32> {
    let mut queue = InterventionQueue::open(data_dir)?;

    match action {
        InterventionAction::Add {
            category,
            action,
            priority,
            due,
            notes,
        } => {
            let item = queue.add(&category, &action, priority, due.as_deref(), &notes)?;
            println!("{} intervention {}", "Created".green(), item.id);
            Ok(0)
        }
        InterventionAction::Done { id } => match queue.complete(id)? {
            Some(item) => {
                println!("{} intervention {}: {}", "Completed".green(), item.id, item.action);
                Ok(0)
            }
            None => {
                eprintln!("No intervention with id {}", id);
                Ok(1)
            }
        },
        InterventionAction::List { priority } => {
            let items = match priority {
                Some(p) => queue.list_by_priority(p),
                None => queue.list_pending(),
            };
            if items.is_empty() {
                println!("{}", "No manual interventions required.".green());
            }
            for item in items {
                print_intervention(item);
            }
            Ok(0)
        }
    }
}

fn run_validate(action: ValidateAction, config: Config) -> leverlog::Result<i32> {
    let validator = RuleValidator::new(config);

    let valid = match action {
        ValidateAction::Budget { old, new } => {
            let verdict = validator.validate_budget(old, new);
            print_verdict("Budget", &verdict);
            verdict.valid
        }
        ValidateAction::Tcpa { old, new } => {
            let verdict = validator.validate_tcpa(old, new);
            print_verdict("tCPA", &verdict);
            verdict.valid
        }
        ValidateAction::Naming { name } => {
            let verdict = validator.validate_naming(&name);
            print_verdict("Campaign name", &verdict);
            verdict.valid
        }
        ValidateAction::Structure { file } => {
            let campaign: CampaignConfig = read_json(&file)?;
            let report = validator.validate_structure(&campaign);
            for check in &report.details {
                print_verdict(&check.category, &check.verdict);
            }
            println!(
                "\n{} of {} checks passed",
                report.summary.passed_checks, report.summary.total_checks
            );
            report.valid
        }
        ValidateAction::StopLoss { file } => {
            let state: CampaignState = read_json(&file)?;
            match validator.check_stop_loss(&state) {
                Some(stop) => {
                    println!("{}", stop.message().red().bold());
                    false
                }
                None => {
                    println!("{} No stop-loss condition", "✓".green());
                    true
                }
            }
        }
    };

    Ok(if valid { 0 } else { 1 })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> leverlog::Result<T> {
    let content = std::fs::read_to_string(path).map_err(|source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| LedgerError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn print_json<T: serde::Serialize>(what: &'static str, value: &T) -> leverlog::Result<()> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|source| LedgerError::Serialize { what, source })?;
    println!("{}", out);
    Ok(())
}

fn print_gate_verdict(request: &ChangeRequest, verdict: &GateVerdict) {
    let title = format!(
        "{} change on {}: {} → {}",
        request.lever_type.label(),
        request.campaign_id,
        request.old_value,
        request.new_value
    );
    if verdict.approved {
        println!("{} {}", "✓ Approved".green(), title);
    } else {
        println!("{} {}", "✗ Denied".red(), title);
    }
    for reason in &verdict.reasons {
        println!("   {}", reason);
    }
    for warning in &verdict.warnings {
        println!("   {} {}", "warning".yellow(), warning);
    }
    for alert in &verdict.alerts {
        println!("   {} {}", "alert".red().bold(), alert);
    }
    if let Some(value) = verdict.suggested_value {
        println!("   suggested value: {:.2}", value);
    }
    if let Some(at) = verdict.execute_after {
        println!("   execute after: {}", at.format("%Y-%m-%d %H:%M"));
    }
}

fn print_verdict(title: &str, verdict: &Verdict) {
    if verdict.valid {
        println!("{} {}", "✓".green(), title);
    } else {
        println!("{} {}", "✗".red(), title);
    }
    for missing in &verdict.missing {
        println!("   {} {}", "missing".red(), missing);
    }
    for warning in &verdict.warnings {
        println!("   {} {}", "warning".yellow(), warning);
    }
}

fn print_lever(lever: &LeverPull) {
    println!(
        "  {}  {:<14} {:<28} {} → {} ({})",
        lever.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
        lever.lever_type.as_str(),
        lever.campaign_id,
        lever.old_value,
        lever.new_value,
        lever.change
    );
    if !lever.reason.is_empty() {
        println!("      reason: {}", lever.reason);
    }
}

fn print_analysis(analysis: &ImpactAnalysis) {
    let lever = &analysis.lever;
    let significance = match analysis.significance {
        Significance::Positive => analysis.significance.to_string().green(),
        Significance::Negative => analysis.significance.to_string().red(),
        Significance::Mixed => analysis.significance.to_string().yellow(),
        _ => analysis.significance.to_string().dimmed(),
    };
    println!(
        "{} {} on {} ({}) - {}",
        lever.timestamp.format("%Y-%m-%d").to_string().bold(),
        lever.lever_type.label(),
        lever.campaign_id,
        lever.change,
        significance
    );
    for m in &analysis.impact {
        println!(
            "   {:<18} {:>10.2} → {:>10.2}  {:+.1}%",
            m.metric.label(),
            m.before,
            m.after,
            m.change_pct
        );
    }
    println!("   {}", analysis.recommendation);
}

fn print_intervention(item: &InterventionItem) {
    let priority = match item.priority {
        Priority::High => item.priority.as_str().red().bold(),
        Priority::Medium => item.priority.as_str().yellow(),
        Priority::Low => item.priority.as_str().normal(),
    };
    println!(
        "  [{}] {:<6} {:<12} {}  (due: {})",
        item.id,
        priority,
        item.category,
        item.action,
        item.due_date.as_deref().unwrap_or("-")
    );
    if !item.notes.is_empty() {
        println!("        note: {}", item.notes);
    }
}

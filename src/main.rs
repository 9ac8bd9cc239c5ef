mod cli;
mod config;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use clap::Parser;
use finplan::domain::{format_money, long_label, parse_amount, parse_month, short_label};
use finplan::{
    Category, CategoryGroup, Direction, Entry, EntryKind, FinancialModel, JsonFileStore,
    PersistenceStore, Scenario, ShiftState,
};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::cli::{Cli, Command, PlanCommand, ResetArgs, ScenarioArg, ScenarioCmd, ShiftCmd, SubmitArgs};
use crate::config::{AppConfig, AppPaths, PendingShift, app_paths, load_or_init_config, now_utc, write_config};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.log_level);
    let paths = app_paths(cli.home.clone())?;
    let (mut cfg, cfg_path) = load_or_init_config(&paths)?;

    match cli.command {
        Command::Categories => {
            print_categories();
            Ok(())
        }
        Command::Scenario(args) => handle_scenario(args.cmd, &mut cfg, &cfg_path),
        Command::Plan(cmd) => handle_plan(cmd, &paths, &mut cfg, &cfg_path),
    }
}

/// Opens the stored plan, re-arms a pending shift and runs `cmd` against it.
fn handle_plan(
    cmd: PlanCommand,
    paths: &AppPaths,
    cfg: &mut AppConfig,
    cfg_path: &Path,
) -> Result<()> {
    let store = JsonFileStore::in_dir(&paths.data_dir);
    let data_path = store.path().to_path_buf();
    let mut model = FinancialModel::open(store)
        .with_context(|| format!("Failed to open {}", data_path.display()))?;
    restore_pending_shift(&mut model, cfg, cfg_path)?;

    match cmd {
        PlanCommand::Start { date } => {
            let start = parse_month(&date)?;
            model.set_period_start(start)?;
            clear_pending_shift(cfg, cfg_path)?;
            println!("Period start set to {}", long_label(start));
            print_window(&model, cfg);
        }
        PlanCommand::Window => print_window(&model, cfg),
        PlanCommand::Set(args) => {
            let category: Category = args.category.parse()?;
            let amount = parse_amount(&args.amount)?;
            let month = resolve_month(&model, args.month.month.as_deref())?;
            let kind = entry_kind(args.actual);
            model.upsert_entry(Entry::new(month, category, amount, kind))?;
            println!(
                "Set {category} {kind} for {} to {}",
                long_label(month),
                format_money(amount)
            );
        }
        PlanCommand::Submit(args) => handle_submit(&mut model, args)?,
        PlanCommand::Inputs(args) => {
            let month = resolve_month(&model, args.month.as_deref())?;
            print_inputs(&model, month);
        }
        PlanCommand::Entries => print_entries(&model),
        PlanCommand::Forecast(args) => {
            let scenario = resolve_scenario(&args.scenario, cfg)?;
            let metrics = model.generate_forecast_metrics(scenario, args.months)?;
            if metrics.is_empty() {
                println!("No forecast data in the active window.");
                return Ok(());
            }
            println!("Scenario: {scenario}");
            println!("Opening balance: {}", format_money(metrics.opening_balance));
            println!("Weighted burn: {}", format_money(metrics.weighted_burn));

            let mut headers = vec!["Metric"];
            headers.extend(metrics.labels.iter().map(String::as_str));
            let rows = vec![
                labeled_row("Net Cash Flow", metrics.net_row()),
                labeled_row("Closing Balance", metrics.closing_row()),
                labeled_row("Runway (months)", metrics.runway_row()),
            ];
            print_table(&headers, &rows);
        }
        PlanCommand::Chart(args) => {
            let scenario = resolve_scenario(&args, cfg)?;
            let chart = model.get_chart_data(scenario)?;
            println!("series\tkind\tlabel\tvalue");
            for (series, points) in [("net_flow", &chart.net_flows), ("runway", &chart.runways)]
            {
                for p in points {
                    println!(
                        "{series}\t{}\t{}\t{}",
                        p.kind,
                        p.label,
                        format_money(p.value)
                    );
                }
            }
        }
        PlanCommand::Overview => {
            let overview = model.overview();
            if overview.is_empty() {
                println!("No data stored.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = overview
                .into_iter()
                .map(|(month, net)| vec![short_label(month), format_money(net)])
                .collect();
            print_table(&["Month", "Net Cash Flow"], &rows);
        }
        PlanCommand::Project(args) => {
            let scenario = resolve_scenario(&args, cfg)?;
            let projected = model.generate_forecast(scenario)?;
            println!(
                "Projected {} ({scenario}): income {}, expenses {}, net {}",
                long_label(projected.month()),
                format_money(projected.total_income()),
                format_money(projected.total_expenses()),
                format_money(projected.net_cash_flow()),
            );
        }
        PlanCommand::Shift(args) => handle_shift(&mut model, args.cmd, cfg, cfg_path)?,
        PlanCommand::Reset(args) => handle_reset(&mut model, args, cfg, cfg_path)?,
    }
    Ok(())
}

/// Initializes the tracing subscriber. `RUST_LOG` wins over `--log-level`.
fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        None => EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// A shift prepared by an earlier invocation stays armed only while its
/// month is still the first active month.
fn restore_pending_shift<S: PersistenceStore>(
    model: &mut FinancialModel<S>,
    cfg: &mut AppConfig,
    cfg_path: &Path,
) -> Result<()> {
    let Some(pending) = cfg.pending_shift.clone() else {
        return Ok(());
    };
    if model.active_months().first() == Some(&pending.month) {
        model.shift().prepare()?;
        debug!(month = %pending.month, prepared_at = %pending.prepared_at, "re-armed pending shift");
        return Ok(());
    }
    warn!(month = %pending.month, "discarding stale pending shift");
    clear_pending_shift(cfg, cfg_path)
}

fn clear_pending_shift(cfg: &mut AppConfig, cfg_path: &Path) -> Result<()> {
    if cfg.pending_shift.take().is_some() {
        write_config(cfg_path, cfg)?;
    }
    Ok(())
}

fn handle_scenario(cmd: ScenarioCmd, cfg: &mut AppConfig, cfg_path: &Path) -> Result<()> {
    match cmd {
        ScenarioCmd::Show => println!("{}", cfg.current_scenario),
        ScenarioCmd::Set { name } => {
            cfg.current_scenario = name.parse()?;
            write_config(cfg_path, cfg)?;
            println!("Scenario: {}", cfg.current_scenario);
        }
        ScenarioCmd::Next => {
            cfg.current_scenario = cfg.current_scenario.next();
            write_config(cfg_path, cfg)?;
            println!("Scenario: {}", cfg.current_scenario);
        }
    }
    Ok(())
}

fn handle_submit<S: PersistenceStore>(model: &mut FinancialModel<S>, args: SubmitArgs) -> Result<()> {
    let direction: Direction = args.direction.parse()?;
    let month = resolve_month(model, args.month.month.as_deref())?;

    let mut inputs = Vec::with_capacity(args.pairs.len());
    for pair in &args.pairs {
        let (raw_category, raw_amount) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected CATEGORY=AMOUNT, got '{pair}'"))?;
        let category: Category = raw_category.parse()?;
        inputs.push((category, raw_amount.to_string()));
    }

    let count = model.submit_amounts(month, direction, entry_kind(args.actual), inputs)?;
    println!("Saved {count} {direction} entries for {}", long_label(month));
    Ok(())
}

fn handle_shift<S: PersistenceStore>(
    model: &mut FinancialModel<S>,
    cmd: ShiftCmd,
    cfg: &mut AppConfig,
    cfg_path: &Path,
) -> Result<()> {
    match cmd {
        ShiftCmd::Prepare => {
            let month = model.shift().prepare()?;
            cfg.pending_shift = Some(PendingShift {
                month,
                prepared_at: now_utc(),
            });
            write_config(cfg_path, cfg)?;
            println!(
                "Shift prepared for {}. Run `finplan shift apply` to close it.",
                long_label(month)
            );
        }
        ShiftCmd::Apply => {
            let applied = model.shift().apply_shift();
            if model.shift_state() == ShiftState::Idle {
                clear_pending_shift(cfg, cfg_path)?;
            }
            let report = applied?;
            println!(
                "Closed {}: {} forecast entries converted to actuals",
                long_label(report.closed_month),
                report.converted
            );
            let labels: Vec<String> = report.active_months.into_iter().map(long_label).collect();
            println!("Active months: {}", labels.join(", "));
        }
    }
    Ok(())
}

fn handle_reset<S: PersistenceStore>(
    model: &mut FinancialModel<S>,
    args: ResetArgs,
    cfg: &mut AppConfig,
    cfg_path: &Path,
) -> Result<()> {
    let backup = if args.backup {
        true
    } else if args.no_backup {
        false
    } else {
        cfg.backup_on_reset
    };

    if !args.yes && !prompt_yes_no("This deletes all plan data. Proceed? [y/N] ", false)? {
        println!("Aborted.");
        return Ok(());
    }

    let outcome = model.reset(backup)?;
    clear_pending_shift(cfg, cfg_path)?;
    if let Some(path) = outcome.backup {
        println!("Backup written to {}", path.display());
    }
    if let Some(err) = outcome.backup_error {
        eprintln!("Warning: {:#}", anyhow::Error::from(err));
    }
    println!("Plan reset.");
    Ok(())
}

fn entry_kind(actual: bool) -> EntryKind {
    if actual {
        EntryKind::Actual
    } else {
        EntryKind::Forecast
    }
}

fn resolve_month<S: PersistenceStore>(
    model: &FinancialModel<S>,
    raw: Option<&str>,
) -> Result<NaiveDate> {
    match raw {
        Some(raw) => Ok(parse_month(raw)?),
        None => model
            .active_months()
            .first()
            .copied()
            .context("No period start set. Run: finplan start <YYYY-MM>"),
    }
}

fn resolve_scenario(arg: &ScenarioArg, cfg: &AppConfig) -> Result<Scenario> {
    match &arg.scenario {
        Some(name) => Ok(name.parse()?),
        None => Ok(cfg.current_scenario),
    }
}

fn print_window<S: PersistenceStore>(model: &FinancialModel<S>, cfg: &AppConfig) {
    if model.active_months().is_empty() {
        println!("No period start set. Run: finplan start <YYYY-MM>");
        return;
    }
    println!("Window offset: {}", model.window_offset());
    for label in model.active_month_labels() {
        println!("  {label}");
    }
    if let Some(pending) = &cfg.pending_shift {
        println!("Pending shift: {}", long_label(pending.month));
    }
}

fn print_categories() {
    for group in CategoryGroup::ALL {
        println!("{} ({})", group.label(), group.direction());
        for category in group.categories() {
            println!("  {}\t{}", category.label(), category.ident());
        }
    }
}

fn print_inputs<S: PersistenceStore>(model: &FinancialModel<S>, month: NaiveDate) {
    let inputs = model.month_inputs(month);
    println!("{}", long_label(month));
    for group in CategoryGroup::ALL {
        let values = match group.direction() {
            Direction::Expense => &inputs.expenses,
            Direction::Income => &inputs.incomes,
        };
        let rows: Vec<Vec<String>> = group
            .categories()
            .iter()
            .map(|c| {
                vec![
                    c.label().to_string(),
                    values.get(c).copied().map(format_money).unwrap_or_default(),
                ]
            })
            .collect();
        println!();
        print_table(&[group.label(), "Amount"], &rows);
    }
}

fn print_entries<S: PersistenceStore>(model: &FinancialModel<S>) {
    let table = model.entries_table();
    if table.groups.iter().all(|g| g.rows.is_empty()) {
        println!("No forecast entries in the active window.");
        return;
    }

    let mut rows = Vec::new();
    for group in table.groups.iter().filter(|g| !g.rows.is_empty()) {
        rows.push(vec![group.group.label().to_string()]);
        for row in &group.rows {
            let mut cells = vec![format!("  {}", row.category.label())];
            cells.extend(
                row.cells
                    .iter()
                    .map(|c| c.map(format_money).unwrap_or_default()),
            );
            rows.push(cells);
        }
    }
    let headers: Vec<&str> = table.headers.iter().map(String::as_str).collect();
    print_table(&headers, &rows);
}

fn labeled_row(label: &str, values: Vec<String>) -> Vec<String> {
    let mut row = vec![label.to_string()];
    row.extend(values);
    row
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if headers.is_empty() {
        println!("(no columns)");
        return;
    }

    let cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();

    for row in rows {
        for (i, cell) in row.iter().take(cols).enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    fn print_row(cells: &[String], widths: &[usize]) {
        print!("|");
        for (i, w) in widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            print!(" {:width$} |", cell, width = *w);
        }
        println!();
    }

    fn print_sep(widths: &[usize]) {
        print!("|");
        for w in widths {
            print!("{}|", "-".repeat(w + 2));
        }
        println!();
    }

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    print_row(&header_cells, &widths);
    print_sep(&widths);
    for row in rows {
        print_row(row, &widths);
    }
}

fn prompt_yes_no(prompt: &str, default: bool) -> Result<bool> {
    eprint!("{prompt}");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let s = line.trim();
    if s.is_empty() {
        return Ok(default);
    }
    Ok(matches!(s.to_ascii_lowercase().as_str(), "y" | "yes"))
}

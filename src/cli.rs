use clap::{Args, Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "finplan")]
#[command(about = "Rolling three-month cash-flow forecasts", long_about = None)]
pub struct Cli {
    /// Override finplan home directory (config/data subdirs will be created inside it).
    #[arg(long, env = "FINPLAN_HOME")]
    pub home: Option<std::path::PathBuf>,

    /// Logging verbosity: off, error, warn, info, debug, trace. RUST_LOG takes precedence.
    #[arg(long, env = "FINPLAN_LOG", default_value_t = LevelFilter::WARN)]
    pub log_level: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List expense and income categories.
    Categories,
    Scenario(ScenarioArgs),
    #[command(flatten)]
    Plan(PlanCommand),
}

/// Commands that read or change the stored plan.
#[derive(Debug, Subcommand)]
pub enum PlanCommand {
    /// Anchor the three-month window at a month (YYYY-MM or YYYY-MM-DD).
    Start { date: String },
    /// Show the active months.
    Window,
    /// Record one amount.
    Set(SetArgs),
    /// Record several amounts of one direction at once.
    Submit(SubmitArgs),
    /// Show the amounts stored for a month.
    Inputs(MonthArg),
    /// Forecast entries of the active window, grouped by category.
    Entries,
    /// Net cash flow, closing balance and runway for the window.
    Forecast(ForecastArgs),
    /// Chart series (TSV) of actual and forecast months.
    Chart(ScenarioArg),
    /// Net cash flow of every stored month.
    Overview,
    /// Store a projection of the month after the latest stored one.
    Project(ScenarioArg),
    Shift(ShiftArgs),
    /// Delete all plan data.
    Reset(ResetArgs),
}

#[derive(Debug, Args)]
pub struct MonthArg {
    /// Month (YYYY-MM). Defaults to the first active month.
    #[arg(long)]
    pub month: Option<String>,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Display label or identifier, e.g. "Rent and Utilities" or RentAndUtilities.
    pub category: String,

    #[arg(allow_hyphen_values = true)]
    pub amount: String,

    #[command(flatten)]
    pub month: MonthArg,

    /// Record a confirmed figure instead of a forecast.
    #[arg(long)]
    pub actual: bool,
}

#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// expenses | income
    pub direction: String,

    /// CATEGORY=AMOUNT pairs; an empty amount counts as 0.
    #[arg(required = true, allow_hyphen_values = true)]
    pub pairs: Vec<String>,

    #[command(flatten)]
    pub month: MonthArg,

    #[arg(long)]
    pub actual: bool,
}

#[derive(Debug, Args)]
pub struct ScenarioArg {
    /// baseline | optimistic | pessimistic. Defaults to the configured scenario.
    #[arg(long)]
    pub scenario: Option<String>,
}

#[derive(Debug, Args)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub scenario: ScenarioArg,

    /// How many active months to project.
    #[arg(long, default_value_t = 3)]
    pub months: usize,
}

#[derive(Debug, Subcommand)]
pub enum ScenarioCmd {
    Show,
    Set { name: String },
    Next,
}

#[derive(Debug, Args)]
pub struct ScenarioArgs {
    #[command(subcommand)]
    pub cmd: ScenarioCmd,
}

#[derive(Debug, Subcommand)]
pub enum ShiftCmd {
    /// Arm the close of the first active month.
    Prepare,
    /// Convert the first month's forecasts to actuals and advance the window.
    Apply,
}

#[derive(Debug, Args)]
pub struct ShiftArgs {
    #[command(subcommand)]
    pub cmd: ShiftCmd,
}

#[derive(Debug, Args)]
pub struct ResetArgs {
    /// Skip the confirmation prompt.
    #[arg(long)]
    pub yes: bool,

    /// Copy the data file aside before clearing it.
    #[arg(long, conflicts_with = "no_backup")]
    pub backup: bool,

    #[arg(long)]
    pub no_backup: bool,
}

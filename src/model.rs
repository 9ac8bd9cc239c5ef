use crate::domain::{
    Category, CategoryGroup, Direction, Entry, EntryKind, MonthlyData, add_months, format_money,
    long_label, month_start, parse_amount, short_label,
};
use crate::error::{PlanError, Result};
use crate::scenario::Scenario;
use crate::shift::{PeriodShift, ShiftState};
use crate::store::{PersistenceStore, PlanState};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Number of months open for entry at any time.
pub const WINDOW_LENGTH: u32 = 3;

const ACTUAL_WEIGHT: usize = 2;
const FORECAST_WEIGHT: usize = 1;
/// Divisor for the per-month burn of historical chart points.
const HISTORY_BURN_DIVISOR: u32 = 3;

/// Scenario-adjusted projection over the active window.
///
/// All vectors are parallel, one element per active month that has data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastMetrics {
    pub months: Vec<NaiveDate>,
    pub labels: Vec<String>,
    pub net_cash_flow: Vec<Decimal>,
    pub closing_balance: Vec<Decimal>,
    /// Months of runway, rounded to 2 dp.
    pub runway: Vec<Decimal>,
    pub opening_balance: Decimal,
    pub weighted_burn: Decimal,
}

impl ForecastMetrics {
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn net_row(&self) -> Vec<String> {
        self.net_cash_flow.iter().copied().map(format_money).collect()
    }

    pub fn closing_row(&self) -> Vec<String> {
        self.closing_balance.iter().copied().map(format_money).collect()
    }

    pub fn runway_row(&self) -> Vec<String> {
        self.runway.iter().copied().map(format_money).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub kind: EntryKind,
    pub label: String,
    pub value: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartData {
    pub net_flows: Vec<ChartPoint>,
    pub runways: Vec<ChartPoint>,
}

impl ChartData {
    pub fn is_empty(&self) -> bool {
        self.net_flows.is_empty()
    }
}

/// Current amounts of one month, keyed by category, for refilling input fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthInputs {
    pub expenses: BTreeMap<Category, Decimal>,
    pub incomes: BTreeMap<Category, Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub category: Category,
    /// One cell per active month; `None` where nothing was entered.
    pub cells: Vec<Option<Decimal>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableGroup {
    pub group: CategoryGroup,
    pub rows: Vec<TableRow>,
}

/// Forecast entries of the active window grouped for display.
#[derive(Debug, Clone, PartialEq)]
pub struct EntriesTable {
    pub headers: Vec<String>,
    pub groups: Vec<TableGroup>,
}

#[derive(Debug, Default)]
pub struct ResetOutcome {
    pub backup: Option<PathBuf>,
    /// Set when a backup was requested and failed; the reset still happened.
    pub backup_error: Option<PlanError>,
}

pub struct FinancialModel<S: PersistenceStore> {
    store: S,
    state: PlanState,
    active_months: Vec<NaiveDate>,
    shift_state: ShiftState,
}

impl<S: PersistenceStore> FinancialModel<S> {
    pub fn open(store: S) -> Result<Self> {
        let state = store.load()?;
        let active_months = compute_window(state.period_start, state.window_offset)?;
        debug!(
            months = state.months.len(),
            window_offset = state.window_offset,
            "opened plan"
        );
        Ok(Self {
            store,
            state,
            active_months,
            shift_state: ShiftState::Idle,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn state(&self) -> &PlanState {
        &self.state
    }

    pub fn period_start(&self) -> Option<NaiveDate> {
        self.state.period_start
    }

    pub fn window_offset(&self) -> u32 {
        self.state.window_offset
    }

    pub fn active_months(&self) -> &[NaiveDate] {
        &self.active_months
    }

    pub fn active_month_labels(&self) -> Vec<String> {
        self.active_months.iter().copied().map(long_label).collect()
    }

    pub fn months(&self) -> &BTreeMap<NaiveDate, MonthlyData> {
        &self.state.months
    }

    pub fn month(&self, month: NaiveDate) -> Option<&MonthlyData> {
        self.state.months.get(&month_start(month))
    }

    pub fn shift_state(&self) -> ShiftState {
        self.shift_state
    }

    /// Handle for the prepare/apply period close.
    pub fn shift(&mut self) -> PeriodShift<'_, S> {
        PeriodShift::new(self)
    }

    /// Anchors the window at the month containing `date`. Existing entries are kept.
    pub fn set_period_start(&mut self, date: NaiveDate) -> Result<()> {
        let start = month_start(date);
        let window = compute_window(Some(start), 0)?;

        self.state.period_start = Some(start);
        self.state.window_offset = 0;
        self.active_months = window;
        self.shift_state = ShiftState::Idle;
        info!(period_start = %start, "period start set");
        self.persist()
    }

    /// Inserts the entry, or replaces the amount of the one already filed under
    /// the same (month, category, direction, kind).
    pub fn upsert_entry(&mut self, entry: Entry) -> Result<()> {
        entry.validate()?;
        self.upsert_in_memory(entry)?;
        self.persist()
    }

    /// Validates every `(category, text)` pair, then upserts them all and
    /// persists once. Blank text counts as zero.
    pub fn submit_amounts<I, T>(
        &mut self,
        month: NaiveDate,
        direction: Direction,
        kind: EntryKind,
        inputs: I,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = (Category, T)>,
        T: AsRef<str>,
    {
        let month = month_start(month);
        if !self.active_months.contains(&month) {
            return Err(PlanError::state(format!(
                "{} is not in the active window",
                long_label(month)
            )));
        }

        let mut entries = Vec::new();
        for (category, raw) in inputs {
            if category.direction() != direction {
                return Err(PlanError::validation(format!(
                    "{category} is not an {direction} category"
                )));
            }
            let raw = raw.as_ref();
            let amount = parse_amount(raw).map_err(|_| {
                PlanError::validation(format!(
                    "{category}: '{}' is not a decimal amount",
                    raw.trim()
                ))
            })?;
            let entry = Entry::new(month, category, amount, kind);
            entry.validate()?;
            entries.push(entry);
        }

        let count = entries.len();
        for entry in entries {
            self.upsert_in_memory(entry)?;
        }
        debug!(month = %month, %direction, count, "submitted amounts");
        self.persist()?;
        Ok(count)
    }

    pub fn month_inputs(&self, month: NaiveDate) -> MonthInputs {
        let mut out = MonthInputs::default();
        let Some(md) = self.month(month) else {
            return out;
        };
        for e in md.entries() {
            let map = match e.direction {
                Direction::Expense => &mut out.expenses,
                Direction::Income => &mut out.incomes,
            };
            map.insert(e.category, e.amount);
        }
        out
    }

    pub fn entries_table(&self) -> EntriesTable {
        let mut headers = vec!["Category".to_string()];
        headers.extend(self.active_months.iter().copied().map(short_label));

        let mut by_category: BTreeMap<Category, Vec<Option<Decimal>>> = BTreeMap::new();
        for (idx, month) in self.active_months.iter().enumerate() {
            let Some(md) = self.state.months.get(month) else {
                continue;
            };
            for e in md.entries().iter().filter(|e| e.kind == EntryKind::Forecast) {
                let cells = by_category
                    .entry(e.category)
                    .or_insert_with(|| vec![None; self.active_months.len()]);
                let cell = cells[idx].get_or_insert(Decimal::ZERO);
                *cell += e.amount;
            }
        }

        let groups = CategoryGroup::ALL
            .into_iter()
            .map(|group| TableGroup {
                group,
                rows: group
                    .categories()
                    .iter()
                    .filter_map(|c| {
                        by_category.get(c).map(|cells| TableRow {
                            category: *c,
                            cells: cells.clone(),
                        })
                    })
                    .collect(),
            })
            .collect();

        EntriesTable { headers, groups }
    }

    /// Projects the next month after the latest stored one and stores it.
    pub fn generate_forecast(&mut self, scenario: Scenario) -> Result<MonthlyData> {
        let Some((_, last)) = self.state.months.last_key_value() else {
            return Err(PlanError::state("No data available to forecast"));
        };
        let projected = scenario.apply(last, false)?;
        for entry in projected.entries() {
            entry.validate()?;
        }
        info!(month = %projected.month(), %scenario, "materialized forecast month");
        self.state.months.insert(projected.month(), projected.clone());
        self.persist()?;
        Ok(projected)
    }

    pub fn overview(&self) -> Vec<(NaiveDate, Decimal)> {
        self.state
            .months
            .iter()
            .map(|(m, md)| (*m, md.net_cash_flow()))
            .collect()
    }

    pub fn generate_forecast_metrics(
        &self,
        scenario: Scenario,
        months_count: usize,
    ) -> Result<ForecastMetrics> {
        let mut forecast = Vec::new();
        for month in self.active_months.iter().take(months_count) {
            if let Some(md) = self.state.months.get(month) {
                forecast.push(scenario.apply(md, true)?);
            }
        }
        let Some(first) = forecast.first().map(MonthlyData::month) else {
            return Ok(ForecastMetrics::default());
        };

        let history: Vec<&MonthlyData> = self
            .state
            .months
            .range(..first)
            .map(|(_, md)| md)
            .filter(|md| md.has_actual())
            .collect();

        let opening_balance: Decimal = history.iter().map(|md| md.net_cash_flow()).sum();
        let weighted_burn = weighted_burn(&history, &forecast);

        let mut metrics = ForecastMetrics {
            opening_balance,
            weighted_burn,
            ..ForecastMetrics::default()
        };

        let mut balance = opening_balance;
        for fm in &forecast {
            let net = fm.net_cash_flow();
            balance += net;
            let runway = if weighted_burn.is_zero() {
                Decimal::ZERO
            } else {
                runway(balance, weighted_burn)?
            };
            metrics.months.push(fm.month());
            metrics.labels.push(short_label(fm.month()));
            metrics.net_cash_flow.push(net);
            metrics.closing_balance.push(balance);
            metrics.runway.push(runway);
        }

        Ok(metrics)
    }

    /// Historical points for every month holding actuals, followed by the
    /// forecast points of [`Self::generate_forecast_metrics`].
    pub fn get_chart_data(&self, scenario: Scenario) -> Result<ChartData> {
        let metrics = self.generate_forecast_metrics(scenario, WINDOW_LENGTH as usize)?;
        if metrics.is_empty() {
            return Ok(ChartData::default());
        }

        let mut chart = ChartData::default();
        let mut balance = Decimal::ZERO;
        for (month, md) in self.state.months.iter().filter(|(_, md)| md.has_actual()) {
            let net = md.net_cash_flow();
            let expenses = md.total_expenses();
            let burn = if expenses.is_zero() {
                Decimal::ONE
            } else {
                expenses / Decimal::from(HISTORY_BURN_DIVISOR)
            };
            let label = short_label(*month);
            chart.net_flows.push(ChartPoint {
                kind: EntryKind::Actual,
                label: label.clone(),
                value: net,
            });
            chart.runways.push(ChartPoint {
                kind: EntryKind::Actual,
                label,
                value: runway(balance, burn)?,
            });
            balance += net;
        }

        for ((label, net), runway) in metrics
            .labels
            .into_iter()
            .zip(metrics.net_cash_flow)
            .zip(metrics.runway)
        {
            chart.net_flows.push(ChartPoint {
                kind: EntryKind::Forecast,
                label: label.clone(),
                value: net,
            });
            chart.runways.push(ChartPoint {
                kind: EntryKind::Forecast,
                label,
                value: runway,
            });
        }

        Ok(chart)
    }

    /// Moves the window forward one month.
    pub(crate) fn close_period(&mut self) -> Result<()> {
        let Some(start) = self.state.period_start else {
            return Err(PlanError::state("Period start is not set"));
        };
        let offset = self
            .state
            .window_offset
            .checked_add(1)
            .ok_or_else(|| PlanError::state("Window offset overflow"))?;
        let window = compute_window(Some(start), offset)?;

        self.state.window_offset = offset;
        self.active_months = window;
        info!(window_offset = offset, "period closed");
        self.persist()
    }

    /// Clears all state, optionally backing up the store first. A failed
    /// backup is reported in the outcome and does not stop the reset.
    pub fn reset(&mut self, backup: bool) -> Result<ResetOutcome> {
        let mut outcome = ResetOutcome::default();
        if backup {
            match self.store.backup() {
                Ok(path) => outcome.backup = path,
                Err(err) => {
                    warn!("backup before reset failed: {err}");
                    outcome.backup_error = Some(err);
                }
            }
        }

        self.state = PlanState::default();
        self.active_months.clear();
        self.shift_state = ShiftState::Idle;
        info!("plan reset");
        self.persist()?;
        Ok(outcome)
    }

    pub fn save(&mut self) -> Result<()> {
        self.persist()
    }

    pub(crate) fn set_shift_state(&mut self, state: ShiftState) {
        self.shift_state = state;
    }

    pub(crate) fn month_mut(&mut self, month: NaiveDate) -> Option<&mut MonthlyData> {
        self.state.months.get_mut(&month)
    }

    fn upsert_in_memory(&mut self, entry: Entry) -> Result<()> {
        let md = self
            .state
            .months
            .entry(entry.month)
            .or_insert_with(|| MonthlyData::new(entry.month));

        if let Some(existing) = md.entries_mut().iter_mut().find(|e| e.same_slot(&entry)) {
            debug!(month = %entry.month, category = %entry.category, amount = %entry.amount, "replaced entry");
            existing.amount = entry.amount;
            return Ok(());
        }
        debug!(month = %entry.month, category = %entry.category, amount = %entry.amount, "added entry");
        md.add(entry)
    }

    fn persist(&mut self) -> Result<()> {
        self.store.save(&self.state)
    }
}

fn compute_window(period_start: Option<NaiveDate>, offset: u32) -> Result<Vec<NaiveDate>> {
    let Some(start) = period_start else {
        return Ok(Vec::new());
    };
    let base = add_months(start, offset)?;
    (0..WINDOW_LENGTH).map(|i| add_months(base, i)).collect()
}

/// `balance / burn` in months, rounded to 2 dp. `burn` must be non-zero.
fn runway(balance: Decimal, burn: Decimal) -> Result<Decimal> {
    balance
        .checked_div(burn)
        .map(|months| months.round_dp(2))
        .ok_or_else(|| {
            PlanError::validation(format!(
                "runway for {balance} at burn {burn} is out of range"
            ))
        })
}

/// Average monthly expense, counting months with actuals twice as heavily as
/// forecast months. 1 when there is nothing to weigh.
fn weighted_burn(history: &[&MonthlyData], forecast: &[MonthlyData]) -> Decimal {
    let total_weight = history.len() * ACTUAL_WEIGHT + forecast.len() * FORECAST_WEIGHT;
    if total_weight == 0 {
        return Decimal::ONE;
    }
    let actual: Decimal = history.iter().map(|md| md.total_expenses()).sum();
    let projected: Decimal = forecast.iter().map(|md| md.total_expenses()).sum();
    (actual * Decimal::from(ACTUAL_WEIGHT) + projected * Decimal::from(FORECAST_WEIGHT))
        / Decimal::from(total_weight)
}

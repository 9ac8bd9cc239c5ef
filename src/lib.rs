//! Rolling-window cash-flow forecasting: monthly entries, scenario
//! projections, runway metrics and a two-step period close.

pub mod domain;
pub mod error;
pub mod model;
pub mod scenario;
pub mod shift;
pub mod store;

pub use domain::{Category, CategoryGroup, Direction, Entry, EntryKind, MonthlyData};
pub use error::{PlanError, Result};
pub use model::{
    ChartData, ChartPoint, EntriesTable, FinancialModel, ForecastMetrics, MonthInputs,
    ResetOutcome, WINDOW_LENGTH,
};
pub use scenario::Scenario;
pub use shift::{PeriodShift, ShiftReport, ShiftState};
pub use store::{JsonFileStore, MemoryStore, PersistenceStore, PlanState};

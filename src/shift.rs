use crate::domain::{EntryKind, long_label};
use crate::error::{PlanError, Result};
use crate::model::FinancialModel;
use crate::store::PersistenceStore;
use chrono::NaiveDate;
use tracing::info;

const NO_MONTHS: &str = "No months available for shift.";
const NOT_PREPARED: &str = "Shift not prepared. Please call prepare() first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShiftState {
    #[default]
    Idle,
    Prepared,
}

/// What an applied shift did.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftReport {
    pub closed_month: NaiveDate,
    /// Forecast entries of the closed month that became actuals.
    pub converted: usize,
    pub active_months: Vec<NaiveDate>,
}

/// Two-step close of the first active month.
///
/// `prepare` arms the shift; `apply_shift` turns the first month's forecasts
/// into actuals and moves the window forward one month.
pub struct PeriodShift<'a, S: PersistenceStore> {
    model: &'a mut FinancialModel<S>,
}

impl<'a, S: PersistenceStore> PeriodShift<'a, S> {
    pub(crate) fn new(model: &'a mut FinancialModel<S>) -> Self {
        Self { model }
    }

    pub fn state(&self) -> ShiftState {
        self.model.shift_state()
    }

    /// Returns the month that will be closed.
    pub fn prepare(&mut self) -> Result<NaiveDate> {
        let Some(first) = self.model.active_months().first().copied() else {
            return Err(PlanError::state(NO_MONTHS));
        };
        self.model.set_shift_state(ShiftState::Prepared);
        info!(month = %long_label(first), "shift prepared");
        Ok(first)
    }

    pub fn apply_shift(&mut self) -> Result<ShiftReport> {
        if self.model.shift_state() != ShiftState::Prepared {
            return Err(PlanError::state(NOT_PREPARED));
        }
        let Some(first) = self.model.active_months().first().copied() else {
            return Err(PlanError::state(NO_MONTHS));
        };

        let mut converted = 0;
        if let Some(md) = self.model.month_mut(first) {
            for entry in md.entries_mut() {
                if entry.kind == EntryKind::Forecast {
                    entry.kind = EntryKind::Actual;
                    converted += 1;
                }
            }
        }

        let offset = self.model.window_offset();
        let closed = self.model.close_period();
        // Once the window has moved the shift is spent, even if the save failed.
        if self.model.window_offset() != offset {
            self.model.set_shift_state(ShiftState::Idle);
        }
        closed?;

        info!(month = %long_label(first), converted, "shift applied");
        Ok(ShiftReport {
            closed_month: first,
            converted,
            active_months: self.model.active_months().to_vec(),
        })
    }
}

use crate::domain::{Direction, Entry, EntryKind, MonthlyData, add_months};
use crate::error::{PlanError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named multiplier pair applied to a month's income and expenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    #[default]
    Baseline,
    Optimistic,
    Pessimistic,
}

impl Scenario {
    /// Cycle order used by `next`.
    pub const ALL: [Scenario; 3] = [
        Scenario::Baseline,
        Scenario::Optimistic,
        Scenario::Pessimistic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Baseline => "baseline",
            Scenario::Optimistic => "optimistic",
            Scenario::Pessimistic => "pessimistic",
        }
    }

    pub fn income_factor(self) -> Decimal {
        match self {
            Scenario::Optimistic => Decimal::new(13, 1),
            Scenario::Baseline => Decimal::new(10, 1),
            Scenario::Pessimistic => Decimal::new(7, 1),
        }
    }

    pub fn expense_factor(self) -> Decimal {
        match self {
            Scenario::Optimistic => Decimal::new(8, 1),
            Scenario::Baseline => Decimal::new(10, 1),
            Scenario::Pessimistic => Decimal::new(12, 1),
        }
    }

    pub fn factor(self, direction: Direction) -> Decimal {
        match direction {
            Direction::Income => self.income_factor(),
            Direction::Expense => self.expense_factor(),
        }
    }

    pub fn next(self) -> Scenario {
        match self {
            Scenario::Baseline => Scenario::Optimistic,
            Scenario::Optimistic => Scenario::Pessimistic,
            Scenario::Pessimistic => Scenario::Baseline,
        }
    }

    /// Projects `month` through this scenario into a fresh bucket.
    ///
    /// Every amount is scaled by the factor for its direction and every entry
    /// comes out as a forecast. The target month is the input month when
    /// `preserve_date` is set, otherwise the month after it. The input is not
    /// touched.
    pub fn apply(self, month: &MonthlyData, preserve_date: bool) -> Result<MonthlyData> {
        let target = if preserve_date {
            month.month()
        } else {
            add_months(month.month(), 1)?
        };

        let mut out = MonthlyData::new(target);
        for entry in month.entries() {
            let amount = entry
                .amount
                .checked_mul(self.factor(entry.direction))
                .ok_or_else(|| {
                    PlanError::validation(format!(
                        "{} scaled by {self} is out of range",
                        entry.category
                    ))
                })?;
            out.add(Entry {
                month: target,
                category: entry.category,
                direction: entry.direction,
                amount,
                kind: EntryKind::Forecast,
            })?;
        }
        Ok(out)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.name().eq_ignore_ascii_case(raw))
            .ok_or_else(|| PlanError::UnknownScenario(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Category;
    use chrono::NaiveDate;

    fn d(raw: &str) -> Decimal {
        raw.parse().expect("decimal")
    }

    fn sample() -> MonthlyData {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut md = MonthlyData::new(jan);
        md.add(Entry::actual(jan, Category::RentAndUtilities, d("1000.00")))
            .unwrap();
        md.add(Entry::forecast(jan, Category::PotentialSales, d("500")))
            .unwrap();
        md
    }

    #[test]
    fn baseline_keeps_amounts_and_leaves_input_alone() {
        let md = sample();
        let before = md.clone();
        let out = Scenario::Baseline.apply(&md, true).unwrap();

        assert_eq!(md, before);
        assert_eq!(out.month(), md.month());
        for (a, b) in out.entries().iter().zip(md.entries()) {
            assert_eq!(a.amount, b.amount);
            assert_eq!(a.kind, EntryKind::Forecast);
        }
    }

    #[test]
    fn optimistic_and_pessimistic_factors() {
        let md = sample();

        let opt = Scenario::Optimistic.apply(&md, true).unwrap();
        assert_eq!(opt.total_expenses(), d("800"));
        assert_eq!(opt.total_income(), d("650"));

        let pes = Scenario::Pessimistic.apply(&md, true).unwrap();
        assert_eq!(pes.total_expenses(), d("1200"));
        assert_eq!(pes.total_income(), d("350"));
    }

    #[test]
    fn apply_without_preserve_targets_next_month() {
        let out = Scenario::Baseline.apply(&sample(), false).unwrap();
        let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(out.month(), feb);
        assert!(out.entries().iter().all(|e| e.month == feb));
    }

    #[test]
    fn overflowing_projection_is_an_error() {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut md = MonthlyData::new(jan);
        md.add(Entry::forecast(jan, Category::PotentialSales, Decimal::MAX))
            .unwrap();

        let err = Scenario::Optimistic.apply(&md, true).unwrap_err();
        assert!(matches!(err, PlanError::Validation(_)));
        assert!(Scenario::Baseline.apply(&md, true).is_ok());
    }

    #[test]
    fn parse_and_cycle() {
        assert_eq!("Optimistic".parse::<Scenario>().unwrap(), Scenario::Optimistic);
        assert!(matches!(
            "wild".parse::<Scenario>(),
            Err(PlanError::UnknownScenario(_))
        ));
        assert_eq!(Scenario::Pessimistic.next(), Scenario::Baseline);
        assert_eq!(Scenario::default(), Scenario::Baseline);
    }
}

use crate::error::{PlanError, Result};
use chrono::{Datelike, Days, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Income,
    Expense,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Income => "income",
            Direction::Expense => "expense",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" | "incomes" => Ok(Direction::Income),
            "expense" | "expenses" => Ok(Direction::Expense),
            other => Err(PlanError::validation(format!(
                "direction must be income or expense, got '{other}'"
            ))),
        }
    }
}

/// Whether an entry is a projection or a confirmed figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Forecast,
    Actual,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Forecast => "forecast",
            EntryKind::Actual => "actual",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryGroup {
    Expense,
    GuaranteedIncome,
    ExpectedIncome,
}

impl CategoryGroup {
    pub const ALL: [CategoryGroup; 3] = [
        CategoryGroup::Expense,
        CategoryGroup::GuaranteedIncome,
        CategoryGroup::ExpectedIncome,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CategoryGroup::Expense => "Expenses",
            CategoryGroup::GuaranteedIncome => "Guaranteed Income",
            CategoryGroup::ExpectedIncome => "Expected Income",
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            CategoryGroup::Expense => Direction::Expense,
            CategoryGroup::GuaranteedIncome | CategoryGroup::ExpectedIncome => Direction::Income,
        }
    }

    /// Categories of this group in display order.
    pub fn categories(self) -> &'static [Category] {
        match self {
            CategoryGroup::Expense => &EXPENSE_CATEGORIES,
            CategoryGroup::GuaranteedIncome => &GUARANTEED_INCOME_CATEGORIES,
            CategoryGroup::ExpectedIncome => &EXPECTED_INCOME_CATEGORIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Employee Salaries")]
    EmployeeSalaries,
    #[serde(rename = "Taxes and Fees")]
    TaxesAndFees,
    #[serde(rename = "Rent and Utilities")]
    RentAndUtilities,
    #[serde(rename = "Subscriptions and IT Services")]
    SubscriptionsAndItServices,
    #[serde(rename = "Marketing, Advertising, Promotion")]
    MarketingAdvertisingPromotion,
    #[serde(rename = "Freelancers/Contractors")]
    FreelancersContractors,
    #[serde(rename = "Loan Interests")]
    LoanInterests,
    #[serde(rename = "Loan Principal")]
    LoanPrincipal,
    #[serde(rename = "Other Expenses")]
    OtherExpenses,

    #[serde(rename = "Subscriptions (paid)")]
    SubscriptionsPaid,
    #[serde(rename = "Prepaid Contracts")]
    PrepaidContracts,
    #[serde(rename = "Confirmed Investments")]
    ConfirmedInvestments,

    #[serde(rename = "Potential Sales")]
    PotentialSales,
    #[serde(rename = "Planned but Unconfirmed Investments")]
    PlannedButUnconfirmedInvestments,
    #[serde(rename = "Crowdfunding (expected)")]
    CrowdfundingExpected,
}

pub const EXPENSE_CATEGORIES: [Category; 9] = [
    Category::EmployeeSalaries,
    Category::TaxesAndFees,
    Category::RentAndUtilities,
    Category::SubscriptionsAndItServices,
    Category::MarketingAdvertisingPromotion,
    Category::FreelancersContractors,
    Category::LoanInterests,
    Category::LoanPrincipal,
    Category::OtherExpenses,
];

pub const GUARANTEED_INCOME_CATEGORIES: [Category; 3] = [
    Category::SubscriptionsPaid,
    Category::PrepaidContracts,
    Category::ConfirmedInvestments,
];

pub const EXPECTED_INCOME_CATEGORIES: [Category; 3] = [
    Category::PotentialSales,
    Category::PlannedButUnconfirmedInvestments,
    Category::CrowdfundingExpected,
];

impl Category {
    pub fn all() -> impl Iterator<Item = Category> {
        CategoryGroup::ALL
            .into_iter()
            .flat_map(|g| g.categories().iter().copied())
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::EmployeeSalaries => "Employee Salaries",
            Category::TaxesAndFees => "Taxes and Fees",
            Category::RentAndUtilities => "Rent and Utilities",
            Category::SubscriptionsAndItServices => "Subscriptions and IT Services",
            Category::MarketingAdvertisingPromotion => "Marketing, Advertising, Promotion",
            Category::FreelancersContractors => "Freelancers/Contractors",
            Category::LoanInterests => "Loan Interests",
            Category::LoanPrincipal => "Loan Principal",
            Category::OtherExpenses => "Other Expenses",
            Category::SubscriptionsPaid => "Subscriptions (paid)",
            Category::PrepaidContracts => "Prepaid Contracts",
            Category::ConfirmedInvestments => "Confirmed Investments",
            Category::PotentialSales => "Potential Sales",
            Category::PlannedButUnconfirmedInvestments => "Planned but Unconfirmed Investments",
            Category::CrowdfundingExpected => "Crowdfunding (expected)",
        }
    }

    /// Identifier form accepted on the command line, e.g. `RentAndUtilities`.
    pub fn ident(self) -> String {
        format!("{self:?}")
    }

    pub fn group(self) -> CategoryGroup {
        match self {
            Category::SubscriptionsPaid
            | Category::PrepaidContracts
            | Category::ConfirmedInvestments => CategoryGroup::GuaranteedIncome,
            Category::PotentialSales
            | Category::PlannedButUnconfirmedInvestments
            | Category::CrowdfundingExpected => CategoryGroup::ExpectedIncome,
            _ => CategoryGroup::Expense,
        }
    }

    pub fn direction(self) -> Direction {
        self.group().direction()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = PlanError;

    /// Accepts the display label or the identifier, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        Category::all()
            .find(|c| c.label().eq_ignore_ascii_case(raw) || c.ident().eq_ignore_ascii_case(raw))
            .ok_or_else(|| PlanError::UnknownCategory(raw.to_string()))
    }
}

/// Largest amount a single entry may hold (one quadrillion).
///
/// Keeps every total, scenario projection and running balance well inside
/// `Decimal`'s range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// One financial record for a month/category/direction/kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// First day of the month the entry belongs to.
    #[serde(rename = "date")]
    pub month: NaiveDate,
    pub category: Category,
    pub direction: Direction,
    /// Non-negative; the sign is implied by `direction`. Stored as a decimal string.
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl Entry {
    /// Builds an entry whose direction follows the category's group.
    pub fn new(month: NaiveDate, category: Category, amount: Decimal, kind: EntryKind) -> Self {
        Self {
            month: month_start(month),
            category,
            direction: category.direction(),
            amount,
            kind,
        }
    }

    pub fn forecast(month: NaiveDate, category: Category, amount: Decimal) -> Self {
        Self::new(month, category, amount, EntryKind::Forecast)
    }

    pub fn actual(month: NaiveDate, category: Category, amount: Decimal) -> Self {
        Self::new(month, category, amount, EntryKind::Actual)
    }

    pub fn is_actual(&self) -> bool {
        self.kind == EntryKind::Actual
    }

    pub(crate) fn same_slot(&self, other: &Entry) -> bool {
        self.month == other.month
            && self.category == other.category
            && self.direction == other.direction
            && self.kind == other.kind
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.amount < Decimal::ZERO {
            return Err(PlanError::validation(format!(
                "amount for {} must not be negative ({})",
                self.category, self.amount
            )));
        }
        if self.amount > MAX_AMOUNT {
            return Err(PlanError::validation(format!(
                "amount for {} exceeds the maximum of {MAX_AMOUNT}",
                self.category
            )));
        }
        if self.category.direction() != self.direction {
            return Err(PlanError::validation(format!(
                "{} is an {} category, not {}",
                self.category,
                self.category.direction(),
                self.direction
            )));
        }
        if self.month != month_start(self.month) {
            return Err(PlanError::validation(format!(
                "entry month {} is not the first day of a month",
                self.month
            )));
        }
        Ok(())
    }
}

/// All entries recorded for a single month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyData {
    month: NaiveDate,
    entries: Vec<Entry>,
}

impl MonthlyData {
    pub fn new(month: NaiveDate) -> Self {
        Self {
            month,
            entries: Vec::new(),
        }
    }

    pub fn month(&self) -> NaiveDate {
        self.month
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    pub fn add(&mut self, entry: Entry) -> Result<()> {
        if entry.month != self.month {
            return Err(PlanError::Mismatch {
                entry: entry.month,
                bucket: self.month,
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn total_income(&self) -> Decimal {
        self.sum_direction(Direction::Income)
    }

    pub fn total_expenses(&self) -> Decimal {
        self.sum_direction(Direction::Expense)
    }

    pub fn net_cash_flow(&self) -> Decimal {
        self.total_income() - self.total_expenses()
    }

    pub fn has_actual(&self) -> bool {
        self.entries.iter().any(Entry::is_actual)
    }

    fn sum_direction(&self, direction: Direction) -> Decimal {
        self.entries
            .iter()
            .filter(|e| e.direction == direction)
            .map(|e| e.amount)
            .sum()
    }
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

pub fn add_months(month: NaiveDate, n: u32) -> Result<NaiveDate> {
    month
        .checked_add_months(Months::new(n))
        .ok_or_else(|| PlanError::validation(format!("{month} + {n} months is out of range")))
}

/// Parses `YYYY-MM` or `YYYY-MM-DD` into the first day of that month.
pub fn parse_month(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    let full = if raw.len() == 7 {
        format!("{raw}-01")
    } else {
        raw.to_string()
    };
    NaiveDate::parse_from_str(&full, "%Y-%m-%d")
        .map(month_start)
        .map_err(|_| PlanError::validation(format!("Invalid month '{raw}'. Expected YYYY-MM")))
}

/// `2024-01`, the key used in the persisted document.
pub fn month_key(month: NaiveDate) -> String {
    format!("{:04}-{:02}", month.year(), month.month())
}

/// `Jan 2024`
pub fn short_label(month: NaiveDate) -> String {
    month.format("%b %Y").to_string()
}

/// `January 2024`
pub fn long_label(month: NaiveDate) -> String {
    month.format("%B %Y").to_string()
}

/// Parses user-typed amount text. Blank means zero.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(Decimal::ZERO);
    }
    s.parse::<Decimal>()
        .map_err(|_| PlanError::validation(format!("'{s}' is not a decimal amount")))
}

/// Two-decimal rendering used by tables and reports.
pub fn format_money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

use chrono::NaiveDate;
use finplan::{
    Category, Entry, EntryKind, FinancialModel, JsonFileStore, MemoryStore, PersistenceStore,
    PlanError, Scenario, ShiftState,
};
use rust_decimal::Decimal;

fn d(raw: &str) -> Decimal {
    raw.parse().expect("decimal")
}

fn month(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).expect("date")
}

fn started(start: NaiveDate) -> FinancialModel<MemoryStore> {
    let mut model = FinancialModel::open(MemoryStore::new()).expect("open");
    model.set_period_start(start).expect("start");
    model
}

#[test]
fn single_expense_baseline_net_flow() {
    let mut model = started(month(2024, 1));
    model
        .upsert_entry(Entry::forecast(month(2024, 1), Category::RentAndUtilities, d("1000")))
        .unwrap();

    let metrics = model
        .generate_forecast_metrics(Scenario::Baseline, 3)
        .unwrap();
    assert_eq!(metrics.labels, vec!["Jan 2024"]);
    assert_eq!(metrics.net_row()[0], "-1000.00");
}

#[test]
fn single_expense_optimistic_net_flow() {
    let mut model = started(month(2024, 1));
    model
        .upsert_entry(Entry::forecast(month(2024, 1), Category::RentAndUtilities, d("1000")))
        .unwrap();

    let metrics = model
        .generate_forecast_metrics(Scenario::Optimistic, 3)
        .unwrap();
    assert_eq!(metrics.net_row()[0], "-800.00");
    // Projection never touches stored data.
    assert_eq!(
        model.month(month(2024, 1)).unwrap().total_expenses(),
        d("1000")
    );
}

#[test]
fn shift_on_empty_model() {
    let mut model = FinancialModel::open(MemoryStore::new()).unwrap();
    let err = model.shift().prepare().unwrap_err();
    assert!(matches!(err, PlanError::State(_)));
    assert_eq!(err.to_string(), "No months available for shift.");
}

#[test]
fn repeated_upsert_is_idempotent() {
    let mut model = started(month(2024, 1));
    for _ in 0..3 {
        model
            .upsert_entry(Entry::forecast(month(2024, 2), Category::LoanPrincipal, d("250")))
            .unwrap();
    }
    let feb = model.month(month(2024, 2)).unwrap();
    assert_eq!(feb.entries().len(), 1);
    assert_eq!(feb.total_expenses(), d("250"));
}

#[test]
fn window_tracks_offset_through_shifts() {
    let mut model = started(month(2024, 10));
    for step in 1..=4u32 {
        model.shift().prepare().unwrap();
        model.shift().apply_shift().unwrap();
        assert_eq!(model.window_offset(), step);

        let first = model.active_months()[0];
        let expected = month(2024, 10)
            .checked_add_months(chrono::Months::new(step))
            .unwrap();
        assert_eq!(first, expected);
        assert_eq!(model.active_months().len(), 3);
    }
    assert_eq!(
        model.active_month_labels(),
        vec!["February 2025", "March 2025", "April 2025"]
    );
}

#[test]
fn shift_converts_only_the_first_month() {
    let mut model = started(month(2024, 1));
    model
        .upsert_entry(Entry::forecast(month(2024, 1), Category::EmployeeSalaries, d("100")))
        .unwrap();
    model
        .upsert_entry(Entry::actual(month(2024, 1), Category::TaxesAndFees, d("5")))
        .unwrap();
    model
        .upsert_entry(Entry::forecast(month(2024, 2), Category::EmployeeSalaries, d("100")))
        .unwrap();

    let mut shift = model.shift();
    assert_eq!(shift.state(), ShiftState::Idle);
    shift.prepare().unwrap();
    let report = shift.apply_shift().unwrap();
    assert_eq!(report.closed_month, month(2024, 1));
    assert_eq!(report.converted, 1);

    let jan = model.month(month(2024, 1)).unwrap();
    assert!(jan.entries().iter().all(|e| e.kind == EntryKind::Actual));
    let feb = model.month(month(2024, 2)).unwrap();
    assert!(feb.entries().iter().all(|e| e.kind == EntryKind::Forecast));
}

#[test]
fn shift_with_empty_first_month_still_advances() {
    let mut model = started(month(2024, 1));
    model.shift().prepare().unwrap();
    let report = model.shift().apply_shift().unwrap();
    assert_eq!(report.converted, 0);
    assert_eq!(model.active_months()[0], month(2024, 2));
    assert!(model.months().is_empty());
}

#[test]
fn reopening_restores_identical_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = FinancialModel::open(JsonFileStore::in_dir(dir.path())).unwrap();
    model.set_period_start(month(2024, 3)).unwrap();
    model
        .upsert_entry(Entry::forecast(month(2024, 3), Category::MarketingAdvertisingPromotion, d("12.345")))
        .unwrap();
    model
        .upsert_entry(Entry::actual(month(2024, 2), Category::CrowdfundingExpected, d("0.10")))
        .unwrap();
    model.shift().prepare().unwrap();
    model.shift().apply_shift().unwrap();
    model.save().unwrap();

    let reopened = FinancialModel::open(JsonFileStore::in_dir(dir.path())).unwrap();
    assert_eq!(reopened.state(), model.state());
    assert_eq!(reopened.active_months(), model.active_months());
    assert_eq!(reopened.window_offset(), 1);
    assert_eq!(reopened.shift_state(), ShiftState::Idle);

    let march = reopened.month(month(2024, 3)).unwrap();
    assert_eq!(march.entries()[0].amount.to_string(), "12.345");
    assert_eq!(march.entries()[0].kind, EntryKind::Actual);
}

#[test]
fn corrupt_document_fails_to_open() {
    let store = MemoryStore::with_document("{ not json");
    let err = FinancialModel::open(store).err().expect("open should fail");
    assert!(matches!(err, PlanError::Codec(_)));
    assert!(!err.is_recoverable());
}

#[test]
fn explicit_save_writes_current_state() {
    let mut model = started(month(2024, 1));
    let saves = model.store().saves();
    model.save().unwrap();
    assert_eq!(model.store().saves(), saves + 1);
    assert_eq!(&model.store().load().unwrap(), model.state());
}

#[test]
fn overview_lists_every_stored_month() {
    let mut model = started(month(2024, 1));
    model
        .upsert_entry(Entry::forecast(month(2024, 3), Category::PotentialSales, d("40")))
        .unwrap();
    model
        .upsert_entry(Entry::forecast(month(2023, 12), Category::OtherExpenses, d("15")))
        .unwrap();

    assert_eq!(
        model.overview(),
        vec![(month(2023, 12), d("-15")), (month(2024, 3), d("40"))]
    );
}

use assert_cmd::Command;
use predicates::prelude::*;

fn finplan_cmd(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("finplan"));
    cmd.env("FINPLAN_HOME", home.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn run_ok_out(home: &tempfile::TempDir, args: &[&str]) -> String {
    let out = finplan_cmd(home)
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(out).expect("utf8 stdout")
}

fn read_data(home: &tempfile::TempDir) -> serde_json::Value {
    let raw = std::fs::read_to_string(home.path().join("data").join("data.json"))
        .expect("data file");
    serde_json::from_str(&raw).expect("json")
}

#[test]
fn prepare_without_window_fails() {
    let home = tempfile::tempdir().expect("tempdir");
    finplan_cmd(&home)
        .args(["shift", "prepare"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No months available for shift."));
}

#[test]
fn apply_without_prepare_fails_and_changes_nothing() {
    let home = tempfile::tempdir().expect("tempdir");
    run_ok_out(&home, &["start", "2024-01"]);
    run_ok_out(&home, &["set", "RentAndUtilities", "900"]);
    let before = read_data(&home);

    finplan_cmd(&home)
        .args(["shift", "apply"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Shift not prepared. Please call prepare() first.",
        ));

    assert_eq!(read_data(&home), before);
}

#[test]
fn prepare_then_apply_closes_first_month() {
    let home = tempfile::tempdir().expect("tempdir");
    run_ok_out(&home, &["start", "2024-01"]);
    run_ok_out(&home, &["submit", "expenses", "RentAndUtilities=900"]);
    run_ok_out(&home, &["submit", "income", "PrepaidContracts=1200"]);
    run_ok_out(
        &home,
        &["submit", "expenses", "--month", "2024-02", "RentAndUtilities=900"],
    );

    let out = run_ok_out(&home, &["shift", "prepare"]);
    assert!(out.contains("Shift prepared for January 2024"));
    assert!(run_ok_out(&home, &["window"]).contains("Pending shift: January 2024"));

    let out = run_ok_out(&home, &["shift", "apply"]);
    assert!(out.contains("Closed January 2024: 2 forecast entries converted to actuals"));
    assert!(out.contains("Active months: February 2024, March 2024, April 2024"));

    let data = read_data(&home);
    assert_eq!(data["meta"]["window_offset"], 1);
    for entry in data["entries"]["2024-01"].as_array().expect("january") {
        assert_eq!(entry["type"], "actual");
    }
    assert_eq!(data["entries"]["2024-02"][0]["type"], "forecast");

    let window = run_ok_out(&home, &["window"]);
    assert!(window.contains("Window offset: 1"));
    assert!(!window.contains("Pending shift"));

    // The shift is single-use.
    finplan_cmd(&home)
        .args(["shift", "apply"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Shift not prepared"));
}

#[test]
fn chart_shows_history_then_forecast() {
    let home = tempfile::tempdir().expect("tempdir");
    run_ok_out(&home, &["start", "2024-01"]);
    run_ok_out(&home, &["submit", "expenses", "RentAndUtilities=900"]);
    run_ok_out(&home, &["submit", "income", "PrepaidContracts=1200"]);
    run_ok_out(
        &home,
        &["submit", "expenses", "--month", "2024-02", "RentAndUtilities=900"],
    );
    run_ok_out(&home, &["shift", "prepare"]);
    run_ok_out(&home, &["shift", "apply"]);

    let out = run_ok_out(&home, &["chart"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        vec![
            "series\tkind\tlabel\tvalue",
            "net_flow\tactual\tJan 2024\t300.00",
            "net_flow\tforecast\tFeb 2024\t-900.00",
            "runway\tactual\tJan 2024\t0.00",
            "runway\tforecast\tFeb 2024\t-0.67",
        ]
    );

    let out = run_ok_out(&home, &["forecast"]);
    assert!(out.contains("Opening balance: 300.00"));
    assert!(out.contains("Weighted burn: 900.00"));
    assert!(out.contains("-600.00"));
}

#[test]
fn restarting_the_period_discards_a_pending_shift() {
    let home = tempfile::tempdir().expect("tempdir");
    run_ok_out(&home, &["start", "2024-01"]);
    run_ok_out(&home, &["shift", "prepare"]);
    run_ok_out(&home, &["start", "2024-06"]);

    assert!(!run_ok_out(&home, &["window"]).contains("Pending shift"));
    finplan_cmd(&home)
        .args(["shift", "apply"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Shift not prepared"));
}

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;

fn finplan_cmd(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("finplan"));
    cmd.env("FINPLAN_HOME", home.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn run_ok(home: &tempfile::TempDir, args: &[&str]) {
    finplan_cmd(home).args(args).assert().success();
}

fn backups(home: &tempfile::TempDir) -> Vec<PathBuf> {
    fs::read_dir(home.path().join("data"))
        .expect("data dir")
        .map(|e| e.expect("dir entry").path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("data_backup_") && n.ends_with(".json"))
        })
        .collect()
}

fn seeded() -> tempfile::TempDir {
    let home = tempfile::tempdir().expect("tempdir");
    run_ok(&home, &["start", "2024-01"]);
    run_ok(&home, &["set", "RentAndUtilities", "1000"]);
    home
}

#[test]
fn declining_the_prompt_keeps_data() {
    let home = seeded();
    finplan_cmd(&home)
        .arg("reset")
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Aborted."))
        .stderr(predicate::str::contains("Proceed? [y/N]"));

    finplan_cmd(&home)
        .arg("overview")
        .assert()
        .success()
        .stdout(predicate::str::contains("-1000.00"));
    assert!(backups(&home).is_empty());
}

#[test]
fn empty_answer_defaults_to_no() {
    let home = seeded();
    finplan_cmd(&home)
        .arg("reset")
        .write_stdin("\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Aborted."));
}

#[test]
fn confirmed_reset_backs_up_and_clears() {
    let home = seeded();
    finplan_cmd(&home)
        .arg("reset")
        .write_stdin("y\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup written to"))
        .stdout(predicate::str::contains("Plan reset."));

    let found = backups(&home);
    assert_eq!(found.len(), 1);
    let raw = fs::read_to_string(&found[0]).expect("backup");
    assert!(raw.contains("Rent and Utilities"));

    finplan_cmd(&home)
        .arg("window")
        .assert()
        .success()
        .stdout(predicate::str::contains("No period start set"));
    finplan_cmd(&home)
        .arg("overview")
        .assert()
        .success()
        .stdout(predicate::str::contains("No data stored."));

    let data: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(home.path().join("data").join("data.json")).expect("data"),
    )
    .expect("json");
    assert!(data["meta"]["period_start"].is_null());
    assert_eq!(data["meta"]["window_offset"], 0);
    assert!(data["entries"].as_object().expect("entries").is_empty());
}

#[test]
fn no_backup_flag_skips_the_copy() {
    let home = seeded();
    finplan_cmd(&home)
        .args(["reset", "--yes", "--no-backup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup written to").not());
    assert!(backups(&home).is_empty());
}

#[test]
fn reset_drops_a_pending_shift() {
    let home = seeded();
    run_ok(&home, &["shift", "prepare"]);
    run_ok(&home, &["reset", "--yes", "--no-backup"]);

    let cfg: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(home.path().join("config").join("config.json")).expect("config"),
    )
    .expect("json");
    assert!(cfg["pending_shift"].is_null());
}

#[test]
fn backup_flags_conflict() {
    let home = tempfile::tempdir().expect("tempdir");
    finplan_cmd(&home)
        .args(["reset", "--yes", "--backup", "--no-backup"])
        .assert()
        .failure();
}

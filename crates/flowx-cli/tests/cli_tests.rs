//! CLI integration tests
//!
//! Drive the `flowx` binary against a scratch database.
//!
//! ## Scenarios Covered
//!
//! 1. A due timer scheduled from the CLI is promoted by `acquire --once`
//! 2. A future timer stays scheduled after acquisition
//! 3. Without `--db` the database lands under `.flowx/`
//! 4. An invalid config file fails with a non-zero exit

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn flowx(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_flowx"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_due_timer_is_promoted_by_single_cycle() {
    // GIVEN a timer due now in a fresh database
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("flowx.db");
    let db = db.to_str().unwrap();

    let scheduled = flowx(
        temp_dir.path(),
        &["timer", "schedule", "--handler", "send-mail", "--in-secs", "0", "--db", db],
    );
    assert!(scheduled.status.success(), "{:?}", scheduled);
    let timer_id = stdout(&scheduled)
        .split_whitespace()
        .next()
        .unwrap()
        .to_string();

    let listed = flowx(temp_dir.path(), &["timer", "list", "--db", db]);
    assert!(stdout(&listed).contains(&timer_id));

    // WHEN one acquisition cycle runs
    let acquired = flowx(
        temp_dir.path(),
        &["acquire", "--once", "--lock-owner", "cli-node", "--db", db],
    );

    // THEN the timer was promoted to an executable job
    assert!(acquired.status.success(), "{:?}", acquired);
    assert!(stdout(&acquired).contains("Promoted 1 timer job(s) as cli-node"));

    let jobs = stdout(&flowx(temp_dir.path(), &["job", "list", "--db", db]));
    assert!(jobs.contains("send-mail"));
    assert!(jobs.contains("cli-node"));

    let timers = stdout(&flowx(temp_dir.path(), &["timer", "list", "--db", db]));
    assert!(timers.contains("No timer jobs"));
}

#[test]
fn test_future_timer_stays_scheduled() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("flowx.db");
    let db = db.to_str().unwrap();

    let scheduled = flowx(
        temp_dir.path(),
        &["timer", "schedule", "--handler", "later", "--in-secs", "3600", "--db", db],
    );
    assert!(scheduled.status.success());

    let acquired = flowx(temp_dir.path(), &["acquire", "--once", "--db", db]);
    assert!(acquired.status.success());
    assert!(stdout(&acquired).contains("Promoted 0 timer job(s)"));

    let jobs = stdout(&flowx(temp_dir.path(), &["job", "list", "--db", db]));
    assert!(jobs.contains("No jobs"));
    let timers = stdout(&flowx(temp_dir.path(), &["timer", "list", "--db", db]));
    assert!(timers.contains("later"));
    assert!(timers.contains("unlocked"));
}

#[test]
fn test_default_database_location() {
    let temp_dir = TempDir::new().unwrap();

    let scheduled = flowx(
        temp_dir.path(),
        &["timer", "schedule", "--handler", "h", "--at", "2030-01-01T00:00:00Z"],
    );

    assert!(scheduled.status.success(), "{:?}", scheduled);
    assert!(stdout(&scheduled).contains("2030-01-01T00:00:00+00:00"));
    assert!(temp_dir.path().join(".flowx").join("flowx.db").exists());
}

#[test]
fn test_invalid_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("flowx.toml");
    fs::write(
        &config,
        "[async_executor]\nmax_timer_jobs_per_acquisition = 0\n",
    )
    .unwrap();

    let output = flowx(
        temp_dir.path(),
        &["job", "list", "--config", config.to_str().unwrap()],
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error:"));
}

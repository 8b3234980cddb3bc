//! Integration tests for dependencies, auto-scheduling, baselines, and the WBS via CLI.

mod common;

use common::{TestEnv, add_item, id_of};
use predicates::prelude::*;

fn waterfall(env: &TestEnv) -> String {
    id_of(&env.json(&[
        "project",
        "create",
        "Dam",
        "-m",
        "waterfall",
        "--default-start",
        "2026-03-02",
    ]))
}

fn phase(env: &TestEnv, project: &str, name: &str, start: &str, end: &str) -> String {
    id_of(&env.json(&[
        "phase", "add", "-p", project, name, "--start", start, "--end", end,
    ]))
}

#[test]
fn test_recalc_shifts_successor_by_lag() {
    let env = TestEnv::init();
    let project = waterfall(&env);
    let design = phase(&env, &project, "Design", "2026-03-01", "2026-03-10");
    let build = phase(&env, &project, "Build", "2026-03-03", "2026-03-07");

    env.hm()
        .args(["dep", "add", "-p", &project, &design, &build, "--lag", "2"])
        .assert()
        .success();

    let result = env.json(&["schedule", "recalc", "-p", &project]);
    assert_eq!(result["updated"], 1);
    assert_eq!(result["phasesUpdated"], 1);
    assert_eq!(result["tasksUpdated"], 0);

    let phases = env.json(&["phase", "list", "-p", &project]);
    assert_eq!(phases["items"][1]["start_date"], "2026-03-12");
    assert_eq!(phases["items"][1]["end_date"], "2026-03-16");

    let again = env.json(&["schedule", "recalc", "-p", &project]);
    assert_eq!(again["updated"], 0);
}

#[test]
fn test_cycle_rejected() {
    let env = TestEnv::init();
    let project = waterfall(&env);
    let a = phase(&env, &project, "A", "2026-03-01", "2026-03-02");
    let b = phase(&env, &project, "B", "2026-03-03", "2026-03-04");
    env.hm()
        .args(["dep", "add", "-p", &project, &a, &b])
        .assert()
        .success();

    env.hm()
        .args(["dep", "add", "-p", &project, &b, &a])
        .assert()
        .failure()
        .stderr(predicate::str::contains("would create a cycle"));

    let deps = env.json(&["dep", "list", "-p", &project]);
    assert_eq!(deps["count"], 1);
}

#[test]
fn test_dependency_warning_reported() {
    let env = TestEnv::init();
    let project = waterfall(&env);
    let a = phase(&env, &project, "A", "2026-03-01", "2026-03-10");
    let b = phase(&env, &project, "B", "2026-03-05", "2026-03-06");

    let added = env.json(&["dep", "add", "-p", &project, &a, &b]);

    assert_eq!(added["warnings"][0]["kind"], "constraint_violated");
    assert_eq!(added["warnings"][0]["required_start"], "2026-03-10");
}

#[test]
fn test_baseline_and_variance() {
    let env = TestEnv::init();
    let project = waterfall(&env);
    let a = phase(&env, &project, "A", "2026-03-01", "2026-03-05");

    let saved = env.json(&["schedule", "baseline", "-p", &project]);
    assert_eq!(saved["phases"], 1);

    env.hm()
        .args([
            "schedule", "set-dates", "-p", &project, &a, "--start", "2026-03-04", "--end",
            "2026-03-09",
        ])
        .assert()
        .success();

    let variance = env.json(&["schedule", "variance", "-p", &project]);
    assert_eq!(variance["nodes"][0]["start_slip_days"], 3);
    assert_eq!(variance["nodes"][0]["end_slip_days"], 4);
}

#[test]
fn test_task_graph_anchored_on_default_start() {
    let env = TestEnv::init();
    let project = waterfall(&env);
    let survey = add_item(&env, &project, "Survey", &["--duration", "3"]);
    let dig = add_item(&env, &project, "Dig", &["--duration", "5"]);

    env.hm()
        .args(["dep", "add", "-p", &project, &survey, &dig, "-k", "item"])
        .assert()
        .success();
    let result = env.json(&["schedule", "recalc", "-p", &project]);
    assert_eq!(result["tasksUpdated"], 2);

    let dig = env.json(&["item", "show", "-p", &project, &dig]);
    assert_eq!(dig["start_date"], "2026-03-05");
    assert_eq!(dig["end_date"], "2026-03-10");
}

#[test]
fn test_wbs_indent_and_outdent() {
    let env = TestEnv::init();
    let project = waterfall(&env);
    let design = add_item(&env, &project, "Design", &[]);
    let drawings = add_item(&env, &project, "Drawings", &[]);
    add_item(&env, &project, "Build", &[]);

    let indented = env.json(&["wbs", "indent", "-p", &project, &drawings]);
    assert_eq!(indented["item"]["wbs_index"], "1.1");
    assert_eq!(indented["item"]["outline_level"], 2);
    assert_eq!(
        indented["item"]["parent_number"].as_i64().unwrap().to_string(),
        design
    );

    env.hm()
        .args(["-H", "wbs", "show", "-p", &project])
        .assert()
        .success()
        .stdout(predicate::str::contains("  1.1 #2 Drawings"))
        .stdout(predicate::str::contains("2 #3 Build"));

    env.hm()
        .args(["wbs", "indent", "-p", &project, &design])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no preceding sibling"));

    let outdented = env.json(&["wbs", "outdent", "-p", &project, &drawings]);
    assert_eq!(outdented["item"]["wbs_index"], "2");

    env.hm()
        .args(["wbs", "outdent", "-p", &project, &drawings])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already at the root level"));
}

#[test]
fn test_wbs_reparent_under_descendant_rejected() {
    let env = TestEnv::init();
    let project = waterfall(&env);
    let design = add_item(&env, &project, "Design", &[]);
    let drawings = add_item(&env, &project, "Drawings", &["--parent", &design]);

    env.hm()
        .args(["wbs", "reparent", "-p", &project, &design, "--parent", &drawings])
        .assert()
        .failure()
        .stderr(predicate::str::contains("own subtree"));

    let moved = env.json(&["wbs", "reparent", "-p", &project, &drawings]);
    assert_eq!(moved["item"]["outline_level"], 1);
}

#[test]
fn test_out_of_range_lag_rejected() {
    let env = TestEnv::init();
    let project = waterfall(&env);
    let a = phase(&env, &project, "A", "2026-03-01", "2026-03-02");
    let b = phase(&env, &project, "B", "2026-03-03", "2026-03-04");

    env.hm()
        .args(["dep", "add", "-p", &project, &a, &b, "--lag", "1000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Lag must be between"));

    let deps = env.json(&["dep", "list", "-p", &project]);
    assert_eq!(deps["count"], 0);
}

#[test]
fn test_huge_duration_rejected() {
    let env = TestEnv::init();
    let project = waterfall(&env);

    env.hm()
        .args([
            "item", "add", "-p", &project, "Forever", "--start", "2026-03-02", "--duration",
            "1000000000",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duration cannot exceed"));
}

#[test]
fn test_set_start_only_keeps_span() {
    let env = TestEnv::init();
    let project = waterfall(&env);
    let pour = add_item(
        &env,
        &project,
        "Pour",
        &["--start", "2026-03-02", "--end", "2026-03-06"],
    );

    let moved = env.json(&[
        "schedule", "set-dates", "-p", &project, &pour, "-k", "item", "--start", "2026-03-10",
    ]);

    assert_eq!(moved["start_date"], "2026-03-10");
    assert_eq!(moved["end_date"], "2026-03-14");
    let item = env.json(&["item", "show", "-p", &project, &pour]);
    assert_eq!(item["duration"], 4);
}

//! Common test utilities for helmsman integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's data or config directories.

#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::Value;
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// - `workspace_dir`: the directory `hm` runs in
/// - `data_dir`: holds helmsman's data (via `HM_DATA_DIR`) and a private
///   system config directory (via `XDG_CONFIG_HOME`)
///
/// The `hm()` method sets both per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub workspace_dir: TempDir,
    pub data_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            workspace_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment and initialize helmsman.
    pub fn init() -> Self {
        let env = Self::new();
        env.hm().args(["system", "init"]).assert().success();
        env
    }

    /// Get a Command for the hm binary with isolated directories.
    pub fn hm(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_hm"));
        cmd.current_dir(self.workspace_dir.path());
        cmd.env("HM_DATA_DIR", self.data_dir.path());
        cmd.env("XDG_CONFIG_HOME", self.data_dir.path().join("xdg"));
        cmd.env_remove("HM_WORKSPACE");
        cmd.env_remove("HM_LOG");
        cmd
    }

    /// Run `hm` with `args`, assert success, and parse the JSON it prints.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self.hm().args(args).assert().success().get_output().stdout.clone();
        serde_json::from_slice(&output).unwrap()
    }

    pub fn path(&self) -> &std::path::Path {
        self.workspace_dir.path()
    }

    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// A project with a four-lane kanban board, created through the CLI.
pub struct Board {
    pub project: String,
    pub backlog: String,
    pub todo: String,
    pub doing: String,
    pub done: String,
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_i64().unwrap().to_string()
}

pub fn seed_board(env: &TestEnv, methodology: &str) -> Board {
    let project = id_of(&env.json(&["project", "create", "Apollo", "-m", methodology]));
    let lane = |name: &str, col_type: &str| {
        id_of(&env.json(&["column", "add", "-p", &project, name, "-t", col_type]))
    };
    Board {
        backlog: lane("Backlog", "backlog"),
        todo: lane("To Do", "todo"),
        doing: lane("Doing", "doing"),
        done: lane("Done", "done"),
        project,
    }
}

/// Create a work item and return its number.
pub fn add_item(env: &TestEnv, project: &str, title: &str, extra: &[&str]) -> String {
    let mut args = vec!["item", "add", "-p", project, title];
    args.extend_from_slice(extra);
    env.json(&args)["number"].as_i64().unwrap().to_string()
}

#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

pub const CMD_TIMEOUT: Duration = Duration::from_secs(15);

pub const GIT_SPEC: &str = r#"{
  "name": "git",
  "description": "The stupid content tracker",
  "subcommands": [
    { "name": ["checkout", "co"], "description": "Switch branches" },
    { "name": "cherry-pick", "description": "Apply existing commits" },
    { "name": "commit", "description": "Record changes",
      "options": [{ "name": ["-m", "--message"], "args": { "name": "msg" } }] }
  ]
}"#;

pub const DOCKER_SPEC: &str = r#"[
  { "name": "docker", "description": "Container runtime",
    "subcommands": [{ "name": "ps" }, { "name": "run" }] },
  { "name": "kubectl", "aliases": ["k"], "description": "Kubernetes CLI" }
]"#;

/// An isolated `CLIFLOW_HOME` with a `specs/` directory.
pub struct Home {
    dir: TempDir,
}

impl Home {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create cliflow home");
        fs::create_dir_all(dir.path().join("specs")).unwrap();
        Self { dir }
    }

    /// A home with the git and docker specs installed.
    pub fn with_specs() -> Self {
        let home = Self::new();
        home.write_spec("git.json", GIT_SPEC);
        home.write_spec("docker.json", DOCKER_SPEC);
        home
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn socket(&self) -> PathBuf {
        self.path().join("cliflow.sock")
    }

    pub fn write_spec(&self, file: &str, json: &str) {
        fs::write(self.path().join("specs").join(file), json).unwrap();
    }

    /// Configured `cliflow` command.
    pub fn cliflow(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cliflow"));
        self.isolate(&mut cmd);
        cmd
    }

    /// Configured `cliflow-client` command.
    pub fn client(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cliflow-client"));
        self.isolate(&mut cmd);
        cmd
    }

    fn isolate(&self, cmd: &mut Command) {
        cmd.timeout(CMD_TIMEOUT);
        cmd.env("CLIFLOW_HOME", self.path());
        cmd.env_remove("CLIFLOW_SOCKET");
        cmd.env_remove("CLIFLOW_LOG");
        cmd.env("HISTFILE", self.path().join("no_history"));
        cmd.env("NO_COLOR", "1");
    }
}

/// A completion request line for `line` run from `cwd`.
pub fn complete_request(line: &str, cwd: &Path) -> String {
    serde_json::json!({
        "type": "complete",
        "commandLine": line,
        "cwd": cwd,
        "shell": "zsh",
    })
    .to_string()
}

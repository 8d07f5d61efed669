#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::{TempDir, tempdir};

/// Scratch warehouse plus helpers for driving the binary against it.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn warehouse(&self) -> PathBuf {
        self.temp_dir.path().join("warehouse")
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    /// Invocation of `subcommand` with `--warehouse` pointed at this workspace.
    pub fn command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::cargo_bin("schema-merge").expect("binary exists");
        cmd.arg(subcommand).arg("--warehouse").arg(self.warehouse());
        cmd
    }

    /// Imports `csv` as `table` using explicit `name:type` column definitions.
    pub fn import(&self, table: &str, csv: &str, columns: &str) {
        let input = self.write(&format!("{table}.csv"), csv);
        self.command("import")
            .args(["--table", table, "-i"])
            .arg(&input)
            .args(["-c", columns])
            .assert()
            .success();
    }

    pub fn table_csv(&self, table: &str) -> String {
        fs::read_to_string(self.warehouse().join(table).join("data.csv"))
            .expect("read table data")
    }
}

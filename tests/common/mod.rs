#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
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

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.join(name)).expect("read temp file")
    }

    /// The binary, run from inside the workspace with no settings
    /// inherited from the environment.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("etl-mapper").expect("binary exists");
        cmd.current_dir(self.path())
            .env_remove("ETL_MAPPER_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }
}

pub const CUSTOMERS_CSV: &str = "\
Full Name,Email,signup_date,Active,Balance
Alice Smith,alice@example.com,2024-01-05,yes,12.50
Bob Jones,bob@example.com,2024-02-11,no,0
Carol White,,2024-03-20,yes,1200.75
";

pub const CUSTOMERS_TABLE_YAML: &str = "\
schema_name: crm
table_name: customers
columns:
  - name: full_name
    type: varchar(200)
  - name: email
    type: varchar(320)
  - name: signup_ts
    type: timestamp
  - name: is_active
    type: boolean
    nullable: false
  - name: balance
    type: numeric(12,2)
";

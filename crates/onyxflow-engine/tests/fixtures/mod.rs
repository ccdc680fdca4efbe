//! Test fixtures for pipeline tests
//!
//! A throwaway project root laid out like a deployment: `data/` with the
//! full and incremental extracts, and an empty `dbt_project/`.

use onyxflow_core::Config;
use std::path::Path;
use tempfile::TempDir;

pub const HEADER: &str =
    "bus_date,Venue_Code ,EGM_Description,manufacturer,FP,Turnover_Sum,GMP_Sum,Games_Played_Sum";

pub const FULL_ROWS: usize = 10;
pub const INCREMENTAL_ROWS: usize = 4;

fn extract(day: &str, rows: usize) -> String {
    let mut text = format!("{}\n", HEADER);
    for i in 0..rows {
        text.push_str(&format!(
            "{},V{:03},Buffalo Gold {},Aristocrat,FP{},{}.00,{}.50,{}\n",
            day,
            i % 4,
            i,
            i,
            500 + i,
            40 + i,
            120 + i
        ));
    }
    text
}

/// Project root with both extracts and a dbt project directory
pub struct Project {
    pub root: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create project root");
        std::fs::create_dir(root.path().join("data")).expect("create data dir");
        std::fs::create_dir(root.path().join("dbt_project")).expect("create dbt project dir");
        std::fs::write(
            root.path().join("data/game_performance.csv"),
            extract("2024-03-01", FULL_ROWS),
        )
        .expect("write full extract");
        std::fs::write(
            root.path().join("data/game_performance_incremental.csv"),
            extract("2024-03-02", INCREMENTAL_ROWS),
        )
        .expect("write incremental extract");
        Self { root }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Default configuration rooted at this project
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.project_root = self.path().to_path_buf();
        config
    }
}

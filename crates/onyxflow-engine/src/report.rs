//! Run report
//!
//! One record per working stage, in pipeline order, plus the terminal
//! state. Written as JSON with `onyxflow run --report <path>`.

use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,

    /// Never reached because an earlier stage failed
    Skipped,
}

/// Record of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,

    pub status: StageStatus,

    /// Wall time spent in the stage
    pub elapsed_ms: u64,

    /// Human-readable outcome (rows loaded, error message, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Report of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Start of the run (RFC 3339)
    pub timestamp: String,

    pub stages: Vec<StageRecord>,

    /// `done` or `failed` once the run is over
    pub final_stage: Stage,

    /// Error that moved the run to `failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    /// Create an empty report stamped with the current time
    pub fn new() -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            stages: Vec::new(),
            final_stage: Stage::Connect,
            error: None,
        }
    }

    /// Record a stage that completed
    pub fn succeed(&mut self, stage: Stage, elapsed_ms: u64, detail: Option<String>) {
        self.stages.push(StageRecord {
            stage,
            status: StageStatus::Succeeded,
            elapsed_ms,
            detail,
        });
        self.final_stage = stage.next();
    }

    /// Record a failed stage, mark every later stage skipped and end in `failed`
    pub fn fail(&mut self, stage: Stage, elapsed_ms: u64, error: String) {
        self.stages.push(StageRecord {
            stage,
            status: StageStatus::Failed,
            elapsed_ms,
            detail: Some(error.clone()),
        });
        for skipped in stage.remaining() {
            self.stages.push(StageRecord {
                stage: skipped,
                status: StageStatus::Skipped,
                elapsed_ms: 0,
                detail: None,
            });
        }
        self.final_stage = Stage::Failed;
        self.error = Some(error);
    }

    /// Check if the run reached `done`
    pub fn succeeded(&self) -> bool {
        self.final_stage == Stage::Done
    }

    /// The stage that failed, if any
    pub fn failed_stage(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|r| r.status == StageStatus::Failed)
            .map(|r| r.stage)
    }

    /// Status recorded for `stage`
    pub fn status_of(&self, stage: Stage) -> Option<StageStatus> {
        self.stages.iter().find(|r| r.stage == stage).map(|r| r.status)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn successful_stages_advance_final_stage() {
        let mut report = RunReport::new();
        for stage in Stage::PIPELINE {
            report.succeed(stage, 1, None);
        }

        assert!(report.succeeded());
        assert_eq!(report.final_stage, Stage::Done);
        assert_eq!(report.failed_stage(), None);
    }

    #[test]
    fn failure_skips_remaining_stages() {
        let mut report = RunReport::new();
        report.succeed(Stage::Connect, 5, None);
        report.fail(Stage::FullLoad, 7, "File not found: data.csv".to_string());

        assert!(!report.succeeded());
        assert_eq!(report.final_stage, Stage::Failed);
        assert_eq!(report.failed_stage(), Some(Stage::FullLoad));
        assert_eq!(report.stages.len(), Stage::PIPELINE.len());
        assert_eq!(report.status_of(Stage::RunTests), Some(StageStatus::Skipped));
        assert_eq!(report.error.as_deref(), Some("File not found: data.csv"));
    }

    #[test]
    fn report_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let mut report = RunReport::new();
        report.succeed(Stage::Connect, 12, Some("Snowflake".to_string()));
        report.fail(Stage::FullLoad, 3, "boom".to_string());
        report.save_to_file(&path).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"final_stage\": \"failed\""));
        assert!(json.contains("\"status\": \"skipped\""));

        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}

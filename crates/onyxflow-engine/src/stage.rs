//! Pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// A state of the pipeline
///
/// Stages advance strictly in order; `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Connect,
    FullLoad,
    IncrementalLoad,
    RunModels,
    TruncateStaging,
    RunTests,
    Done,
    Failed,
}

impl Stage {
    /// Working stages, in execution order
    pub const PIPELINE: [Stage; 6] = [
        Stage::Connect,
        Stage::FullLoad,
        Stage::IncrementalLoad,
        Stage::RunModels,
        Stage::TruncateStaging,
        Stage::RunTests,
    ];

    /// Stage entered after this one succeeds
    pub fn next(self) -> Stage {
        match self {
            Stage::Connect => Stage::FullLoad,
            Stage::FullLoad => Stage::IncrementalLoad,
            Stage::IncrementalLoad => Stage::RunModels,
            Stage::RunModels => Stage::TruncateStaging,
            Stage::TruncateStaging => Stage::RunTests,
            Stage::RunTests => Stage::Done,
            Stage::Done => Stage::Done,
            Stage::Failed => Stage::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Connect => "connect",
            Stage::FullLoad => "full_load",
            Stage::IncrementalLoad => "incremental_load",
            Stage::RunModels => "run_models",
            Stage::TruncateStaging => "truncate_staging",
            Stage::RunTests => "run_tests",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    /// Working stages after this one
    pub fn remaining(self) -> impl Iterator<Item = Stage> {
        Stage::PIPELINE.into_iter().skip_while(move |s| *s != self).skip(1)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn next_walks_pipeline_in_order() {
        let mut stage = Stage::Connect;
        let mut visited = vec![stage];
        while !stage.is_terminal() {
            stage = stage.next();
            visited.push(stage);
        }

        let mut expected = Stage::PIPELINE.to_vec();
        expected.push(Stage::Done);
        assert_eq!(visited, expected);
    }

    #[test]
    fn terminal_stages_stay_put() {
        assert_eq!(Stage::Done.next(), Stage::Done);
        assert_eq!(Stage::Failed.next(), Stage::Failed);
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::RunTests.is_terminal());
    }

    #[test]
    fn remaining_after_stage() {
        assert_eq!(
            Stage::RunModels.remaining().collect::<Vec<_>>(),
            vec![Stage::TruncateStaging, Stage::RunTests]
        );
        assert_eq!(Stage::RunTests.remaining().count(), 0);
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::TruncateStaging).unwrap(), "\"truncate_staging\"");
        assert_eq!(Stage::IncrementalLoad.to_string(), "incremental_load");
    }
}

//! dbt command lines

use std::fmt;
use std::path::{Path, PathBuf};

/// A dbt subcommand the pipeline issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbtCommand {
    /// `dbt run`, optionally restricted to one model
    Run { select: Option<String> },

    /// `dbt test`
    Test,
}

impl DbtCommand {
    /// `dbt run --select <model>`
    pub fn run_model(model: impl Into<String>) -> Self {
        DbtCommand::Run {
            select: Some(model.into()),
        }
    }

    /// `dbt run` over the whole project
    pub fn run_all() -> Self {
        DbtCommand::Run { select: None }
    }

    /// Arguments following the executable
    pub fn args(&self) -> Vec<String> {
        match self {
            DbtCommand::Run { select: Some(model) } => {
                vec!["run".to_string(), "--select".to_string(), model.clone()]
            }
            DbtCommand::Run { select: None } => vec!["run".to_string()],
            DbtCommand::Test => vec!["test".to_string()],
        }
    }
}

/// A fully specified child process: program, arguments and working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
}

impl Invocation {
    pub fn new(program: impl Into<String>, current_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: current_dir.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `--target` / `--profiles-dir` when set
    pub fn with_profile(mut self, target: Option<&str>, profiles_dir: Option<&Path>) -> Self {
        if let Some(target) = target {
            self = self.arg("--target").arg(target);
        }
        if let Some(dir) = profiles_dir {
            self = self.arg("--profiles-dir").arg(dir.display().to_string());
        }
        self
    }

    /// Whether this invocation selects `model`
    pub fn selects(&self, model: &str) -> bool {
        self.args
            .windows(2)
            .any(|pair| pair[0] == "--select" && pair[1] == model)
    }

    /// First argument, the dbt subcommand
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn run_model_args() {
        assert_eq!(
            DbtCommand::run_model("daily_summary").args(),
            vec!["run", "--select", "daily_summary"]
        );
        assert_eq!(DbtCommand::run_all().args(), vec!["run"]);
        assert_eq!(DbtCommand::Test.args(), vec!["test"]);
    }

    #[test]
    fn profile_flags_follow_subcommand() {
        let invocation = Invocation::new("dbt", "/srv/dbt")
            .args(DbtCommand::Test.args())
            .with_profile(Some("prod"), Some(Path::new("/etc/dbt")));

        assert_eq!(
            invocation.args,
            vec!["test", "--target", "prod", "--profiles-dir", "/etc/dbt"]
        );
        assert_eq!(invocation.subcommand(), Some("test"));
    }

    #[test]
    fn selects_matches_model_argument() {
        let invocation = Invocation::new("dbt", ".").args(DbtCommand::run_model("daily_summary").args());

        assert!(invocation.selects("daily_summary"));
        assert!(!invocation.selects("run"));
        assert!(!invocation.selects("total_turnover_by_venue"));
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let invocation = Invocation::new("dbt", ".")
            .args(["run", "--select", "tag:daily load"]);
        assert_eq!(invocation.to_string(), "dbt run --select \"tag:daily load\"");
    }
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use onyxflow_core::{Config, CsvOptions, Schema};
use onyxflow_dbt::{ProcessExecutor, TransformRunner};
use onyxflow_engine::{RunReport, StageStatus, Workflow};
use onyxflow_warehouse::maintenance::{self, TableLayout};
use onyxflow_warehouse::{Connector, LoadJob, Loader, SnowflakeConnector, WarehouseSession};

const DEFAULT_CONFIG: &str = "onyxflow.toml";

/// onyxflow - load game performance extracts into Snowflake and run dbt
#[derive(Parser)]
#[command(name = "onyxflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: onyxflow.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline: loads, dbt models, staging truncate, dbt tests
    Run {
        /// Write the run report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Load one CSV file into one table
    Load {
        /// Source CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Destination table
        #[arg(short, long)]
        table: String,

        /// Replace existing rows instead of appending
        #[arg(long)]
        overwrite: bool,
    },

    /// Remove every row from a table
    Truncate {
        /// Table to truncate
        #[arg(short, long)]
        table: String,
    },

    /// Run the configured dbt models, then dbt tests
    Transform {
        /// Skip `dbt test`
        #[arg(long)]
        skip_tests: bool,
    },

    /// Verify the warehouse connection and the pipeline table layouts
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Secrets may live in a local .env
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "✗ Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Run { report } => run_command(&config, report.as_deref()).await,
        Commands::Load { file, table, overwrite } => load_command(&config, file, table, overwrite).await,
        Commands::Truncate { table } => truncate_command(&config, &table).await,
        Commands::Transform { skip_tests } => transform_command(&config, skip_tests).await,
        Commands::Check => check_command(&config).await,
    }
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = if let Some(config_path) = path {
        Config::from_file(config_path)?
    } else if Path::new(DEFAULT_CONFIG).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if verbose {
        eprintln!("{} {}", "Project root:".cyan(), config.project_root.display());
    }

    Ok(config)
}

fn connector(config: &Config) -> Result<Box<dyn Connector>> {
    let warehouse = config.warehouse.clone().ok_or_else(|| {
        anyhow::anyhow!(
            "No warehouse configuration found in {}. \
             Add a [warehouse] section with account, user, database and schema.",
            DEFAULT_CONFIG
        )
    })?;
    Ok(Box::new(SnowflakeConnector::new(warehouse)))
}

async fn connect(config: &Config) -> Result<Box<dyn WarehouseSession>> {
    connector(config)?
        .connect()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to warehouse: {}", e))
}

async fn close(mut session: Box<dyn WarehouseSession>) {
    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Failed to close warehouse session");
    }
}

/// Run command - the full orchestrated pipeline
async fn run_command(config: &Config, report_path: Option<&Path>) -> Result<()> {
    let workflow = Workflow::from_config(config, connector(config)?, Box::new(ProcessExecutor));
    let report = workflow.run().await;

    print_report(&report);

    if let Some(path) = report_path {
        report.save_to_file(path)?;
        eprintln!("{} {}", "Report written to".cyan(), path.display());
    }

    if report.succeeded() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Pipeline failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        ))
    }
}

/// Load command - one file into one table
async fn load_command(config: &Config, file: PathBuf, table: String, overwrite: bool) -> Result<()> {
    let loader = Loader::game_performance().with_csv_options(CsvOptions {
        delimiter: config.delimiter_byte(),
    });
    let job = LoadJob::new(file, table, overwrite);
    // Read before connecting so a bad file never opens a session
    let frame = loader.read(&job)?;

    let session = connect(config).await?;
    let result = loader.load_frame(session.as_ref(), &job, frame).await;
    close(session).await;
    let summary = result?;

    println!(
        "{} {} rows into {} ({})",
        "✓ Loaded".green().bold(),
        summary.rows,
        summary.table,
        if summary.overwrite { "overwrite" } else { "append" }
    );
    Ok(())
}

/// Truncate command - empty one table
async fn truncate_command(config: &Config, table: &str) -> Result<()> {
    let session = connect(config).await?;
    let result = maintenance::truncate(session.as_ref(), table).await;
    close(session).await;
    let table = result?;

    println!("{} {}", "✓ Truncated".green().bold(), table);
    Ok(())
}

/// Transform command - dbt models and tests only
async fn transform_command(config: &Config, skip_tests: bool) -> Result<()> {
    let runner = TransformRunner::from_config(&config.transform, &config.project_root, Box::new(ProcessExecutor));

    let ran = runner.run_models(&config.transform.models).await?;
    println!("{} {} dbt invocation(s)", "✓ Models:".green().bold(), ran);

    if skip_tests {
        println!("{}", "- Tests skipped".dimmed());
    } else {
        runner.run_tests().await?;
        println!("{}", "✓ Tests passed".green().bold());
    }
    Ok(())
}

/// Check command - connection plus the layout of both pipeline tables
async fn check_command(config: &Config) -> Result<()> {
    let session = connect(config).await?;
    println!("{} ({})", "✓ Connection successful".green().bold(), session.name());

    let expected = Schema::game_performance();
    let mut layouts = Vec::new();
    for table in [&config.load.full_table, &config.load.staging_table] {
        match maintenance::check_layout(session.as_ref(), table, &expected).await {
            Ok(layout) => layouts.push((table, layout)),
            Err(e) => {
                close(session).await;
                return Err(anyhow::anyhow!("Failed to read layout of {}: {}", table, e));
            }
        }
    }
    close(session).await;

    let mut differs = 0;
    for (table, layout) in &layouts {
        print_layout(table, layout);
        if !layout.is_usable() {
            differs += 1;
        }
    }

    if differs > 0 {
        return Err(anyhow::anyhow!(
            "{} table(s) do not match the game performance layout",
            differs
        ));
    }
    Ok(())
}

fn print_layout(table: &str, layout: &TableLayout) {
    match layout {
        TableLayout::Matches => println!("  {} {}", "✓".green(), table),
        TableLayout::Missing => println!("  {} {} {}", "-".dimmed(), table, "(not created yet)".dimmed()),
        TableLayout::Differs {
            missing,
            unexpected,
            mismatched,
        } => {
            println!("  {} {}", "✗".red(), table.red());
            for column in missing {
                println!("      missing column {}", column);
            }
            for column in unexpected {
                println!("      unexpected column {}", column);
            }
            for detail in mismatched {
                println!("      {}", detail);
            }
        }
    }
}

fn print_report(report: &RunReport) {
    println!();
    println!("{}", "Pipeline run".bold());
    for record in &report.stages {
        let (marker, stage) = match record.status {
            StageStatus::Succeeded => ("✓".green(), record.stage.as_str().normal()),
            StageStatus::Failed => ("✗".red(), record.stage.as_str().red()),
            StageStatus::Skipped => ("-".dimmed(), record.stage.as_str().dimmed()),
        };
        let timing = match record.status {
            StageStatus::Skipped => String::new(),
            _ => format!(" ({} ms)", record.elapsed_ms),
        };
        match &record.detail {
            Some(detail) => println!("  {} {:<18}{}  {}", marker, stage, timing, detail),
            None => println!("  {} {:<18}{}", marker, stage, timing),
        }
    }
    println!();

    if report.succeeded() {
        println!("{}", "✓ Pipeline completed successfully".green().bold());
    } else {
        println!("{} {}", "✗ Pipeline ended in".red().bold(), report.final_stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_load_subcommand() {
        let cli = Cli::parse_from([
            "onyxflow",
            "--verbose",
            "load",
            "--file",
            "data/game_performance.csv",
            "--table",
            "GAME_PERFORMANCE_DATA",
            "--overwrite",
        ]);

        assert!(cli.verbose);
        match cli.command {
            Commands::Load { file, table, overwrite } => {
                assert_eq!(file, PathBuf::from("data/game_performance.csv"));
                assert_eq!(table, "GAME_PERFORMANCE_DATA");
                assert!(overwrite);
            }
            _ => panic!("Expected Load"),
        }
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli = Cli::parse_from(["onyxflow", "run", "--config", "prod.toml", "--report", "run.json"]);

        assert_eq!(cli.config, Some(PathBuf::from("prod.toml")));
        match cli.command {
            Commands::Run { report } => assert_eq!(report, Some(PathBuf::from("run.json"))),
            _ => panic!("Expected Run"),
        }
    }

    #[test]
    fn missing_warehouse_section_is_an_error() {
        let config = Config::default();
        assert!(connector(&config).is_err());
    }
}

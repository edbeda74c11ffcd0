use clap::{Parser, Subcommand};
use colored::Colorize;
use pipeweave::commands::{check, run, Outcome};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pipeweave")]
#[command(about = "Run a graph of commands wired stdout-to-stdin", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a pipeline file
    Run {
        /// Path to the pipeline YAML file
        graph: PathBuf,

        /// Global timeout in seconds (overrides the pipeline file)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Default working directory (overrides the pipeline file)
        #[arg(short = 'C', long)]
        working_dir: Option<PathBuf>,

        /// Print the result as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Skip nodes whose predecessors failed instead of running them
        #[arg(long)]
        skip_dependents: bool,

        /// Settings file (defaults to ./pipeweave.toml, then the user config dir)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log at debug level, including node stdout
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a pipeline file and show its execution order
    Check {
        /// Path to the pipeline YAML file
        graph: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            graph,
            timeout,
            working_dir,
            json,
            skip_dependents,
            config,
            verbose,
        } => run::execute(run::RunOptions {
            graph,
            timeout,
            working_dir,
            json,
            skip_dependents,
            config,
            verbose,
        }),
        Commands::Check { graph } => check::execute(&graph),
    };

    match result {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            Outcome::ConfigError.into()
        }
    }
}

use clap::{Parser, Subcommand, ValueEnum};
use pyprune::errors::{PruneError, exit_code_for};
use pyprune::metadata::SitePackages;
use pyprune::pip::Pip;
use pyprune::tools::Project;
use pyprune::tools::generate::{self, generate_requirements};
use pyprune::tools::identify::{self, analyze_unused};
use pyprune::tools::remove::{self, remove_unused};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pyprune")]
#[command(about = "Find and prune installed Python packages your code never imports")]
struct Args {
    /// Project root containing the sources and the virtual environment
    #[arg(long, default_value = ".")]
    root: String,

    /// Virtual environment directory (default: first of venv, env, .venv, .env under the root)
    #[arg(long)]
    venv: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed packages that no source file imports
    Identify {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Drop unused packages from requirements.txt and uninstall them
    Remove {
        /// Show what would be removed without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Overwrite requirements.txt with the environment's `pip freeze` output
    Generate,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let args = Args::parse();
    pyprune::logging::init_cli_logger(args.verbose, args.quiet);

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(error_exit_code(&e))
        }
    }
}

/// Exit code for a fatal error, taken from the first `PruneError` in its chain.
fn error_exit_code(error: &anyhow::Error) -> u8 {
    error
        .chain()
        .find_map(|e| e.downcast_ref::<PruneError>())
        .map(PruneError::exit_code)
        .filter(|code| *code != 0)
        .unwrap_or(1) as u8
}

fn run(args: &Args) -> anyhow::Result<u8> {
    let project = Project::discover(Path::new(&args.root), args.venv.as_deref())?;
    let pip = Pip::new(&project.venv.python);
    let show_progress = !args.quiet && std::io::stderr().is_terminal();

    let failures = match &args.command {
        Commands::Identify { format } => {
            let metadata = SitePackages::for_env(&project.venv);
            let result = analyze_unused(&project, &pip, &metadata, show_progress);
            match format {
                OutputFormat::Text => print!("{}", identify::formatters::format_text(&result)),
                OutputFormat::Json => print!("{}", identify::formatters::format_json(&result)?),
            }
            result.failures
        }
        Commands::Remove { dry_run } => {
            let metadata = SitePackages::for_env(&project.venv);
            let mut analysis = analyze_unused(&project, &pip, &metadata, show_progress);
            let result = remove_unused(&project, &analysis, &pip, *dry_run)?;
            print!("{}", remove::formatters::format_text(&result));
            analysis.failures.extend(result.failures);
            analysis.failures
        }
        Commands::Generate => {
            let result = generate_requirements(&project, &pip)?;
            print!("{}", generate::formatters::format_text(&result));
            Vec::new()
        }
    };

    Ok(exit_code_for(&failures) as u8)
}

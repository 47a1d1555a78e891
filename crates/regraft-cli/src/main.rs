#![forbid(unsafe_code)]

mod cmd;
mod config;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "regraft: rewrite every snapshot of a repository's history by policy",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Convert a subfolder to a submodule across all history",
        long_about = "Rewrite every reachable snapshot so that FOLDER becomes a submodule \
                      link, then regenerate the commit graph over the rewritten snapshots.",
        after_help = "EXAMPLES:\n    # Convert libs/foo across the history of main\n    regraft dir2mod --treemap .treemap --folder libs/foo \\\n        --url https://example.com/foo.git main\n\n    # Trees only, ids on stdin, machine-readable report\n    git log --format=%T main | sort -u | \\\n        regraft dir2mod --treemap .treemap --folder libs/foo --url URL --json"
    )]
    Dir2mod(cmd::dir2mod::Dir2ModArgs),

    #[command(about = "Generate shell completion scripts")]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(quiet: bool) {
    let filter = EnvFilter::try_from_env("REGRAFT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "regraft=debug,info"
        } else if quiet {
            "regraft=warn,error"
        } else {
            "regraft=info,warn"
        })
    });

    let format = env::var("REGRAFT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = std::env::current_dir()?;
    let output = cli.output_mode();

    match cli.command {
        Commands::Dir2mod(ref args) => {
            cmd::dir2mod::run_dir2mod(args, &project_root, output, cli.quiet)
        }
        Commands::Completions(ref args) => {
            cmd::completions::run_completions(args, &mut Cli::command());
            Ok(())
        }
    }
}

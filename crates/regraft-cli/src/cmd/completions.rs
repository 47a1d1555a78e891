use clap::Args;
use clap_complete::{Shell, generate};
use std::io;

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate a completion script for.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Execute `regraft completions`, writing the script to stdout.
pub fn run_completions(args: &CompletionsArgs, command: &mut clap::Command) {
    generate(args.shell, command, "regraft", &mut io::stdout());
}

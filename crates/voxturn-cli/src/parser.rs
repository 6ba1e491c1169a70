//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Voice conversations with an assistant, served over HTTP.
#[derive(Debug, Parser)]
#[command(name = "voxturn")]
#[command(about = "Talk to an assistant and hear it answer, paragraph by paragraph")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_verbose_after_subcommand() {
        let cli = Cli::parse_from(["voxturn", "talk", "--text", "hello", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Talk(_)));
    }
}

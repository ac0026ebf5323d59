//! CLI module for Delve
//!
//! Provides command-line interface parsing and handling for the `delve` binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod ask;
pub mod init;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Delve - iterative web research with cited answers
///
/// Generates search queries, searches the web in parallel, reflects on the
/// findings and writes an answer that links every claim to its source.
#[derive(Parser, Debug)]
#[command(
    name = "delve",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Delve - iterative web research with cited answers",
    long_about = "Delve generates search queries, searches the web in parallel, reflects on\n\
                  the findings and writes an answer that links every claim to its source.\n\n\
                  Run without arguments to start the HTTP API, use 'ask' for a one-off\n\
                  question, or 'init' to scaffold a delve.toml.",
    after_help = "EXAMPLES:\n    \
                  delve init                               # Scaffold delve.toml\n    \
                  delve ask \"What is new in Rust 1.85?\"    # Research one question\n    \
                  delve ask -q 5 -l 1 \"...\"                # 5 queries, one follow-up loop\n    \
                  delve ask --set depth=basic \"...\"      # Per-run override\n    \
                  delve serve --config my.toml             # Start the HTTP API"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "delve.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    ///
    /// Serves POST /api/research and GET /health. The configuration file is
    /// watched and reloaded; runs in flight keep the snapshot they started with.
    Serve,

    /// Research a single question and print the cited answer
    Ask {
        /// The question to research
        question: String,

        /// Number of search queries in the first batch
        #[arg(short, long)]
        queries: Option<u32>,

        /// Maximum number of follow-up research loops
        #[arg(short = 'l', long)]
        max_loops: Option<u32>,

        /// Model used for reflection and the final answer
        #[arg(long)]
        reasoning_model: Option<String>,

        /// Override a configuration field for this run (repeatable), e.g.
        /// --set depth=basic --set max_results=3
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new delve.toml
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files without prompting
        #[arg(short, long)]
        force: bool,

        /// LLM provider to configure
        #[arg(long, value_enum, default_value_t = InitProvider::OpenAI)]
        provider: InitProvider,
    },

    /// Show configuration information
    Config {
        /// Show the full configuration
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InitProvider {
    #[value(name = "openai")]
    OpenAI,
    Ollama,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_overrides() {
        let cli = Cli::try_parse_from([
            "delve",
            "ask",
            "-q",
            "5",
            "--set",
            "depth=basic",
            "--set",
            "max_results=3",
            "What is Rust?",
        ])
        .unwrap();

        let Commands::Ask {
            question,
            queries,
            max_loops,
            overrides,
            json,
            ..
        } = cli.command.unwrap()
        else {
            panic!("expected ask");
        };
        assert_eq!(question, "What is Rust?");
        assert_eq!(queries, Some(5));
        assert_eq!(max_loops, None);
        assert_eq!(overrides, vec!["depth=basic", "max_results=3"]);
        assert!(!json);
        assert_eq!(cli.config, PathBuf::from("delve.toml"));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "delve",
            "serve",
            "--config",
            "other.toml",
            "--log-format",
            "json",
            "-v",
        ])
        .unwrap();

        assert!(matches!(cli.command, Some(Commands::Serve)));
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(cli.verbose);
    }

    #[test]
    fn test_parse_init_provider() {
        let cli = Cli::try_parse_from(["delve", "init", "--provider", "ollama", "proj"]).unwrap();
        let Some(Commands::Init {
            path,
            provider,
            force,
        }) = cli.command
        else {
            panic!("expected init");
        };
        assert_eq!(path, PathBuf::from("proj"));
        assert_eq!(provider, InitProvider::Ollama);
        assert!(!force);
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["delve"]).unwrap();
        assert!(cli.command.is_none());
    }
}

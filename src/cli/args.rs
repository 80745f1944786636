//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

/// Move heredoc payloads out of VM startup scripts and fetch them from instance metadata at boot
#[derive(Parser, Debug)]
#[command(name = "heredoc-extract")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Project directory (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract heredoc payloads and rewrite startup scripts (default)
    Extract {
        #[command(flatten)]
        target: TargetArgs,

        /// Only report what would be extracted
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Show which payloads each service still embeds
    Status {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Which services to touch and where they live.
#[derive(Args, Debug, Default, Clone)]
pub struct TargetArgs {
    /// Directory holding the service directories (overrides config)
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub base_dir: Option<PathBuf>,

    /// Services to process (default: configured list)
    pub services: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Show config paths
    Path,

    /// Print a config template
    Template,
}

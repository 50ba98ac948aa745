use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Fedora Post-Install - interactive workstation setup
#[derive(Parser, Debug)]
#[command(name = "fedora-postinstall")]
#[command(about = "Interactively install repos, packages and apps on a fresh Fedora system")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: print every command that would run without starting it.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Directory with package lists and settings.json (embedded defaults are
    /// used for any file missing there)
    #[arg(short, long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Log debug details to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the interactive setup (default)
    Run {
        /// User to add to the admin groups (defaults to $USER)
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Load and check the configuration, then print a summary
    Validate,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

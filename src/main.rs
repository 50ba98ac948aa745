//! Fedora Post-Install - main entry point
//!
//! Parses the command line, loads the configuration and hands control to the
//! interactive workflow.

use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use fedora_postinstall::cli::{Cli, Commands};
use fedora_postinstall::config::SetupConfig;
use fedora_postinstall::console::Prompter;
use fedora_postinstall::runner::CommandRunner;
use fedora_postinstall::theme::{Palette, Tone};
use fedora_postinstall::workflow::{Workflow, current_user};

const BANNER: &str = "]|I{•------» Fedora Setup Script «------•}I|[\n";
const DRY_RUN_BANNER: &str = "---[Dry Run Mode] Shell Commands will not be executed.---\n";
const GOODBYE: &str = "\n.o0×X×0o. All actions completed. Goodbye. .o0×X×0o.";

/// Initialize logging to stderr, keeping stdout for the operator dialogue
fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main application entry point
fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    debug!("CLI arguments parsed: {:?}", cli);

    let result = match cli.command {
        Some(Commands::Validate) => validate(&cli),
        Some(Commands::Run { ref user }) => run(&cli, user.clone()),
        None => run(&cli, None),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<SetupConfig> {
    let config = SetupConfig::load(cli.config_dir.as_deref())
        .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Check the configuration and print what would be offered
fn validate(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(cli)?;
    info!("Configuration validation successful");

    println!("✓ Configuration is valid");
    println!("  DNF packages to install: {}", config.dnf_install.len());
    println!("  DNF packages to remove:  {}", config.dnf_remove.len());
    println!(
        "  Flatpak apps ({}):      {}",
        config.settings.flatpak.remote_name,
        config.flatpak_install.len()
    );
    println!(
        "  Admin groups:            {}",
        config.settings.admin_groups.join(", ")
    );
    println!(
        "  Services:                {}",
        config.settings.services.join(", ")
    );
    Ok(ExitCode::SUCCESS)
}

/// Run the interactive workflow
fn run(cli: &Cli, user: Option<String>) -> Result<ExitCode> {
    let config = load_config(cli)?;
    let palette = Palette::detect();
    let runner = CommandRunner::new(cli.dry_run).with_palette(palette);
    let mut prompter = Prompter::stdio(palette);

    prompter.say(BANNER, Some(Tone::Success))?;
    if runner.is_dry_run() {
        info!("Dry-run mode enabled");
        prompter.say(DRY_RUN_BANNER, Some(Tone::Danger))?;
    }

    let user = user.or_else(current_user);
    let report = Workflow::new(&config, &runner, &mut prompter, user)
        .run()
        .context("Setup session failed")?;

    prompter.say(&report.to_string(), None)?;
    prompter.say(GOODBYE, Some(Tone::Success))?;

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        info!("{} command(s) failed", report.failed_commands());
        Ok(ExitCode::FAILURE)
    }
}

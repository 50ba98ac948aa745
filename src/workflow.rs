//! Post-install workflow
//!
//! Walks the operator through six fixed steps:
//! - RPMFusion repositories
//! - extra DNF packages
//! - DNF package removal
//! - Flatpak apps
//! - admin group membership
//! - system services
//!
//! Each step is gated by a yes/no prompt. Package steps additionally let the
//! operator drop entries from the configured list before the command runs.
//!
//! # Failure Policy
//!
//! Steps are **non-fatal**. A command exiting non-zero is counted in the
//! step's outcome and the session moves on. An invalid exclusion expression
//! aborts only the step it was entered for. The session itself fails only
//! when reading from or writing to the operator fails.

use std::fmt;
use std::io::{BufRead, Write};

use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::{info, warn};

use crate::config::{Settings, SetupConfig};
use crate::console::Prompter;
use crate::error::{Result, SetupError};
use crate::runner::{CommandRunner, ProcessLauncher};
use crate::theme::Tone;

// ============================================================================
// Command prefixes
// ============================================================================

pub const CMD_RPM_IMPORT: &[&str] = &["sudo", "rpm", "--import"];
pub const CMD_DNF_INSTALL_REPOS: &[&str] = &["sudo", "dnf", "install", "-y"];
pub const CMD_DNF_INSTALL: &[&str] = &["sudo", "dnf", "--refresh", "install", "-y"];
pub const CMD_DNF_REMOVE: &[&str] = &["sudo", "dnf", "remove", "-y"];
pub const CMD_DNF_AUTOREMOVE: &[&str] = &["sudo", "dnf", "autoremove", "-y"];
pub const CMD_FLATPAK_REMOTE_ADD: &[&str] = &["sudo", "flatpak", "remote-add", "--if-not-exists"];
pub const CMD_FLATPAK_INSTALL: &[&str] = &["flatpak", "install", "-y"];
pub const CMD_GETENT_GROUP: &[&str] = &["getent", "group"];
pub const CMD_GROUPADD: &[&str] = &["sudo", "groupadd"];
pub const CMD_USERMOD_APPEND_GROUPS: &[&str] = &["sudo", "usermod", "-aG"];
pub const CMD_SYSTEMCTL_ENABLE_NOW: &[&str] = &["sudo", "systemctl", "enable", "--now"];

// ============================================================================
// Steps and outcomes
// ============================================================================

/// The workflow steps, in the order they are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Step {
    #[strum(serialize = "RPMFusion repositories")]
    RpmFusion,
    #[strum(serialize = "DNF install")]
    DnfInstall,
    #[strum(serialize = "DNF remove")]
    DnfRemove,
    #[strum(serialize = "Flatpak apps")]
    Flatpak,
    #[strum(serialize = "Admin groups")]
    AdminGroups,
    #[strum(serialize = "Services")]
    Services,
}

impl Step {
    /// The yes/no question asked before the step runs.
    pub fn prompt(&self, settings: &Settings) -> String {
        match self {
            Self::RpmFusion => "Install RPMFusion repos?".to_string(),
            Self::DnfInstall => "Install additional packages with DNF?".to_string(),
            Self::DnfRemove => "Remove all DNF packages marked for removal?".to_string(),
            Self::Flatpak => "Install Flatpak apps?".to_string(),
            Self::AdminGroups => {
                "Ensure admin groups exist and add current user to them?".to_string()
            }
            Self::Services => {
                let noun = if settings.services.len() == 1 {
                    "service"
                } else {
                    "services"
                };
                format!("Enable and start {} {}?", settings.services.join(", "), noun)
            }
        }
    }
}

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The operator answered no.
    Declined,
    /// The step ran; `failures` commands reported a non-zero status.
    Completed { failures: usize },
    /// The step stopped before running its commands.
    Aborted(String),
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declined => write!(f, "declined"),
            Self::Completed { failures: 0 } => write!(f, "completed"),
            Self::Completed { failures } => {
                write!(f, "completed with {} failed command(s)", failures)
            }
            Self::Aborted(reason) => write!(f, "aborted ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: Step,
    pub status: StepStatus,
}

/// Outcome of every step, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowReport {
    pub outcomes: Vec<StepOutcome>,
}

impl WorkflowReport {
    pub fn status_of(&self, step: Step) -> Option<&StepStatus> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.step == step)
            .map(|outcome| &outcome.status)
    }

    /// Total failed commands across all steps.
    pub fn failed_commands(&self) -> usize {
        self.outcomes
            .iter()
            .map(|outcome| match outcome.status {
                StepStatus::Completed { failures } => failures,
                _ => 0,
            })
            .sum()
    }

    /// True when nothing failed and nothing was aborted.
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|outcome| {
            matches!(
                outcome.status,
                StepStatus::Declined | StepStatus::Completed { failures: 0 }
            )
        })
    }
}

impl fmt::Display for WorkflowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary:")?;
        for outcome in &self.outcomes {
            writeln!(f, "  {}: {}", outcome.step, outcome.status)?;
        }
        Ok(())
    }
}

/// `$USER`, falling back to `$LOGNAME`.
pub fn current_user() -> Option<String> {
    ["USER", "LOGNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|name| !name.trim().is_empty())
}

// ============================================================================
// Orchestrator
// ============================================================================

/// One interactive session over a loaded configuration.
pub struct Workflow<'a, R, W, L> {
    config: &'a SetupConfig,
    runner: &'a CommandRunner<L>,
    prompter: &'a mut Prompter<R, W>,
    user: Option<String>,
}

impl<'a, R, W, L> Workflow<'a, R, W, L>
where
    R: BufRead,
    W: Write,
    L: ProcessLauncher,
{
    pub fn new(
        config: &'a SetupConfig,
        runner: &'a CommandRunner<L>,
        prompter: &'a mut Prompter<R, W>,
        user: Option<String>,
    ) -> Self {
        Self {
            config,
            runner,
            prompter,
            user,
        }
    }

    /// Offer every step in order and collect the outcomes.
    pub fn run(&mut self) -> Result<WorkflowReport> {
        let mut report = WorkflowReport::default();

        for step in Step::iter() {
            let prompt = step.prompt(&self.config.settings);
            let status = if self.prompter.confirm(&prompt)? {
                info!("Running step: {}", step);
                match self.run_step(step) {
                    Ok(status) => status,
                    Err(SetupError::InvalidSelection { input }) => {
                        warn!("Invalid selection {:?}, aborting step {}", input, step);
                        self.prompter.say(
                            &format!("Invalid selection {:?}. Skipping this step.", input),
                            Some(Tone::Danger),
                        )?;
                        StepStatus::Aborted(format!("invalid selection {:?}", input))
                    }
                    Err(e) => return Err(e),
                }
            } else {
                StepStatus::Declined
            };

            info!("Step {}: {}", step, status);
            report.outcomes.push(StepOutcome { step, status });
        }

        Ok(report)
    }

    fn run_step(&mut self, step: Step) -> Result<StepStatus> {
        let failures = match step {
            Step::RpmFusion => self.rpmfusion(),
            Step::DnfInstall => self.dnf_install()?,
            Step::DnfRemove => self.dnf_remove()?,
            Step::Flatpak => self.flatpak()?,
            Step::AdminGroups => match self.user.clone() {
                Some(user) => self.admin_groups(&user)?,
                None => {
                    return Ok(StepStatus::Aborted(
                        "could not determine the current user".to_string(),
                    ));
                }
            },
            Step::Services => self.services(),
        };
        Ok(StepStatus::Completed { failures })
    }

    fn rpmfusion(&mut self) -> usize {
        let config = self.config;
        let rpmfusion = &config.settings.rpmfusion;
        let mut failures = 0;
        // One import per key so each bad key is counted on its own
        for key in &rpmfusion.gpg_keys {
            failures += self.act(CMD_RPM_IMPORT, std::slice::from_ref(key));
        }
        if !rpmfusion.repos.is_empty() {
            failures += self.act(CMD_DNF_INSTALL_REPOS, &rpmfusion.repos);
        }
        failures
    }

    fn dnf_install(&mut self) -> Result<usize> {
        let config = self.config;
        let selected = self.select(&config.dnf_install)?;
        self.act_on_selection(CMD_DNF_INSTALL, &[], &selected)
    }

    fn dnf_remove(&mut self) -> Result<usize> {
        let config = self.config;
        let selected = self.select(&config.dnf_remove)?;
        let mut failures = self.act_on_selection(CMD_DNF_REMOVE, &[], &selected)?;
        failures += self.act(CMD_DNF_AUTOREMOVE, &[]);
        Ok(failures)
    }

    fn flatpak(&mut self) -> Result<usize> {
        let config = self.config;
        let remote = &config.settings.flatpak;
        let name = remote.remote_name.clone();
        let mut failures = self.act(
            CMD_FLATPAK_REMOTE_ADD,
            &[name.clone(), remote.remote_url.clone()],
        );

        let selected = self.select(&config.flatpak_install)?;
        failures += self.act_on_selection(CMD_FLATPAK_INSTALL, &[name], &selected)?;
        Ok(failures)
    }

    fn admin_groups(&mut self, user: &str) -> Result<usize> {
        let config = self.config;
        let groups = &config.settings.admin_groups;
        let mut failures = 0;

        for group in groups {
            // Probe only: a non-zero status means the group is missing
            let exists = self.runner.run_command(
                CMD_GETENT_GROUP,
                std::slice::from_ref(group),
                self.prompter.writer(),
            ) == 0;
            if !exists {
                self.prompter.say(
                    &format!("Group '{}' does not exist. Creating...", group),
                    None,
                )?;
                failures += self.act(CMD_GROUPADD, std::slice::from_ref(group));
            }
        }

        if !groups.is_empty() {
            failures += self.act(
                CMD_USERMOD_APPEND_GROUPS,
                &[groups.join(","), user.to_string()],
            );
        }
        Ok(failures)
    }

    fn services(&mut self) -> usize {
        let config = self.config;
        let services = &config.settings.services;
        if services.is_empty() {
            return 0;
        }
        self.act(CMD_SYSTEMCTL_ENABLE_NOW, services)
    }

    /// Narrow `items` with an exclusion prompt. Empty lists are not shown.
    fn select(&mut self, items: &[String]) -> Result<Vec<String>> {
        if items.is_empty() {
            self.prompter.say("No packages are listed for this step.", None)?;
            return Ok(Vec::new());
        }
        self.prompter.prompt_for_exclusions(items)
    }

    /// Run `prefix fixed.. selected..`, or skip it when nothing was selected.
    fn act_on_selection(
        &mut self,
        prefix: &[&str],
        fixed: &[String],
        selected: &[String],
    ) -> Result<usize> {
        if selected.is_empty() {
            self.prompter.say(
                &format!("Nothing selected, skipping: {}", prefix.join(" ")),
                Some(Tone::Warning),
            )?;
            return Ok(0);
        }
        let args: Vec<String> = fixed.iter().chain(selected).cloned().collect();
        Ok(self.act(prefix, &args))
    }

    /// Run one action command; returns 1 if it did not succeed.
    fn act(&mut self, prefix: &[&str], args: &[String]) -> usize {
        let code = self.runner.run_command(prefix, args, self.prompter.writer());
        if code != 0 {
            warn!("`{} {}` returned {}", prefix.join(" "), args.join(" "), code);
        }
        usize::from(code != 0)
    }
}

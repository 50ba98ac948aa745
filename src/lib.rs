//! Fedora Post-Install Library
//!
//! Interactive selection and command execution for setting up a fresh Fedora
//! workstation: narrow package lists with exclusion expressions, then run the
//! package manager with the result (or just print it in dry-run mode).

pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod runner;
pub mod selection;
pub mod theme;
pub mod workflow;

// Re-export main types for convenience
pub use config::{Settings, SetupConfig};
pub use console::Prompter;
pub use error::{Result, SetupError};
pub use runner::{
    CommandRunner, CommandSpec, EXECUTION_FAILED, ProcessLauncher, RunningProcess, SystemLauncher,
};
pub use selection::{ExclusionSpec, ExclusionTerm, filter_items};
pub use theme::{Palette, Tone};
pub use workflow::{Step, StepStatus, Workflow, WorkflowReport};

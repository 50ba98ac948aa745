//! Configuration loading
//!
//! Package lists are plain text files, one name per line. Everything else
//! (RPMFusion sources, the Flatpak remote, admin groups, services) lives in
//! `settings.json`. Each file is looked up in the configuration directory
//! first and falls back to the copy embedded in the binary.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Result, SetupError};

pub const DNF_INSTALL_FILE: &str = "dnf-install.cf";
pub const DNF_REMOVE_FILE: &str = "dnf-remove.cf";
pub const FLATPAK_INSTALL_FILE: &str = "flatpak-install.cf";
pub const SETTINGS_FILE: &str = "settings.json";

/// Defaults compiled into the binary.
const EMBEDDED_RESOURCES: &[(&str, &str)] = &[
    (DNF_INSTALL_FILE, include_str!("../resources/dnf-install.cf")),
    (DNF_REMOVE_FILE, include_str!("../resources/dnf-remove.cf")),
    (
        FLATPAK_INSTALL_FILE,
        include_str!("../resources/flatpak-install.cf"),
    ),
    (SETTINGS_FILE, include_str!("../resources/settings.json")),
];

/// RPMFusion signing keys and release packages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpmFusion {
    pub gpg_keys: Vec<String>,
    pub repos: Vec<String>,
}

/// Flatpak remote the apps are installed from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatpakRemote {
    pub remote_name: String,
    pub remote_url: String,
}

impl Default for FlatpakRemote {
    fn default() -> Self {
        Self {
            remote_name: "flathub".to_string(),
            remote_url: "https://dl.flathub.org/repo/flathub.flatpakrepo".to_string(),
        }
    }
}

/// Structured settings from `settings.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rpmfusion: RpmFusion,
    pub flatpak: FlatpakRemote,
    pub admin_groups: Vec<String>,
    pub services: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpmfusion: RpmFusion::default(),
            flatpak: FlatpakRemote::default(),
            admin_groups: vec!["wheel".to_string()],
            services: vec!["cockpit.socket".to_string()],
        }
    }
}

impl Settings {
    /// Parse settings from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Everything the workflow needs, already cleaned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupConfig {
    pub settings: Settings,
    pub dnf_install: Vec<String>,
    pub dnf_remove: Vec<String>,
    pub flatpak_install: Vec<String>,
}

impl SetupConfig {
    /// Load settings and package lists from `dir`, or the embedded defaults.
    ///
    /// A missing or unreadable package list only produces a warning and an
    /// empty list. A malformed `settings.json` is an error.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let settings = Settings::from_json(&read_resource(dir, SETTINGS_FILE)?)?;

        let config = Self {
            settings,
            dnf_install: load_package_names(dir, DNF_INSTALL_FILE),
            dnf_remove: load_package_names(dir, DNF_REMOVE_FILE),
            flatpak_install: load_package_names(dir, FLATPAK_INSTALL_FILE),
        };
        debug!(
            "Loaded config: {} to install, {} to remove, {} flatpak app(s)",
            config.dnf_install.len(),
            config.dnf_remove.len(),
            config.flatpak_install.len()
        );
        Ok(config)
    }

    /// Reject values that would be misread by the tools they are passed to.
    pub fn validate(&self) -> Result<()> {
        let remote = &self.settings.flatpak;
        validate_token("flatpak remote name", &remote.remote_name)?;
        validate_token("flatpak remote URL", &remote.remote_url)?;

        for group in &self.settings.admin_groups {
            validate_token("admin group", group)?;
        }
        for service in &self.settings.services {
            validate_token("service", service)?;
        }
        Ok(())
    }
}

fn validate_token(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SetupError::config(format!("{} must not be empty", what)));
    }
    if value.starts_with('-') {
        return Err(SetupError::config(format!(
            "{} must not start with '-': {}",
            what, value
        )));
    }
    Ok(())
}

/// Read `name` from `dir` if present there, otherwise the embedded default.
pub fn read_resource(dir: Option<&Path>, name: &str) -> Result<String> {
    if let Some(dir) = dir {
        let path = dir.join(name);
        if path.exists() {
            debug!("Reading {:?}", path);
            return Ok(fs::read_to_string(&path)?);
        }
    }

    EMBEDDED_RESOURCES
        .iter()
        .find(|(resource, _)| *resource == name)
        .map(|(_, content)| content.to_string())
        .ok_or_else(|| SetupError::config(format!("Resource not found: {}", name)))
}

/// Package names from `name`, or an empty list if it cannot be read.
pub fn load_package_names(dir: Option<&Path>, name: &str) -> Vec<String> {
    match read_resource(dir, name) {
        Ok(content) => parse_package_lines(&content),
        Err(e) => {
            warn!("Failed to read package list from {}: {}", name, e);
            Vec::new()
        }
    }
}

/// Trimmed, non-empty lines that are not `#` comments.
pub fn parse_package_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

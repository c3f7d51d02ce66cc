//! Bundled crew registry: default crew definitions compiled into the binary.

use crate::error::{Error, Result};

use super::definition::CrewDefinition;

/// Name of the crew used when a configuration declares none.
pub const DEFAULT_CREW: &str = "analytics";

const BUNDLED_CREWS: &[&str] = &["analytics"];

/// Registry of crews shipped with the binary.
pub struct CrewRegistry;

impl CrewRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Names of every bundled crew.
    pub fn available(&self) -> &'static [&'static str] {
        BUNDLED_CREWS
    }

    /// Raw TOML of a bundled crew.
    pub fn get_bundled_config(&self, name: &str) -> Option<&'static str> {
        match name {
            "analytics" => Some(include_str!("../../config/crews/analytics.toml")),
            _ => None,
        }
    }

    /// Parse a bundled crew.
    pub fn load(&self, name: &str) -> Result<CrewDefinition> {
        let content = self.get_bundled_config(name).ok_or_else(|| {
            Error::config_validation(format!("no bundled crew named '{}'", name))
        })?;
        CrewDefinition::from_toml(content)
    }

    pub fn default_crew(&self) -> Result<CrewDefinition> {
        self.load(DEFAULT_CREW)
    }
}

impl Default for CrewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

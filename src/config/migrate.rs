//! Ordered upgrades for older config documents.
//!
//! Each step fills in what its version introduced, working on the raw TOML
//! table so user-set values in untouched sections survive.

use tracing::warn;

use super::Config;
use crate::error::{Error, Result};

pub const CURRENT_VERSION: &str = "1.3.0";

/// `major.minor.patch` version tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version(pub u32, pub u32, pub u32);

impl Version {
    pub const CURRENT: Version = Version(1, 3, 0);

    /// Parse `1.2.0`; missing components count as zero
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Version(major, minor, patch))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// Bring `table` up to [`CURRENT_VERSION`]. Returns whether anything changed.
pub(super) fn upgrade(table: &mut toml::Table) -> Result<bool> {
    let found = table
        .get("version")
        .and_then(|v| v.as_str())
        .and_then(Version::parse)
        .unwrap_or(Version(0, 0, 0));

    if found >= Version::CURRENT {
        return Ok(false);
    }

    warn!("Config changes detected! Updating...");
    let defaults = default_table()?;

    if found < Version(1, 0, 0) {
        *table = defaults;
        warn!("Config predates 1.0.0, replaced with defaults");
        return Ok(true);
    }

    if found < Version(1, 1, 0) {
        copy_section(table, &defaults, "notification", true);
        if let Some(entries) = section_mut(table, &defaults, "interior")
            .get_mut("entries")
            .and_then(|v| v.as_array_mut())
        {
            for entry in entries.iter_mut().filter_map(|e| e.as_table_mut()) {
                entry.insert("skin_ids".to_string(), toml::Value::Array(Vec::new()));
            }
        }
    }

    if found < Version(1, 2, 0) {
        let door_skins = defaults
            .get("structure")
            .and_then(|s| s.get("skin_ids"))
            .cloned()
            .unwrap_or_else(|| toml::Value::Array(Vec::new()));
        section_mut(table, &defaults, "structure").insert("skin_ids".to_string(), door_skins);
    }

    if found < Version(1, 3, 0) {
        copy_section(table, &defaults, "hazards", false);
        copy_section(table, &defaults, "defense", false);
    }

    table.insert(
        "version".to_string(),
        toml::Value::String(CURRENT_VERSION.to_string()),
    );
    warn!("Config update complete! Updated from version {} to {}", found, CURRENT_VERSION);
    Ok(true)
}

fn default_table() -> Result<toml::Table> {
    match toml::Value::try_from(Config::default())? {
        toml::Value::Table(table) => Ok(table),
        _ => Err(Error::InvalidConfig("default config is not a table".to_string())),
    }
}

/// Copy `name` from the defaults, replacing an existing value only when asked
fn copy_section(table: &mut toml::Table, defaults: &toml::Table, name: &str, replace: bool) {
    let Some(value) = defaults.get(name) else {
        return;
    };
    if replace || !table.contains_key(name) {
        table.insert(name.to_string(), value.clone());
    }
}

/// Mutable access to section `name`, inserting the default section if absent
fn section_mut<'a>(
    table: &'a mut toml::Table,
    defaults: &toml::Table,
    name: &str,
) -> &'a mut toml::Table {
    if !table.get(name).is_some_and(|v| v.is_table()) {
        let fallback = defaults
            .get(name)
            .cloned()
            .unwrap_or_else(|| toml::Value::Table(toml::Table::new()));
        table.insert(name.to_string(), fallback);
    }
    match table.get_mut(name) {
        Some(toml::Value::Table(section)) => section,
        _ => unreachable!("section inserted above"),
    }
}

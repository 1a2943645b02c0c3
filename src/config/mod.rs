//! Versioned camp configuration.
//!
//! The document is TOML. Older documents are upgraded in place by the
//! ordered patches in [`migrate`] before being deserialized, and the
//! upgraded version tag is written back.

mod migrate;

pub use migrate::{CURRENT_VERSION, Version};

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use crate::entity::{Posture, SkinId};
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub search: SearchConfig,
    pub schedule: ScheduleConfig,
    pub structure: StructureConfig,
    pub interior: InteriorConfig,
    pub loot: LootConfig,
    pub hazards: HazardConfig,
    pub defense: DefenseConfig,
    pub notification: NotificationConfig,
}

/// Where a camp may go relative to its anchor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Candidates tried per anchor before giving up for this cycle
    pub attempts: u32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// No deployed object, construction or actor may be this close
    pub entity_avoidance_radius: f32,
    /// No rock, cliff or formation may be this close
    pub rock_avoidance_radius: f32,
    pub no_build_distance: f32,
    /// Terrain must be within this radius of the candidate
    pub ground_check_radius: f32,
    pub ground_probe_range: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes between scan cycles
    pub frequency_minutes: f32,
    /// Pause after each anchor, whether or not a camp spawned
    pub delay_between_spawns_secs: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureConfig {
    pub template: String,
    /// Seconds between spawn and removal
    pub lifetime_secs: f32,
    /// Health override, host default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<f32>,
    /// Door skins to pick from (empty = leave default)
    #[serde(default)]
    pub skin_ids: Vec<SkinId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteriorConfig {
    /// Radius around the structure center objects are placed within
    pub radius: f32,
    pub position_attempts: u32,
    pub rotation_attempts: u32,
    pub ground_probe_range: f32,
    pub entries: Vec<InteriorEntry>,
}

/// One kind of object placed inside a camp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteriorEntry {
    pub template: String,
    #[serde(default)]
    pub skin_ids: Vec<SkinId>,
    pub min_count: u32,
    pub max_count: u32,
    /// Per-unit spawn chance in percent, every unit spawns when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_chance: Option<f32>,
    /// Share of container slots to fill with loot, in percent
    #[serde(default)]
    pub fill_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootConfig {
    pub items: Vec<ItemEntry>,
}

/// Item template with an inclusive amount range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEntry {
    pub template: String,
    #[serde(default)]
    pub skin: SkinId,
    pub min_amount: u32,
    pub max_amount: u32,
}

impl ItemEntry {
    pub fn new(template: &str, min_amount: u32, max_amount: u32) -> Self {
        Self {
            template: template.to_string(),
            skin: 0,
            min_amount,
            max_amount,
        }
    }
}

/// Hazards scattered around the outside of a camp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardConfig {
    pub enabled: bool,
    pub template: String,
    pub min_count: u32,
    pub max_count: u32,
    pub min_radius: f32,
    pub max_radius: f32,
    pub ground_probe_range: f32,
}

/// Armed object guarding a camp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefenseConfig {
    pub enabled: bool,
    pub template: String,
    /// Position relative to the structure
    pub offset: [f32; 3],
    pub yaw_degrees: f32,
    pub weapon: String,
    pub ammo: ItemEntry,
    /// Upper clamp for the loaded ammo count
    pub magazine_capacity: u32,
    #[serde(default)]
    pub reserve_ammo: Vec<ItemEntry>,
    pub posture: Posture,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Tell everyone nearby instead of just the anchor
    pub notify_nearby: bool,
    pub radius: f32,
    pub as_toast: bool,
}

impl Config {
    /// Read, upgrade and validate a config file without writing it back
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let (config, _) = Self::parse(&content)?;
        Ok(config)
    }

    /// Load `path`, creating it with defaults when missing and writing it
    /// back when an upgrade was applied
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        let (config, upgraded) = Self::parse(&content)?;
        if upgraded {
            config.save(path)?;
        }
        Ok(config)
    }

    /// Parse a TOML document, returning the config and whether it was upgraded
    pub fn parse(content: &str) -> Result<(Self, bool)> {
        let mut table: toml::Table = toml::from_str(content)?;
        let upgraded = migrate::upgrade(&mut table)?;
        require_tables(&table)?;

        let config: Config = toml::Value::Table(table).try_into()?;
        config.validate()?;
        Ok((config, upgraded))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject ranges and counts that would leave the spawner undefined
    pub fn validate(&self) -> Result<()> {
        self.check_finite()?;

        let s = &self.search;
        if s.attempts == 0 {
            return Err(invalid("search.attempts must be at least 1"));
        }
        check_radii("search", s.min_radius, s.max_radius)?;
        for (name, v) in [
            ("search.entity_avoidance_radius", s.entity_avoidance_radius),
            ("search.rock_avoidance_radius", s.rock_avoidance_radius),
            ("search.no_build_distance", s.no_build_distance),
            ("search.ground_check_radius", s.ground_check_radius),
            ("search.ground_probe_range", s.ground_probe_range),
        ] {
            if v < 0.0 {
                return Err(invalid(&format!("{name} must not be negative")));
            }
        }

        if self.schedule.frequency_minutes <= 0.0 {
            return Err(invalid("schedule.frequency_minutes must be positive"));
        }
        if self.schedule.delay_between_spawns_secs < 0.0 {
            return Err(invalid("schedule.delay_between_spawns_secs must not be negative"));
        }

        if self.structure.template.is_empty() {
            return Err(invalid("structure.template must be set"));
        }
        if self.structure.lifetime_secs <= 0.0 {
            return Err(invalid("structure.lifetime_secs must be positive"));
        }

        let i = &self.interior;
        if i.position_attempts == 0 || i.rotation_attempts == 0 {
            return Err(invalid("interior attempt counts must be at least 1"));
        }
        if i.radius < 0.0 {
            return Err(invalid("interior.radius must not be negative"));
        }
        for entry in &i.entries {
            if entry.min_count > entry.max_count {
                return Err(invalid(&format!(
                    "interior entry {}: min_count > max_count",
                    entry.template
                )));
            }
            if let Some(chance) = entry.spawn_chance {
                if !(0.0..=100.0).contains(&chance) {
                    return Err(invalid(&format!(
                        "interior entry {}: spawn_chance must be within 0..=100",
                        entry.template
                    )));
                }
            }
            if entry.fill_percent > 100 {
                return Err(invalid(&format!(
                    "interior entry {}: fill_percent must be within 0..=100",
                    entry.template
                )));
            }
        }

        for item in &self.loot.items {
            check_amounts(item)?;
        }

        if self.hazards.enabled {
            let h = &self.hazards;
            if h.min_count > h.max_count {
                return Err(invalid("hazards.min_count > hazards.max_count"));
            }
            check_radii("hazards", h.min_radius, h.max_radius)?;
        }

        if self.defense.enabled {
            check_amounts(&self.defense.ammo)?;
            if self.defense.ammo.min_amount > self.defense.magazine_capacity {
                return Err(invalid("defense.ammo.min_amount exceeds defense.magazine_capacity"));
            }
            for item in &self.defense.reserve_ammo {
                check_amounts(item)?;
            }
        }

        if self.notification.radius < 0.0 {
            return Err(invalid("notification.radius must not be negative"));
        }

        Ok(())
    }
}

impl Config {
    /// NaN and infinities slip past every range comparison
    fn check_finite(&self) -> Result<()> {
        let s = &self.search;
        let d = &self.defense;
        let mut values = vec![
            ("search.min_radius", s.min_radius),
            ("search.max_radius", s.max_radius),
            ("search.entity_avoidance_radius", s.entity_avoidance_radius),
            ("search.rock_avoidance_radius", s.rock_avoidance_radius),
            ("search.no_build_distance", s.no_build_distance),
            ("search.ground_check_radius", s.ground_check_radius),
            ("search.ground_probe_range", s.ground_probe_range),
            ("schedule.frequency_minutes", self.schedule.frequency_minutes),
            ("schedule.delay_between_spawns_secs", self.schedule.delay_between_spawns_secs),
            ("structure.lifetime_secs", self.structure.lifetime_secs),
            ("interior.radius", self.interior.radius),
            ("interior.ground_probe_range", self.interior.ground_probe_range),
            ("hazards.min_radius", self.hazards.min_radius),
            ("hazards.max_radius", self.hazards.max_radius),
            ("hazards.ground_probe_range", self.hazards.ground_probe_range),
            ("defense.offset", d.offset[0]),
            ("defense.offset", d.offset[1]),
            ("defense.offset", d.offset[2]),
            ("defense.yaw_degrees", d.yaw_degrees),
            ("notification.radius", self.notification.radius),
        ];
        if let Some(health) = self.structure.health {
            values.push(("structure.health", health));
        }
        values.extend(
            self.interior
                .entries
                .iter()
                .filter_map(|e| e.spawn_chance)
                .map(|chance| ("interior spawn_chance", chance)),
        );

        match values.into_iter().find(|(_, v)| !v.is_finite()) {
            Some((name, _)) => Err(invalid(&format!("{name} must be a finite number"))),
            None => Ok(()),
        }
    }
}

fn invalid(msg: &str) -> Error {
    Error::InvalidConfig(msg.to_string())
}

fn check_radii(section: &str, min: f32, max: f32) -> Result<()> {
    if min < 0.0 || max < 0.0 {
        return Err(invalid(&format!("{section} radii must not be negative")));
    }
    if min > max {
        return Err(invalid(&format!("{section}.min_radius > {section}.max_radius")));
    }
    Ok(())
}

fn check_amounts(item: &ItemEntry) -> Result<()> {
    if item.min_amount > item.max_amount {
        return Err(invalid(&format!(
            "item {}: min_amount > max_amount",
            item.template
        )));
    }
    Ok(())
}

/// The item and object tables have no sensible fallback
fn require_tables(table: &toml::Table) -> Result<()> {
    let interior = table
        .get("interior")
        .and_then(|v| v.as_table())
        .ok_or(Error::MissingTable("interior"))?;
    if !interior.get("entries").is_some_and(|v| v.is_array()) {
        return Err(Error::MissingTable("interior.entries"));
    }

    let loot = table
        .get("loot")
        .and_then(|v| v.as_table())
        .ok_or(Error::MissingTable("loot"))?;
    if !loot.get("items").is_some_and(|v| v.is_array()) {
        return Err(Error::MissingTable("loot.items"));
    }
    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            search: SearchConfig::default(),
            schedule: ScheduleConfig::default(),
            structure: StructureConfig::default(),
            interior: InteriorConfig::default(),
            loot: LootConfig::default(),
            hazards: HazardConfig::default(),
            defense: DefenseConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            min_radius: 20.0,
            max_radius: 50.0,
            entity_avoidance_radius: 6.0,
            rock_avoidance_radius: 5.0,
            no_build_distance: 10.0,
            ground_check_radius: 4.0,
            ground_probe_range: 5.0,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            frequency_minutes: 60.0,
            delay_between_spawns_secs: 5.0,
        }
    }
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            template: "shelter.wood".to_string(),
            lifetime_secs: 600.0,
            health: None,
            skin_ids: vec![809253752, 2246937402, 2483070538, 3076134051],
        }
    }
}

impl Default for InteriorConfig {
    fn default() -> Self {
        Self {
            radius: 1.7,
            position_attempts: 30,
            rotation_attempts: 30,
            ground_probe_range: 2.0,
            entries: vec![
                InteriorEntry {
                    template: "box.wooden".to_string(),
                    skin_ids: vec![0],
                    min_count: 1,
                    max_count: 3,
                    spawn_chance: None,
                    fill_percent: 20,
                },
                InteriorEntry {
                    template: "furnace".to_string(),
                    skin_ids: vec![0],
                    min_count: 1,
                    max_count: 1,
                    spawn_chance: None,
                    fill_percent: 0,
                },
            ],
        }
    }
}

impl Default for LootConfig {
    fn default() -> Self {
        Self {
            items: vec![
                ItemEntry::new("fat.animal", 10, 25),
                ItemEntry::new("cloth", 20, 30),
                ItemEntry::new("wood", 200, 400),
                ItemEntry::new("syringe.medical", 1, 2),
                ItemEntry::new("rope", 1, 3),
                ItemEntry::new("cctv.camera", 1, 1),
                ItemEntry::new("roadsigns", 1, 2),
                ItemEntry::new("stones", 150, 350),
                ItemEntry::new("metal.fragments", 30, 90),
                ItemEntry::new("ammo.grenadelauncher.he", 1, 2),
                ItemEntry::new("coffeecan.helmet", 1, 1),
                ItemEntry::new("scrap", 10, 25),
                ItemEntry::new("icepick.salvaged", 1, 1),
                ItemEntry::new("ptz.cctv.camera", 1, 1),
                ItemEntry::new("corn", 3, 5),
                ItemEntry::new("ammo.rocket.mlrs", 1, 1),
                ItemEntry::new("wall.frame.garagedoor", 1, 1),
                ItemEntry::new("pistol.revolver", 1, 1),
            ],
        }
    }
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            template: "landmine".to_string(),
            min_count: 2,
            max_count: 4,
            min_radius: 3.0,
            max_radius: 8.0,
            ground_probe_range: 2.0,
        }
    }
}

impl Default for DefenseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            template: "sentry.turret".to_string(),
            offset: [0.0, 0.0, 2.5],
            yaw_degrees: 180.0,
            weapon: "rifle.semiauto".to_string(),
            ammo: ItemEntry::new("ammo.rifle", 16, 16),
            magazine_capacity: 16,
            reserve_ammo: vec![ItemEntry::new("ammo.rifle", 64, 128)],
            posture: Posture::Hostile,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            notify_nearby: false,
            radius: 40.0,
            as_toast: true,
        }
    }
}

/// Shared, atomically swappable config snapshot.
///
/// Readers grab an `Arc<Config>` once per cycle and keep it; a reload never
/// mutates a snapshot somebody is holding.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    tx: Arc<watch::Sender<Arc<Config>>>,
}

impl ConfigHandle {
    pub fn new(config: Config) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(config));
        Self { tx: Arc::new(tx) }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<Config> {
        self.tx.borrow().clone()
    }

    /// Receiver that wakes on every reload
    pub fn subscribe(&self) -> watch::Receiver<Arc<Config>> {
        self.tx.subscribe()
    }

    /// Validate and swap in a new config
    pub fn reload(&self, config: Config) -> Result<()> {
        config.validate()?;
        self.tx.send_replace(Arc::new(config));
        info!("Configuration reloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let (parsed, upgraded) = Config::parse(&text).unwrap();
        assert!(!upgraded);
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_inverted_search_radii_rejected() {
        let mut config = Config::default();
        config.search.min_radius = 60.0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = Config::default();
        config.interior.rotation_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_loot_table_aborts() {
        let text = toml::to_string(&Config::default()).unwrap();
        let mut table: toml::Table = toml::from_str(&text).unwrap();
        table.remove("loot");
        let text = toml::to_string(&table).unwrap();
        assert!(matches!(Config::parse(&text), Err(Error::MissingTable("loot"))));
    }

    fn parse_with(section: &str, key: &str, value: f64) -> Result<(Config, bool)> {
        let text = toml::to_string(&Config::default()).unwrap();
        let mut table: toml::Table = toml::from_str(&text).unwrap();
        table
            .get_mut(section)
            .and_then(|v| v.as_table_mut())
            .unwrap()
            .insert(key.to_string(), toml::Value::Float(value));
        Config::parse(&toml::to_string(&table).unwrap())
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        for (section, key, value) in [
            ("structure", "lifetime_secs", f64::NAN),
            ("schedule", "frequency_minutes", f64::INFINITY),
            ("schedule", "delay_between_spawns_secs", f64::INFINITY),
            ("search", "max_radius", f64::INFINITY),
            ("notification", "radius", f64::NAN),
        ] {
            let result = parse_with(section, key, value);
            assert!(
                matches!(result, Err(Error::InvalidConfig(_))),
                "{section}.{key} = {value} accepted"
            );
        }
        assert!(parse_with("structure", "lifetime_secs", 30.0).is_ok());
    }

    #[test]
    fn test_load_or_init_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lootcamp.toml");
        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_handle_reload_swaps_snapshot() {
        let handle = ConfigHandle::new(Config::default());
        let before = handle.snapshot();

        let mut next = Config::default();
        next.structure.lifetime_secs = 30.0;
        handle.reload(next).unwrap();

        assert_eq!(before.structure.lifetime_secs, 600.0);
        assert_eq!(handle.snapshot().structure.lifetime_secs, 30.0);
    }

    #[test]
    fn test_handle_rejects_invalid_reload() {
        let handle = ConfigHandle::new(Config::default());
        let mut bad = Config::default();
        bad.structure.lifetime_secs = 0.0;
        assert!(handle.reload(bad).is_err());
        assert_eq!(handle.snapshot().structure.lifetime_secs, 600.0);
    }
}

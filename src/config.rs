//! Configuration file
//!
//! A TOML file, `/etc/linpower.toml` by default. Every key is optional.
//!
//! ```toml
//! sysfs_root = "/sys"
//! governor = "powersave"
//! frequency = "800000"
//! discover = true
//! categories = ["governor", "frequency", "peripherals"]
//! bluetooth_state = "0"
//!
//! [[rules]]
//! category = "usb"
//! path = "bus/usb/devices/1-1/power/control"
//! value = "auto"
//! ```
//!
//! Relative rule paths are relative to `sysfs_root`.
use crate::{
    error::ConfigError,
    report::Category,
    sysfs::{ControlPath, Sysfs},
    system::{
        cpu::{Governor, DEFAULT_FREQUENCY},
        peripherals::{Peripherals, Rule},
    },
    util::SYSFS_PATH,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io,
    path::{Path, PathBuf},
};
use tracing::warn;

/// Where the configuration is read from, unless told otherwise.
pub const CONFIG_PATH: &str = "/etc/linpower.toml";

/// Bluetooth rfkill `state` written by default.
pub const DEFAULT_BLUETOOTH_STATE: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where sysfs is mounted
    pub sysfs_root: PathBuf,

    /// Governor set before the frequency is
    pub governor: String,

    /// Written to every `scaling_setspeed`, in kHz
    pub frequency: String,

    /// Enumerate peripherals, rather than only using the fixed table
    pub discover: bool,

    /// Which steps and peripherals to touch. See [`Category::from_name`].
    pub categories: Vec<String>,

    /// Value for rfkill `state`
    pub bluetooth_state: String,

    /// Extra rules, applied after the built in ones
    pub rules: Vec<RuleConfig>,
}

/// An extra [`Rule`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub category: String,
    pub path: PathBuf,
    pub value: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from(SYSFS_PATH),
            governor: Governor::Powersave.to_string(),
            frequency: DEFAULT_FREQUENCY.to_owned(),
            discover: true,
            categories: vec!["all".to_owned()],
            bluetooth_state: DEFAULT_BLUETOOTH_STATE.to_owned(),
            rules: Vec::new(),
        }
    }
}

// Public
impl Config {
    /// Load the configuration at `path`.
    ///
    /// Returns [`None`] if it doesn't exist.
    ///
    /// # Errors
    ///
    /// - If `path` exists but couldn't be read
    /// - If it isn't valid
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::Read(path.display().to_string(), e)),
        }
    }

    /// Parse a configuration.
    ///
    /// Unknown category names and invalid extra rules are not errors here,
    /// they are dropped with a warning when the configuration is used.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn sysfs(&self) -> Sysfs {
        Sysfs::new(&self.sysfs_root)
    }

    /// Union of the known names in [`Config::categories`].
    ///
    /// Unknown names are logged and ignored, they never widen the set. If
    /// none are known the result is empty, and a pass does nothing.
    pub fn categories(&self) -> Category {
        let mut categories = Category::empty();
        for name in &self.categories {
            match Category::from_name(name) {
                Some(c) => categories |= c,
                None => warn!("{}, ignoring it", ConfigError::UnknownCategory(name.clone())),
            }
        }
        categories
    }

    /// The peripheral rules this configuration describes.
    ///
    /// Discovered or fixed, then the extra [`Config::rules`], then limited to
    /// [`Config::categories`].
    pub fn peripherals(&self) -> Peripherals {
        self.peripherals_in(self.categories())
    }
}

// Private
impl Config {
    /// [`Config::peripherals`], limited to `categories`.
    ///
    /// Nothing is enumerated unless `categories` has a peripheral in it.
    pub(crate) fn peripherals_in(&self, categories: Category) -> Peripherals {
        if !categories.intersects(Category::PERIPHERALS) {
            return Peripherals::default();
        }
        let sysfs = self.sysfs();
        let mut p = if self.discover {
            Peripherals::discover(&sysfs)
        } else {
            Peripherals::defaults(&sysfs)
        };
        p.set_value(Category::BLUETOOTH, &self.bluetooth_state);
        for rule in &self.rules {
            match extra_rule(&sysfs, rule) {
                Ok(rule) => p.push(rule),
                Err(e) => warn!("Skipping rule for {}: {e}", rule.path.display()),
            }
        }
        p.only(categories)
    }
}

fn extra_rule(sysfs: &Sysfs, rule: &RuleConfig) -> Result<Rule, ConfigError> {
    let category = Category::from_name(&rule.category)
        .ok_or_else(|| ConfigError::UnknownCategory(rule.category.clone()))?;
    ControlPath::new(&rule.path)?;
    Ok(Rule::new(category, sysfs.attribute(&rule.path), rule.value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

    #[test]
    fn empty() -> Result<()> {
        let config = Config::from_toml("")?;
        assert_eq!(config, Config::default());
        assert!(config.discover);
        assert_eq!(config.categories(), Category::all());

        let fixed = Config::from_toml("discover = false")?;
        assert_eq!(fixed.peripherals().rules().len(), 11);
        Ok(())
    }

    #[test]
    fn full() -> Result<()> {
        let config = Config::from_toml(
            r#"
            sysfs_root = "/tmp/fake"
            discover = false
            governor = "conservative"
            frequency = "600000"
            categories = ["cpu", "Bluetooth"]
            bluetooth_state = "1"

            [[rules]]
            category = "bluetooth"
            path = "class/rfkill/rfkill1/state"
            value = "1"

            [[rules]]
            category = "usb"
            path = "/dev/null"
            value = "auto"
            "#,
        )?;
        assert_eq!(config.governor, "conservative");
        assert_eq!(config.categories(), Category::CPU | Category::BLUETOOTH);

        let p = config.peripherals();
        let rules: Vec<_> = p
            .rules()
            .iter()
            .map(|r| (r.path.to_string(), r.value.as_str()))
            .collect();
        assert_eq!(
            rules,
            [
                ("/tmp/fake/class/rfkill/rfkill0/state".to_owned(), "1"),
                ("/tmp/fake/class/rfkill/rfkill1/state".to_owned(), "1"),
            ]
        );
        Ok(())
    }

    #[test]
    fn invalid() {
        assert!(matches!(
            Config::from_toml("governer = \"powersave\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn unknown_category() -> Result<()> {
        let config = Config::from_toml(
            r#"
            sysfs_root = "/tmp/fake"
            discover = false
            categories = ["cpu", "flopy"]
            "#,
        )?;
        // Dropped, never widened to everything.
        assert_eq!(config.categories(), Category::CPU);
        assert!(config.peripherals().rules().is_empty());

        let config = Config {
            categories: vec!["flopy".into()],
            ..config
        };
        assert!(config.categories().is_empty());
        assert!(config.peripherals().rules().is_empty());
        Ok(())
    }

    #[test]
    fn bad_rules_are_skipped() -> Result<()> {
        let config = Config::from_toml(
            r#"
            sysfs_root = "/tmp/fake"
            discover = false
            categories = ["usb"]

            [[rules]]
            category = "floppy"
            path = "bus/usb/devices/1-1/power/control"
            value = "auto"

            [[rules]]
            category = "usb"
            path = ""
            value = "auto"

            [[rules]]
            category = "usb"
            path = "bus/usb/devices/1-2/power/control"
            value = "auto"
            "#,
        )?;
        let rules = config.peripherals();
        assert_eq!(rules.rules().len(), 5);
        assert_eq!(
            rules.rules()[4].path.to_string(),
            "/tmp/fake/bus/usb/devices/1-2/power/control"
        );
        assert!(matches!(
            extra_rule(&config.sysfs(), &config.rules[0]),
            Err(ConfigError::UnknownCategory(c)) if c == "floppy"
        ));
        assert!(matches!(
            extra_rule(&config.sysfs(), &config.rules[1]),
            Err(ConfigError::EmptyPath)
        ));
        Ok(())
    }

    #[test]
    fn load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("linpower.toml");
        assert!(Config::load(&path)?.is_none());

        fs::write(&path, "discover = false\n")?;
        let config = Config::load(&path)?.ok_or("missing")?;
        assert!(!config.discover);
        Ok(())
    }
}

//! Runtime power management for peripherals
//!
//! Every peripheral is put into a lower power state by writing one
//! attribute. Most are the generic runtime PM `power/control`, documented
//! [here][1], where `auto` lets the kernel suspend the device while idle.
//!
//! The rest are one-offs.
//!
//! - rfkill `state`, see [sysfs-class-rfkill][2]. Whether `0` blocks or
//!   unblocks the radio has to be checked against the target platform, the
//!   value is configurable for that reason.
//! - The `snd_hda_intel` `power_save` module parameter, seconds of idle
//!   before the codec is powered down.
//! - Block `queue/rotational`, see [sysfs-block][3]. Not a power switch, it
//!   only changes how the I/O scheduler treats the device.
//!
//! [1]: https://www.kernel.org/doc/Documentation/ABI/testing/sysfs-devices-power
//! [2]: https://www.kernel.org/doc/Documentation/ABI/stable/sysfs-class-rfkill
//! [3]: https://www.kernel.org/doc/Documentation/ABI/stable/sysfs-block
use crate::{
    report::{Category, Report},
    sysfs::{ControlPath, ControlWriter, Sysfs},
    util::{is_indexed, read_attribute},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const USB_PATH: &str = "bus/usb/devices";
pub const RFKILL_PATH: &str = "class/rfkill";
pub const NET_PATH: &str = "class/net";
pub const BLOCK_PATH: &str = "block";
pub const DRM_PATH: &str = "class/drm";
pub const AUDIO_POWER_SAVE_PATH: &str = "module/snd_hda_intel/parameters/power_save";

/// Runtime PM `power/control` value allowing autosuspend.
pub const AUTO: &str = "auto";

/// The fixed table, relative to the sysfs root.
///
/// Used as is by [`Peripherals::defaults`], and per category by
/// [`Peripherals::discover`] when a class directory can't be read.
pub const DEFAULT_RULES: &[(Category, &str, &str)] = &[
    (Category::USB, "bus/usb/devices/usb1/power/control", AUTO),
    (Category::USB, "bus/usb/devices/usb2/power/control", AUTO),
    (Category::USB, "bus/usb/devices/usb3/power/control", AUTO),
    (Category::USB, "bus/usb/devices/usb4/power/control", AUTO),
    (Category::BLUETOOTH, "class/rfkill/rfkill0/state", "0"),
    (Category::WIFI, "class/net/wlan0/power/control", AUTO),
    (Category::AUDIO, AUDIO_POWER_SAVE_PATH, "1"),
    (Category::STORAGE, "block/sda/queue/rotational", "0"),
    (Category::STORAGE, "block/sdb/queue/rotational", "0"),
    (Category::GPU, "class/drm/card0/power/control", AUTO),
    (Category::ETHERNET, "class/net/eth0/power/control", AUTO),
];

/// One attribute, and what to write to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub category: Category,
    pub path: ControlPath,
    pub value: String,
}

impl Rule {
    pub fn new(category: Category, path: ControlPath, value: impl Into<String>) -> Self {
        Self {
            category,
            path,
            value: value.into(),
        }
    }
}

/// A set of peripheral [`Rule`]s
#[derive(Debug, Clone, Default)]
pub struct Peripherals {
    rules: Vec<Rule>,
}

// Public
impl Peripherals {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// [`DEFAULT_RULES`], under `sysfs`
    pub fn defaults(sysfs: &Sysfs) -> Self {
        Self::new(defaults_for(sysfs, Category::all()))
    }

    /// Build rules from the devices that actually exist under `sysfs`.
    ///
    /// - USB root hubs, `usb<N>`
    /// - rfkill switches whose `type` is `bluetooth`
    /// - Network interfaces, wireless if they have `wireless` or `phy80211`,
    ///   otherwise ethernet if they're backed by a `device` and of `type` 1
    /// - Block devices backed by a `device`, so no loop, ram or dm devices
    /// - DRM cards, `card<N>`, but not their connectors or render nodes
    ///
    /// The audio parameter has nothing to enumerate and always comes from
    /// [`DEFAULT_RULES`]. So does every category whose directory couldn't be
    /// read.
    pub fn discover(sysfs: &Sysfs) -> Self {
        let mut rules = Vec::new();
        let mut discovered =
            |category: Category, dir: &str, found: walkdir::Result<Vec<Rule>>| match found {
                Ok(found) => {
                    debug!("Found {} {category} rule(s) under {dir}", found.len());
                    rules.extend(found);
                }
                Err(e) => {
                    warn!("Couldn't enumerate {dir}, using defaults for {category}: {e}");
                    rules.extend(defaults_for(sysfs, category));
                }
            };

        discovered(Category::USB, USB_PATH, usb(sysfs));
        discovered(Category::BLUETOOTH, RFKILL_PATH, bluetooth(sysfs));
        match net(sysfs) {
            Ok((wifi, ethernet)) => {
                discovered(Category::WIFI, NET_PATH, Ok(wifi));
                discovered(Category::ETHERNET, NET_PATH, Ok(ethernet));
            }
            Err(e) => discovered(Category::WIFI | Category::ETHERNET, NET_PATH, Err(e)),
        }
        discovered(
            Category::AUDIO,
            AUDIO_POWER_SAVE_PATH,
            Ok(defaults_for(sysfs, Category::AUDIO)),
        );
        discovered(Category::STORAGE, BLOCK_PATH, storage(sysfs));
        discovered(Category::GPU, DRM_PATH, gpu(sysfs));

        Self::new(rules)
    }

    /// Keep only rules in any of `categories`
    pub fn only(mut self, categories: Category) -> Self {
        self.rules.retain(|r| categories.intersects(r.category));
        self
    }

    /// Write `value` instead, for every rule in `category`.
    ///
    /// Mostly useful for [`Category::BLUETOOTH`], see the module docs.
    pub fn set_value(&mut self, category: Category, value: &str) {
        for rule in self.rules.iter_mut().filter(|r| category.intersects(r.category)) {
            rule.value = value.to_owned();
        }
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Apply every rule, in order, exactly once.
    ///
    /// A failed rule doesn't stop the rest. Missing attributes are normal,
    /// not every machine has every peripheral.
    pub fn apply_all<W: ControlWriter + ?Sized>(&self, writer: &mut W) -> Report {
        info!("Disabling unused peripheral devices...");
        let mut report = Report::new();
        for rule in &self.rules {
            report.attempt(&mut *writer, rule.category, rule.path.clone(), &rule.value);
        }
        info!("Peripheral power management configuration completed.");
        report
    }
}

/// [`DEFAULT_RULES`] in any of `categories`, under `sysfs`.
fn defaults_for(sysfs: &Sysfs, categories: Category) -> Vec<Rule> {
    DEFAULT_RULES
        .iter()
        .filter(|(c, _, _)| categories.intersects(*c))
        .map(|(c, path, value)| Rule::new(*c, sysfs.attribute(path), *value))
        .collect()
}

/// Name and path of every entry in `dir`, sorted by name.
///
/// Only failing to read `dir` itself is an error, unreadable entries are
/// skipped.
fn entries(dir: &Path) -> walkdir::Result<Vec<(String, PathBuf)>> {
    let mut v = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => return Err(e),
            Err(e) => {
                debug!("Skipping {e}");
                continue;
            }
        };
        if let Some(name) = entry.file_name().to_str() {
            v.push((name.to_owned(), entry.path().to_path_buf()));
        }
    }
    Ok(v)
}

fn control(category: Category, device: &Path, attr: &str, value: &str) -> Rule {
    Rule::new(category, ControlPath::new_unchecked(device.join(attr)), value)
}

fn usb(sysfs: &Sysfs) -> walkdir::Result<Vec<Rule>> {
    Ok(entries(&sysfs.join(USB_PATH))?
        .into_iter()
        .filter(|(name, _)| is_indexed(name, "usb"))
        .map(|(_, path)| control(Category::USB, &path, "power/control", AUTO))
        .collect())
}

fn bluetooth(sysfs: &Sysfs) -> walkdir::Result<Vec<Rule>> {
    Ok(entries(&sysfs.join(RFKILL_PATH))?
        .into_iter()
        .filter(|(_, path)| {
            read_attribute(&path.join("type")).map_or(false, |t| t == "bluetooth")
        })
        .map(|(_, path)| control(Category::BLUETOOTH, &path, "state", "0"))
        .collect())
}

/// Wireless and ethernet interfaces
fn net(sysfs: &Sysfs) -> walkdir::Result<(Vec<Rule>, Vec<Rule>)> {
    let mut wifi = Vec::new();
    let mut ethernet = Vec::new();
    for (_, path) in entries(&sysfs.join(NET_PATH))? {
        if path.join("wireless").exists() || path.join("phy80211").exists() {
            wifi.push(control(Category::WIFI, &path, "power/control", AUTO));
        } else if path.join("device").exists()
            && read_attribute(&path.join("type")).map_or(false, |t| t == "1")
        {
            ethernet.push(control(Category::ETHERNET, &path, "power/control", AUTO));
        }
    }
    Ok((wifi, ethernet))
}

fn storage(sysfs: &Sysfs) -> walkdir::Result<Vec<Rule>> {
    Ok(entries(&sysfs.join(BLOCK_PATH))?
        .into_iter()
        .filter(|(_, path)| path.join("device").exists())
        .map(|(_, path)| control(Category::STORAGE, &path, "queue/rotational", "0"))
        .collect())
}

fn gpu(sysfs: &Sysfs) -> walkdir::Result<Vec<Rule>> {
    Ok(entries(&sysfs.join(DRM_PATH))?
        .into_iter()
        .filter(|(name, _)| is_indexed(name, "card") && !name.contains('-'))
        .map(|(_, path)| control(Category::GPU, &path, "power/control", AUTO))
        .collect())
}

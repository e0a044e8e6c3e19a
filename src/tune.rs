//! One complete configuration pass
//!
//! In order, and unconditionally:
//!
//! 1. Set the CPU governor, `powersave` by default
//! 2. Set a fixed CPU frequency, `800000` kHz by default. This switches the
//!    governor to `userspace` first.
//! 3. Apply the peripheral rules
//!
//! No step is retried or rolled back, and no failure stops a later step.
//! The pass always runs to completion, everything that went wrong is in the
//! returned [`Report`].
use crate::{
    config::Config,
    report::{Category, Report},
    sysfs::{ControlWriter, Sysfs},
    system::{
        self,
        cpu::{Cpus, Governor, DEFAULT_FREQUENCY},
        peripherals::Peripherals,
    },
};
use tracing::{info, warn};

/// Runs a configuration pass
#[derive(Debug, Clone)]
pub struct Tuner {
    cpus: Cpus,
    governor: String,
    frequency: String,
    peripherals: Peripherals,
    categories: Category,
}

// Public
impl Tuner {
    /// Default pass over the fixed peripheral table under `sysfs`.
    pub fn new(sysfs: &Sysfs) -> Self {
        Self {
            cpus: Cpus::new(sysfs),
            governor: Governor::Powersave.to_string(),
            frequency: DEFAULT_FREQUENCY.to_owned(),
            peripherals: Peripherals::defaults(sysfs),
            categories: Category::all(),
        }
    }

    /// Pass described by `config`.
    ///
    /// Unknown categories are dropped, so they only ever narrow the pass.
    pub fn from_config(config: &Config) -> Self {
        let categories = config.categories();
        Self {
            cpus: Cpus::new(&config.sysfs()),
            governor: config.governor.clone(),
            frequency: config.frequency.clone(),
            peripherals: config.peripherals_in(categories),
            categories,
        }
    }

    pub fn governor(mut self, governor: &str) -> Self {
        self.governor = governor.to_owned();
        self
    }

    pub fn frequency(mut self, khz: &str) -> Self {
        self.frequency = khz.to_owned();
        self
    }

    pub fn peripherals(mut self, peripherals: Peripherals) -> Self {
        self.peripherals = peripherals;
        self
    }

    /// Only run steps, and apply rules, in any of `categories`
    pub fn only(mut self, categories: Category) -> Self {
        self.categories = categories;
        self
    }

    /// Steps and peripherals this pass touches
    pub fn categories(&self) -> Category {
        self.categories
    }

    pub fn cpus(&self) -> &Cpus {
        &self.cpus
    }

    pub fn rules(&self) -> &Peripherals {
        &self.peripherals
    }

    /// Run the pass.
    pub fn run<W: ControlWriter + ?Sized>(&self, writer: &mut W) -> Report {
        info!("=== Energy efficiency optimization ===");
        match system::kernel_release() {
            Some(release) => info!("Kernel {release}"),
            None => warn!("Couldn't determine kernel release"),
        }
        if !system::is_root() {
            warn!("Not running as root, most writes will fail");
        }
        if Governor::from_name(&self.governor).is_none() {
            warn!("Unknown governor '{}', writing it anyway", self.governor);
        }

        let mut report = Report::new();
        if self.categories.contains(Category::GOVERNOR) {
            info!("1. Setting up power-efficient CPU governor...");
            report.append(self.cpus.set_governor(&mut *writer, &self.governor));
        }
        if self.categories.contains(Category::FREQUENCY) {
            info!("2. Configuring manual CPU frequency (low power mode)...");
            report.append(self.cpus.set_frequency(&mut *writer, &self.frequency));
        }
        if self.categories.intersects(Category::PERIPHERALS) {
            info!("3. Disabling unused peripheral devices...");
            let peripherals = self.peripherals.clone().only(self.categories);
            report.append(peripherals.apply_all(&mut *writer));
        }

        report.log_summary();
        info!(
            "=== Energy efficiency optimization complete, {} of {} writes succeeded ===",
            report.succeeded(),
            report.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sysfs::{writer::RecordingWriter, DryRunWriter, SysfsWriter},
        system::{cpu::CPU_PATH, peripherals::DEFAULT_RULES},
    };
    use std::{fs, path::Path};

    type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

    fn cores(root: &Path, cores: &[&str]) -> Result<()> {
        for core in cores {
            let cpufreq = root.join(CPU_PATH).join(core).join("cpufreq");
            fs::create_dir_all(&cpufreq)?;
            fs::write(cpufreq.join("scaling_governor"), "")?;
            fs::write(cpufreq.join("scaling_setspeed"), "")?;
        }
        Ok(())
    }

    #[test]
    fn order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        cores(dir.path(), &["cpu0", "cpu1"])?;
        let tuner = Tuner::new(&Sysfs::new(dir.path()));

        let mut w = RecordingWriter::default();
        let report = tuner.run(&mut w);

        // 2 powersave, 2 userspace, 2 setspeed, then every peripheral.
        assert_eq!(report.len(), 6 + DEFAULT_RULES.len());
        let values: Vec<&str> = w.writes.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(
            values[..6],
            ["powersave", "powersave", "userspace", "userspace", "800000", "800000"]
        );
        assert_eq!(report.tally(Category::CPU).failed, 0);
        // No peripherals in the fake tree, all fail and the pass still ends.
        assert_eq!(report.tally(Category::PERIPHERALS).failed, DEFAULT_RULES.len());
        Ok(())
    }

    #[test]
    fn empty_sysfs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let report = Tuner::new(&Sysfs::new(dir.path())).run(&mut SysfsWriter);
        assert_eq!(report.len(), DEFAULT_RULES.len());
        assert_eq!(report.succeeded(), 0);
        Ok(())
    }

    #[test]
    fn only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        cores(dir.path(), &["cpu0"])?;
        let tuner = Tuner::new(&Sysfs::new(dir.path()))
            .governor("ondemand")
            .frequency("1200000")
            .only(Category::GOVERNOR | Category::GPU);

        let mut w = RecordingWriter::default();
        let report = tuner.run(&mut w);
        assert_eq!(report.len(), 2);
        assert_eq!(w.writes[0].1, "ondemand");
        assert!(w.writes[1]
            .0
            .as_path()
            .ends_with("class/drm/card0/power/control"));
        Ok(())
    }

    #[test]
    fn from_config() -> Result<()> {
        let dir = tempfile::tempdir()?;
        cores(dir.path(), &["cpu0"])?;
        let config = Config {
            sysfs_root: dir.path().to_path_buf(),
            frequency: "600000".into(),
            categories: vec!["frequency".into()],
            ..Config::default()
        };

        let report = Tuner::from_config(&config).run(&mut DryRunWriter);
        assert_eq!(report.len(), 2);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.attempts()[1].value, "600000");
        Ok(())
    }

    #[test]
    fn unknown_category_narrows() -> Result<()> {
        let dir = tempfile::tempdir()?;
        cores(dir.path(), &["cpu0"])?;
        let config = Config {
            sysfs_root: dir.path().to_path_buf(),
            categories: vec!["cpu".into(), "flopy".into()],
            ..Config::default()
        };

        let mut w = RecordingWriter::default();
        let report = Tuner::from_config(&config).run(&mut w);
        assert_eq!(report.len(), 3);
        assert_eq!(report.tally(Category::PERIPHERALS), Default::default());
        assert!(w
            .writes
            .iter()
            .all(|(p, _)| p.as_path().starts_with(dir.path().join(CPU_PATH))));

        let config = Config {
            categories: vec!["flopy".into()],
            ..config
        };
        let report = Tuner::from_config(&config).run(&mut DryRunWriter);
        assert!(report.is_empty());
        Ok(())
    }
}

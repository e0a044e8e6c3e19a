//! Reading back what a pass wrote
//!
//! Nothing in the write path ever reads an attribute back. This is the
//! separate, explicitly invoked, check.
//!
//! # Note
//!
//! Not every attribute reads back what was written. `scaling_setspeed`
//! reads `<unsupported>` unless the `userspace` governor is active, and
//! `scaling_cur_freq` is whatever the hardware settled on, which may be a
//! nearby frequency.
use crate::{
    report::Category,
    sysfs::ControlPath,
    system::{cpu::Cpus, peripherals::Rule},
    util::read_attribute,
};
use std::io;
use tracing::{info, warn};

/// How one attribute compares to what was expected.
#[derive(Debug)]
pub enum Status {
    Match,

    /// Read back something else.
    Mismatch(String),

    /// Couldn't be read at all.
    Unreadable(io::Error),
}

/// One attribute that was checked
#[derive(Debug)]
pub struct Check {
    pub category: Category,
    pub path: ControlPath,
    pub expected: String,
    pub status: Status,
}

impl Check {
    fn new(category: Category, path: ControlPath, expected: &str) -> Self {
        let status = match read_attribute(path.as_path()) {
            Ok(actual) if actual == expected => Status::Match,
            Ok(actual) => Status::Mismatch(actual),
            Err(e) => Status::Unreadable(e),
        };
        match &status {
            Status::Match => info!("{path} is '{expected}'"),
            Status::Mismatch(actual) => warn!("{path} is '{actual}', expected '{expected}'"),
            Status::Unreadable(e) => warn!("Failed to read {path}: {e}"),
        }
        Self {
            category,
            path,
            expected: expected.to_owned(),
            status,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self.status, Status::Match)
    }
}

/// Read back every rule.
pub fn rules(rules: &[Rule]) -> Vec<Check> {
    rules
        .iter()
        .map(|r| Check::new(r.category, r.path.clone(), &r.value))
        .collect()
}

/// Read back every core's `scaling_governor`.
pub fn governor(cpus: &Cpus, governor: &str) -> Vec<Check> {
    cpus.ids()
        .iter()
        .map(|cpu| {
            Check::new(
                Category::GOVERNOR,
                cpus.cpufreq(cpu, "scaling_governor"),
                governor,
            )
        })
        .collect()
}

/// Read back every core's `scaling_cur_freq`.
pub fn frequency(cpus: &Cpus, khz: &str) -> Vec<Check> {
    cpus.ids()
        .iter()
        .map(|cpu| Check::new(Category::FREQUENCY, cpus.cpufreq(cpu, "scaling_cur_freq"), khz))
        .collect()
}

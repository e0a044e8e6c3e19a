//! CPU frequency scaling
//!
//! # Implementation
//!
//! This uses the cpufreq sysfs interface, documented [here][1], under
//! `/sys/devices/system/cpu/cpu<N>/cpufreq`.
//!
//! Which attributes exist depends on the scaling driver. `scaling_setspeed`
//! in particular only does anything while the `userspace` governor is
//! active, and only accepts one of `scaling_available_frequencies`.
//! Nothing here checks either, that's the callers problem.
//!
//! [1]: https://www.kernel.org/doc/html/latest/admin-guide/pm/cpufreq.html
use crate::{
    report::{Category, Report},
    sysfs::{ControlPath, ControlWriter, Sysfs},
    util::{is_indexed, read_attribute},
};
use std::{fmt, fs, io, path::PathBuf};
use tracing::{debug, error, info};

/// Location of the CPU devices, relative to the sysfs root.
pub const CPU_PATH: &str = "devices/system/cpu";

/// Frequency written by default, in kHz. Despite the name of the attribute
/// it's kHz, not Hz.
pub const DEFAULT_FREQUENCY: &str = "800000";

/// Kernel name of one CPU core, ie `cpu0`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CpuId(String);

impl CpuId {
    /// Returns [`None`] unless `name` is `cpu` followed by a digit.
    ///
    /// `cpufreq` and `cpuidle` live next to the cores and are not cores.
    pub fn new(name: &str) -> Option<Self> {
        is_indexed(name, "cpu").then(|| Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scaling governors commonly built into the kernel.
///
/// Any other name can still be passed to [`Cpus::set_governor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Governor {
    /// Frequency is whatever was last written to `scaling_setspeed`.
    ///
    /// Required for [`Cpus::set_frequency`].
    Userspace,

    /// Lowest frequency, or with `intel_pstate`, adaptive and power biased.
    Powersave,

    /// Scales with load, jumps straight to the top.
    Ondemand,

    /// Scales with load, gradually.
    Conservative,

    /// Highest frequency.
    Performance,

    /// Driven by the scheduler's utilization data.
    Schedutil,
}

const GOVERNORS: &[Governor] = &[
    Governor::Userspace,
    Governor::Powersave,
    Governor::Ondemand,
    Governor::Conservative,
    Governor::Performance,
    Governor::Schedutil,
];

impl Governor {
    pub fn from_name(name: &str) -> Option<Self> {
        GOVERNORS.iter().copied().find(|g| g.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Userspace => "userspace",
            Self::Powersave => "powersave",
            Self::Ondemand => "ondemand",
            Self::Conservative => "conservative",
            Self::Performance => "performance",
            Self::Schedutil => "schedutil",
        }
    }
}

impl fmt::Display for Governor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The CPU cores of a system.
#[derive(Debug, Clone)]
pub struct Cpus {
    root: PathBuf,
}

// Public
impl Cpus {
    pub fn new(sysfs: &Sysfs) -> Self {
        Self {
            root: sysfs.join(CPU_PATH),
        }
    }

    /// Every CPU core, in whatever order the directory listing has them.
    ///
    /// If the CPU directory can't be read this is logged and nothing is
    /// returned, it's not an error.
    pub fn ids(&self) -> Vec<CpuId> {
        let dir = match fs::read_dir(&self.root) {
            Ok(d) => d,
            Err(e) => {
                error!("Failed to open {}: {e}", self.root.display());
                return Vec::new();
            }
        };
        let mut ids = Vec::new();
        for entry in dir {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Skipping unreadable entry in {}: {e}", self.root.display());
                    continue;
                }
            };
            if let Some(id) = entry.file_name().to_str().and_then(CpuId::new) {
                ids.push(id);
            }
        }
        ids
    }

    /// Write `governor` to every core's `scaling_governor`.
    ///
    /// Every core is attempted even if an earlier one failed, and nothing is
    /// undone.
    pub fn set_governor<W: ControlWriter + ?Sized>(
        &self,
        writer: &mut W,
        governor: &str,
    ) -> Report {
        info!("Setting CPU governor to '{governor}'...");
        let mut report = Report::new();
        for cpu in self.ids() {
            report.attempt(
                &mut *writer,
                Category::GOVERNOR,
                self.cpufreq(&cpu, "scaling_governor"),
                governor,
            );
        }
        report
    }

    /// Switch every core to the [`Governor::Userspace`] governor, then write
    /// `khz` to every core's `scaling_setspeed`.
    ///
    /// The frequencies are attempted even if switching governor failed.
    pub fn set_frequency<W: ControlWriter + ?Sized>(
        &self,
        writer: &mut W,
        khz: &str,
    ) -> Report {
        info!("Setting CPU frequency to {khz} kHz...");
        let mut report = self.set_governor(&mut *writer, Governor::Userspace.as_str());
        for cpu in self.ids() {
            report.attempt(
                &mut *writer,
                Category::FREQUENCY,
                self.cpufreq(&cpu, "scaling_setspeed"),
                khz,
            );
        }
        report
    }

    /// Check `cpu0`'s `scaling_available_frequencies` can be opened, with an
    /// empty write.
    pub fn probe_available_frequencies<W: ControlWriter + ?Sized>(
        &self,
        writer: &mut W,
    ) -> Report {
        let mut report = Report::new();
        report.attempt(
            writer,
            Category::FREQUENCY,
            ControlPath::new_unchecked(
                self.root.join("cpu0/cpufreq/scaling_available_frequencies"),
            ),
            "",
        );
        report
    }

    /// Frequencies `cpu` accepts in `scaling_setspeed`, in kHz.
    ///
    /// # Errors
    ///
    /// - If the attribute doesn't exist, which it won't for many drivers
    /// - If it isn't a list of numbers
    pub fn available_frequencies(&self, cpu: &CpuId) -> io::Result<Vec<u64>> {
        read_attribute(self.cpufreq(cpu, "scaling_available_frequencies").as_path())?
            .split_whitespace()
            .map(|f| f.parse::<u64>().map_err(|_| io::Error::from(io::ErrorKind::InvalidInput)))
            .collect()
    }

    /// Governors `cpu` accepts in `scaling_governor`
    pub fn available_governors(&self, cpu: &CpuId) -> io::Result<Vec<String>> {
        Ok(
            read_attribute(self.cpufreq(cpu, "scaling_available_governors").as_path())?
                .split_whitespace()
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Current governor of `cpu`
    pub fn governor(&self, cpu: &CpuId) -> io::Result<String> {
        read_attribute(self.cpufreq(cpu, "scaling_governor").as_path())
    }

    /// Current frequency of `cpu`, in kHz, as the kernel last set it.
    pub fn current_frequency(&self, cpu: &CpuId) -> io::Result<u64> {
        read_attribute(self.cpufreq(cpu, "scaling_cur_freq").as_path())?
            .parse()
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))
    }
}

// Private
impl Cpus {
    /// `<root>/<cpu>/cpufreq/<attr>`
    pub(crate) fn cpufreq(&self, cpu: &CpuId, attr: &str) -> ControlPath {
        ControlPath::new_unchecked(self.root.join(cpu.as_str()).join("cpufreq").join(attr))
    }
}

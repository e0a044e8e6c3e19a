//! Outcomes of a configuration pass
//!
//! Nothing in this crate fails a pass because an attribute couldn't be
//! written. Every attempt is instead recorded here, so callers can count
//! failures per [`Category`] without parsing the log.
use crate::sysfs::{ControlPath, ControlWriter, WriteOutcome};
use crate::error::WriteError;
use bitflags::bitflags;
use std::fmt;
use tracing::info;

bitflags! {
    /// What an attribute write is for.
    pub struct Category: u32 {
        /// CPU `scaling_governor`
        const GOVERNOR = 1;

        /// CPU `scaling_setspeed`
        const FREQUENCY = 1 << 1;

        /// USB `power/control`
        const USB = 1 << 2;

        /// Bluetooth rfkill `state`
        const BLUETOOTH = 1 << 3;

        /// Wireless interface `power/control`
        const WIFI = 1 << 4;

        /// Audio driver `power_save` module parameter
        const AUDIO = 1 << 5;

        /// Block device `queue/rotational`
        const STORAGE = 1 << 6;

        /// DRM card `power/control`
        const GPU = 1 << 7;

        /// Wired interface `power/control`
        const ETHERNET = 1 << 8;

        const CPU = Self::GOVERNOR.bits | Self::FREQUENCY.bits;

        const PERIPHERALS = Self::USB.bits
            | Self::BLUETOOTH.bits
            | Self::WIFI.bits
            | Self::AUDIO.bits
            | Self::STORAGE.bits
            | Self::GPU.bits
            | Self::ETHERNET.bits;
    }
}

const NAMES: &[(Category, &str)] = &[
    (Category::GOVERNOR, "governor"),
    (Category::FREQUENCY, "frequency"),
    (Category::USB, "usb"),
    (Category::BLUETOOTH, "bluetooth"),
    (Category::WIFI, "wifi"),
    (Category::AUDIO, "audio"),
    (Category::STORAGE, "storage"),
    (Category::GPU, "gpu"),
    (Category::ETHERNET, "ethernet"),
];

impl Category {
    /// Parse a category name, case insensitive.
    ///
    /// Besides one name per flag, `cpu`, `peripherals` and `all` are
    /// accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "cpu" => Some(Self::CPU),
            "peripherals" => Some(Self::PERIPHERALS),
            "all" => Some(Self::all()),
            _ => NAMES.iter().find(|(_, n)| *n == name).map(|(c, _)| *c),
        }
    }

    /// Every single flag set in `self`, in declaration order.
    pub fn flags(self) -> impl Iterator<Item = Category> {
        NAMES
            .iter()
            .map(|(c, _)| *c)
            .filter(move |c| self.contains(*c))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (c, name) in NAMES {
            if self.contains(*c) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// A single attribute write, and how it went.
#[derive(Debug)]
pub struct Attempt {
    pub category: Category,
    pub path: ControlPath,
    pub value: String,
    pub outcome: WriteOutcome,
}

/// Successes and failures for some [`Category`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub succeeded: usize,
    pub failed: usize,
}

/// Every [`Attempt`] made during a pass, in order.
#[derive(Debug, Default)]
pub struct Report {
    attempts: Vec<Attempt>,
}

// Public
impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `value` to `path` through `writer`, and record the outcome.
    pub fn attempt<W: ControlWriter + ?Sized>(
        &mut self,
        writer: &mut W,
        category: Category,
        path: ControlPath,
        value: &str,
    ) {
        let outcome = writer.write(&path, value);
        self.attempts.push(Attempt {
            category,
            path,
            value: value.to_owned(),
            outcome,
        });
    }

    /// Move every attempt in `other` to the end of `self`
    pub fn append(&mut self, mut other: Report) {
        self.attempts.append(&mut other.attempts);
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.attempts.iter().filter(|a| a.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Every error, in order.
    pub fn failures(&self) -> impl Iterator<Item = &WriteError> {
        self.attempts.iter().filter_map(|a| a.outcome.as_ref().err())
    }

    /// Count attempts in any of `category`
    pub fn tally(&self, category: Category) -> Tally {
        self.attempts
            .iter()
            .filter(|a| category.intersects(a.category))
            .fold(Tally::default(), |mut t, a| {
                if a.outcome.is_ok() {
                    t.succeeded += 1;
                } else {
                    t.failed += 1;
                }
                t
            })
    }

    /// Log one line per category that saw any attempts.
    pub fn log_summary(&self) {
        for category in Category::all().flags() {
            let tally = self.tally(category);
            if tally.succeeded + tally.failed == 0 {
                continue;
            }
            info!(
                %category,
                succeeded = tally.succeeded,
                failed = tally.failed,
                "{category}: {} of {} written",
                tally.succeeded,
                tally.succeeded + tally.failed
            );
        }
    }
}

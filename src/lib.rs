//! One-shot power management tuning for embedded Linux
//!
//! Writes fixed values into kernel control files, to pick a CPU frequency
//! governor and speed, and to let USB, Bluetooth, WiFi, audio, storage, GPU
//! and ethernet devices power down when idle.
//!
//! # Implementation details
//!
//! Everything goes through files in `/sys`, so this library requires it to
//! exist. Most of these interfaces are only loosely documented, some depend on
//! the driver, and some change meaning between kernel versions.
//!
//! Configuration is best effort. A missing or read-only attribute is logged
//! and recorded in a [`Report`][report::Report], and never stops the rest of
//! a pass. Nothing is read back unless explicitly asked, see [`verify`].
//!
//! # Example
//!
//! ```rust,no_run
//! use linpower::{sysfs::{Sysfs, SysfsWriter}, tune::Tuner};
//!
//! let report = Tuner::new(&Sysfs::default()).run(&mut SysfsWriter);
//! println!("{} of {} writes succeeded", report.succeeded(), report.len());
//! ```
#![doc(html_root_url = "https://docs.rs/linpower/0.1.0")]

pub mod config;
pub mod error;
pub mod report;
pub mod sysfs;
pub mod system;
pub mod tune;
pub mod verify;

mod util;

//! This module provides ways to tune the power management of a running Linux
//! system
use nix::{sys::utsname::uname, unistd::geteuid};

pub mod cpu;
pub mod peripherals;

/// Release of the running kernel, ie `6.1.0-rpi7-rpi-v8`.
///
/// Many of the attributes written by this crate changed meaning, or
/// appeared, between kernel versions, so this is worth logging.
///
/// Returns [`None`] if `uname` failed.
pub fn kernel_release() -> Option<String> {
    uname()
        .ok()
        .map(|u| u.release().to_string_lossy().into_owned())
}

/// Whether we're running as root.
///
/// Almost every sysfs control attribute is only writable by root.
pub fn is_root() -> bool {
    geteuid().is_root()
}

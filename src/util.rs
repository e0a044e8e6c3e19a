//! Utility functions
use std::{fs, io, path::Path};

/// Technically Linux requires sysfs to be at `/sys`, calling it a system
/// configuration error otherwise.
///
/// Use [`Sysfs`][crate::sysfs::Sysfs] to point somewhere else.
pub const SYSFS_PATH: &str = "/sys";

/// Read a sysfs attribute, without the trailing newline.
pub fn read_attribute(path: &Path) -> io::Result<String> {
    fs::read_to_string(path).map(|s| s.trim().to_owned())
}

/// Whether `name` is `prefix` immediately followed by an ASCII digit.
///
/// This is how the kernel names indexed devices, `cpu0`, `usb3`, `card1`.
pub fn is_indexed(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.bytes().next())
        .map_or(false, |b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed() {
        assert!(is_indexed("cpu0", "cpu"));
        assert!(is_indexed("cpu23", "cpu"));
        assert!(is_indexed("card0", "card"));
        assert!(!is_indexed("cpu", "cpu"));
        assert!(!is_indexed("cpufreq", "cpu"));
        assert!(!is_indexed("cpuidle", "cpu"));
        assert!(is_indexed("card0-DP-1", "card"), "connectors are filtered elsewhere");
        assert!(!is_indexed("xcpu0", "cpu"));
    }
}

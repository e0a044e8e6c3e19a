//! Writing values to sysfs attributes
use super::{ControlPath, ControlWriter, WriteOutcome};
use crate::error::WriteError;
use rustix::{
    fs::{open, Mode, OFlags},
    io::write,
};
use std::io;
use tracing::{info, warn};

/// Write `value` to the attribute at `path`, in one go.
///
/// The attribute is opened write only, never created. The descriptor is
/// closed on every path out of this function.
///
/// An empty `value` is a legal zero byte write, which is handy for checking
/// an attribute can be opened at all.
///
/// # Errors
///
/// - [`WriteError::OpenFailed`] if the attribute is missing, not writable, or
///   you don't have permission.
/// - [`WriteError::WriteFailed`] if the kernel rejected the value, or took
///   less than all of it.
pub fn write_attribute(path: &ControlPath, value: &str) -> WriteOutcome {
    let fd = open(path.as_path(), OFlags::WRONLY | OFlags::CLOEXEC, Mode::empty()).map_err(
        |e| WriteError::OpenFailed {
            path: path.clone(),
            source: e.into(),
        },
    )?;
    let bytes = value.as_bytes();
    let written = write(&fd, bytes).map_err(|e| WriteError::WriteFailed {
        path: path.clone(),
        value: value.to_owned(),
        source: e.into(),
    })?;
    if written != bytes.len() {
        return Err(WriteError::WriteFailed {
            path: path.clone(),
            value: value.to_owned(),
            source: io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write, {written} of {} bytes", bytes.len()),
            ),
        });
    }
    Ok(())
}

/// The real [`ControlWriter`].
///
/// Logs one line per attempt, a warning if it failed.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysfsWriter;

impl ControlWriter for SysfsWriter {
    fn write(&mut self, path: &ControlPath, value: &str) -> WriteOutcome {
        let outcome = write_attribute(path, value);
        match &outcome {
            Ok(()) => info!("Successfully wrote '{value}' to {path}"),
            Err(e) => warn!("{e}"),
        }
        outcome
    }
}

/// A [`ControlWriter`] that only logs what would have been written.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunWriter;

impl ControlWriter for DryRunWriter {
    fn write(&mut self, path: &ControlPath, value: &str) -> WriteOutcome {
        info!("Would write '{value}' to {path}");
        Ok(())
    }
}

/// Records every write, in order, then really does it.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingWriter {
    pub writes: Vec<(ControlPath, String)>,
}

#[cfg(test)]
impl ControlWriter for RecordingWriter {
    fn write(&mut self, path: &ControlPath, value: &str) -> WriteOutcome {
        self.writes.push((path.clone(), value.to_owned()));
        write_attribute(path, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::Sysfs;
    use std::fs;

    type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

    #[test]
    fn missing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sysfs = Sysfs::new(dir.path());
        let path = sysfs.attribute("class/net/wlan0/power/control");

        let e = SysfsWriter.write(&path, "auto").unwrap_err();
        assert!(matches!(e, WriteError::OpenFailed { .. }));
        assert_eq!(e.path(), &path);
        assert_eq!(e.io().kind(), io::ErrorKind::NotFound);
        assert!(!path.as_path().exists(), "writes must never create");
        Ok(())
    }

    #[test]
    fn directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = ControlPath::new(dir.path())?;

        let e = write_attribute(&path, "1").unwrap_err();
        assert!(matches!(e, WriteError::OpenFailed { .. }));
        Ok(())
    }

    #[test]
    fn rejected() -> Result<()> {
        // Opens fine, every write fails with ENOSPC.
        let path = ControlPath::new("/dev/full")?;

        let e = SysfsWriter.write(&path, "auto").unwrap_err();
        assert!(matches!(&e, WriteError::WriteFailed { value, .. } if value == "auto"));
        assert_eq!(e.path(), &path);
        assert_eq!(e.io().raw_os_error(), Some(rustix::io::Errno::NOSPC.raw_os_error()));
        Ok(())
    }

    #[test]
    fn writes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sysfs = Sysfs::new(dir.path());
        let path = sysfs.attribute("power_save");
        fs::write(&path, "")?;

        SysfsWriter.write(&path, "1")?;
        assert_eq!(fs::read_to_string(&path)?, "1");
        Ok(())
    }

    #[test]
    fn empty_value() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sysfs = Sysfs::new(dir.path());
        let path = sysfs.attribute("scaling_available_frequencies");
        fs::write(&path, "800000 1200000\n")?;

        write_attribute(&path, "")?;
        // Opened write only, not truncated.
        assert_eq!(fs::read_to_string(&path)?, "800000 1200000\n");
        Ok(())
    }

    #[test]
    fn dry_run() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = Sysfs::new(dir.path()).attribute("missing");
        DryRunWriter.write(&path, "auto")?;
        assert!(!path.as_path().exists());
        Ok(())
    }
}

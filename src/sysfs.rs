//! An interface to the writable control attributes of the Linux `/sys`
//! filesystem, or sysfs.
//!
//! # Implementation Details
//!
//! This is the userspace interface to low-level kernel details, and is subject
//! to change between kernel versions.
//!
//! Every attribute is plain ASCII text. Writing one is a single `write(2)` to
//! a freshly opened descriptor, there is no framing and no read-back.
//!
//! # Stability
//!
//! Linux has 3 ideas of stability for sysfs, documented [here][1]
//!
//! Most of the power management attributes touched by this crate are
//! 'Testing', and some are entirely driver specific, so expect any given one
//! to be missing on any given machine.
//!
//! [1]: https://www.kernel.org/doc/Documentation/ABI/README
use crate::{error::ConfigError, error::WriteError, util::SYSFS_PATH};
use std::{
    fmt,
    path::{Path, PathBuf},
};

pub mod writer;

pub use writer::{DryRunWriter, SysfsWriter};

/// Result of one attribute write.
pub type WriteOutcome = Result<(), WriteError>;

/// Path to a single writable sysfs attribute.
///
/// The only thing checked is that it isn't empty, whether it exists is only
/// known once it's written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlPath(PathBuf);

impl ControlPath {
    /// Create a new [`ControlPath`]
    ///
    /// # Errors
    ///
    /// - If `path` is empty
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self, ConfigError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath);
        }
        Ok(Self(path))
    }

    /// Create a new [`ControlPath`] from `path`, which must not be empty.
    pub(crate) fn new_unchecked(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for ControlPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ControlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Something that can commit a value to a [`ControlPath`].
///
/// [`SysfsWriter`] is the real thing, [`DryRunWriter`] only says what it
/// would have done.
pub trait ControlWriter {
    /// Write `value` to `path`.
    ///
    /// Implementations must never panic on a missing or read-only attribute,
    /// that is reported through the returned [`WriteOutcome`].
    fn write(&mut self, path: &ControlPath, value: &str) -> WriteOutcome;
}

impl<W: ControlWriter + ?Sized> ControlWriter for &mut W {
    fn write(&mut self, path: &ControlPath, value: &str) -> WriteOutcome {
        (**self).write(path, value)
    }
}

/// Where sysfs is mounted.
///
/// Technically Linux requires sysfs to be at `/sys`, but everything here is
/// relative to a [`Sysfs`] root so it can be pointed at a fake tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sysfs {
    root: PathBuf,
}

impl Sysfs {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` against the root.
    ///
    /// Absolute paths are returned unchanged.
    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.root.join(path)
    }

    /// [`Sysfs::join`], as a [`ControlPath`]
    pub fn attribute<P: AsRef<Path>>(&self, path: P) -> ControlPath {
        ControlPath::new_unchecked(self.join(path))
    }
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new(SYSFS_PATH)
    }
}

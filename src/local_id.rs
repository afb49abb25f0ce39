//! Local ids for DCE Security (version 2) UUIDs.

use crate::Result;
#[cfg(not(unix))]
use crate::Error;

/// Supplies the POSIX user and group ids embedded by the DCE Security generator.
pub trait LocalIdSource: Send + Sync {
    fn user_id(&self) -> Result<u32>;
    fn group_id(&self) -> Result<u32>;
}

/// Ids of the current process as reported by the operating system.
///
/// Returns [`Error::PlatformNotSupported`](crate::Error::PlatformNotSupported) outside of Unix.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemLocalIds;

#[cfg(unix)]
impl LocalIdSource for SystemLocalIds {
    fn user_id(&self) -> Result<u32> {
        // SAFETY: getuid() takes no arguments and cannot fail.
        Ok(unsafe { libc::getuid() })
    }

    fn group_id(&self) -> Result<u32> {
        // SAFETY: getgid() takes no arguments and cannot fail.
        Ok(unsafe { libc::getgid() })
    }
}

#[cfg(not(unix))]
impl LocalIdSource for SystemLocalIds {
    fn user_id(&self) -> Result<u32> {
        Err(Error::PlatformNotSupported)
    }

    fn group_id(&self) -> Result<u32> {
        Err(Error::PlatformNotSupported)
    }
}

/// Fixed ids, mostly useful in tests.
#[derive(Copy, Clone, Debug)]
pub struct FixedLocalIds {
    pub user_id: u32,
    pub group_id: u32,
}

impl LocalIdSource for FixedLocalIds {
    fn user_id(&self) -> Result<u32> {
        Ok(self.user_id)
    }

    fn group_id(&self) -> Result<u32> {
        Ok(self.group_id)
    }
}

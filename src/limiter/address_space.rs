//! Scoped soft address-space limit (`RLIMIT_AS`)
//!
//! Allocation failure aborts a Rust process, so this ceiling is a last line
//! of defence behind the watchdog's RSS polling and is opt-in.

use std::io;

#[cfg(unix)]
pub struct AddressSpaceGuard {
    previous: libc::rlimit,
}

#[cfg(unix)]
impl AddressSpaceGuard {
    /// Lower the soft limit to `limit` bytes for the guard's lifetime.
    ///
    /// Returns `Ok(None)` when the current limits already fit: the soft
    /// limit is only changed when it is unlimited (and `limit` respects the
    /// hard limit) or when `limit` is below it.
    pub fn lower(limit: u64) -> io::Result<Option<Self>> {
        let current = current_limit()?;
        let limit = limit as libc::rlim_t;

        let soft_unlimited = current.rlim_cur == libc::RLIM_INFINITY;
        let hard_unlimited = current.rlim_max == libc::RLIM_INFINITY;
        let applies = (soft_unlimited && (hard_unlimited || limit <= current.rlim_max))
            || (!soft_unlimited && limit < current.rlim_cur);
        if !applies {
            return Ok(None);
        }

        let lowered = libc::rlimit {
            rlim_cur: limit,
            rlim_max: current.rlim_max,
        };
        // SAFETY: `lowered` is a valid rlimit that outlives the call.
        if unsafe { libc::setrlimit(libc::RLIMIT_AS, &lowered) } != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Some(Self { previous: current }))
    }

    /// Soft limit that will be restored on drop
    pub fn previous_soft(&self) -> u64 {
        self.previous.rlim_cur as u64
    }
}

#[cfg(unix)]
impl Drop for AddressSpaceGuard {
    fn drop(&mut self) {
        // SAFETY: `previous` was read by getrlimit and is a valid rlimit.
        if unsafe { libc::setrlimit(libc::RLIMIT_AS, &self.previous) } != 0 {
            log::warn!(
                "failed to restore address-space limit: {}",
                io::Error::last_os_error()
            );
        }
    }
}

/// Current soft and hard `RLIMIT_AS`
#[cfg(unix)]
pub fn current_limit() -> io::Result<libc::rlimit> {
    let mut current = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `current` is a valid, writable rlimit.
    if unsafe { libc::getrlimit(libc::RLIMIT_AS, &mut current) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(current)
}

#[cfg(not(unix))]
pub struct AddressSpaceGuard;

#[cfg(not(unix))]
impl AddressSpaceGuard {
    /// Address-space limits are unavailable on this platform
    pub fn lower(_limit: u64) -> io::Result<Option<Self>> {
        Ok(None)
    }

    pub fn previous_soft(&self) -> u64 {
        u64::MAX
    }
}

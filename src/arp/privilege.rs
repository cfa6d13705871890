//! Raw-socket privilege management.
//!
//! A process that is not root can still open ARP sockets when `CAP_NET_RAW`
//! is in its permitted capability set (for example after
//! `setcap cap_net_raw+p`). [`PrivilegeGuard::raise_net_raw`] copies the
//! current capability set, turns on the effective `CAP_NET_RAW` bit and
//! applies the copy. [`PrivilegeGuard::restore`] puts the original set back.
//!
//! Linux keeps capabilities per thread, and `capset` only changes the calling
//! thread. The guard therefore cannot leave the thread that raised it, and
//! callers normally go through [`with_net_raw`], which raises, runs a
//! synchronous closure and restores without yielding.

use crate::error::{LookupError, LookupResult};
use std::io;
use std::marker::PhantomData;
use tracing::{debug, warn};

const LINUX_CAPABILITY_VERSION_3: u32 = 0x2008_0522;
const CAPABILITY_WORDS: usize = 2;

/// Capability number of `CAP_NET_RAW`.
pub const CAP_NET_RAW: u32 = 13;

#[repr(C)]
struct CapHeader {
    version: u32,
    pid: libc::c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CapData {
    effective: u32,
    permitted: u32,
    inheritable: u32,
}

/// Check if running with root privileges.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// A snapshot of the calling thread's capability sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
    data: [CapData; CAPABILITY_WORDS],
}

impl CapabilitySet {
    /// Read the current capability sets.
    pub fn current() -> LookupResult<Self> {
        let mut header = CapHeader {
            version: LINUX_CAPABILITY_VERSION_3,
            pid: 0,
        };
        let mut data = [CapData::default(); CAPABILITY_WORDS];

        let rc = unsafe {
            libc::syscall(
                libc::SYS_capget,
                &mut header as *mut CapHeader,
                data.as_mut_ptr(),
            )
        };
        if rc != 0 {
            return Err(LookupError::Capability(format!(
                "failed to read process capabilities: {}",
                io::Error::last_os_error()
            )));
        }

        Ok(Self { data })
    }

    /// Apply these capability sets to the calling thread.
    pub fn apply(&self) -> LookupResult<()> {
        let mut header = CapHeader {
            version: LINUX_CAPABILITY_VERSION_3,
            pid: 0,
        };

        let rc = unsafe {
            libc::syscall(
                libc::SYS_capset,
                &mut header as *mut CapHeader,
                self.data.as_ptr(),
            )
        };
        if rc != 0 {
            return Err(LookupError::Capability(format!(
                "unable to set capabilities: {}",
                io::Error::last_os_error()
            )));
        }

        Ok(())
    }

    fn slot(cap: u32) -> (usize, u32) {
        ((cap / 32) as usize, 1 << (cap % 32))
    }

    /// Whether `cap` is in the permitted set.
    pub fn is_permitted(&self, cap: u32) -> bool {
        let (word, bit) = Self::slot(cap);
        self.data[word].permitted & bit != 0
    }

    /// Whether `cap` is in the effective set.
    pub fn is_effective(&self, cap: u32) -> bool {
        let (word, bit) = Self::slot(cap);
        self.data[word].effective & bit != 0
    }

    /// A copy of this set with `cap` raised in the effective set.
    pub fn with_effective(mut self, cap: u32) -> Self {
        let (word, bit) = Self::slot(cap);
        self.data[word].effective |= bit;
        self
    }
}

/// Run `f` with `CAP_NET_RAW` effective on the calling thread.
///
/// The thread's capability sets are restored before this returns. When the
/// capability is already effective (root, usually) `f` runs unchanged. Fails
/// with [`LookupError::Capability`] when the capability is not permitted.
pub fn with_net_raw<T>(f: impl FnOnce() -> LookupResult<T>) -> LookupResult<T> {
    if CapabilitySet::current()?.is_effective(CAP_NET_RAW) {
        return f();
    }

    let guard = PrivilegeGuard::raise_net_raw()?;
    let result = f();
    let restored = guard.restore();
    let value = result?;
    restored?;
    Ok(value)
}

/// Holds `CAP_NET_RAW` raised on the calling thread until restored or dropped.
///
/// Not `Send`: restoring on another thread would leave the raising thread
/// privileged.
#[derive(Debug)]
pub struct PrivilegeGuard {
    original: CapabilitySet,
    restored: bool,
    _thread: PhantomData<*const ()>,
}

impl PrivilegeGuard {
    /// Raise `CAP_NET_RAW` in the calling thread's effective set.
    ///
    /// Fails with [`LookupError::Capability`] when the permitted set lacks
    /// the capability. On failure the thread's capabilities are unchanged.
    pub fn raise_net_raw() -> LookupResult<Self> {
        let original = CapabilitySet::current()?;

        if !original.is_permitted(CAP_NET_RAW) {
            return Err(LookupError::Capability(
                "insufficient privilege to bind to a raw socket: CAP_NET_RAW is not permitted"
                    .to_string(),
            ));
        }

        original.with_effective(CAP_NET_RAW).apply()?;
        debug!("raised CAP_NET_RAW");

        Ok(Self {
            original,
            restored: false,
            _thread: PhantomData,
        })
    }

    /// Put the original capability sets back.
    pub fn restore(mut self) -> LookupResult<()> {
        self.restored = true;
        self.original.apply()?;
        debug!("restored original capabilities");
        Ok(())
    }
}

impl Drop for PrivilegeGuard {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = self.original.apply() {
            warn!(error = %e, "failed to restore capabilities");
        }
    }
}

//! Memory protection for private key material
//!
//! Two hardening measures:
//!
//! 1. **Core dump prevention**: `setrlimit(RLIMIT_CORE, 0)` so a crash never
//!    writes a decrypted passphrase or scalar to disk.
//!
//! 2. **Locked scalars**: [`SecretScalar`] keeps the 32 bytes of a private
//!    key in an `mlock`ed heap allocation that is zeroized on drop.
//!
//! The kernel does not count nested `mlock` calls, and small allocations
//! share pages. Locks are therefore tracked per page and a page is only
//! unlocked once no live secret remains on it.
//!
//! Both are best-effort: failures are logged, never fatal.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use zeroize::Zeroize;

static CORE_DUMPS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Page address -> number of live secrets on that page.
static LOCKED_PAGES: Mutex<BTreeMap<usize, usize>> = Mutex::new(BTreeMap::new());

/// Disable core dumps for the current process.
///
/// Call early in application startup. Returns `true` if core dumps are off.
///
/// # Example
/// ```
/// blocksign_core::memory::disable_core_dumps();
/// ```
pub fn disable_core_dumps() -> bool {
    if CORE_DUMPS_DISABLED.load(Ordering::SeqCst) {
        return true;
    }

    #[cfg(unix)]
    let disabled = unix::disable_core_dumps_impl();

    #[cfg(not(unix))]
    let disabled = {
        log::warn!("core dump prevention not supported on this platform");
        false
    };

    if disabled {
        CORE_DUMPS_DISABLED.store(true, Ordering::SeqCst);
    }
    disabled
}

/// A 32-byte secp256k1 scalar held in locked, self-clearing memory.
///
/// The bytes live in their own heap allocation so the address handed to
/// `mlock` stays stable when the owner moves.
pub struct SecretScalar {
    bytes: Box<[u8; 32]>,
    locked: bool,
}

impl SecretScalar {
    /// Copy `bytes` into a fresh locked allocation.
    ///
    /// The caller remains responsible for clearing its own copy.
    pub fn new(bytes: &[u8; 32]) -> Self {
        let boxed = Box::new(*bytes);
        let locked = unsafe { lock_region(boxed.as_ptr(), boxed.len()) };
        if !locked {
            log::debug!("failed to mlock private scalar, it may be swappable");
        }
        Self {
            bytes: boxed,
            locked,
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Whether the backing pages are actually locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for SecretScalar {
    fn drop(&mut self) {
        self.bytes.zeroize();
        if self.locked {
            unsafe {
                unlock_region(self.bytes.as_ptr(), self.bytes.len());
            }
        }
    }
}

impl fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretScalar(<redacted>)")
    }
}

fn page_size() -> usize {
    #[cfg(unix)]
    {
        unix::page_size()
    }

    #[cfg(not(unix))]
    {
        4096
    }
}

/// Start addresses of every page touched by `[ptr, ptr + len)`.
fn pages_of(ptr: *const u8, len: usize) -> Vec<usize> {
    let page = page_size();
    let first = (ptr as usize) & !(page - 1);
    let last = (ptr as usize + len.max(1) - 1) & !(page - 1);
    (first..=last).step_by(page).collect()
}

fn locked_pages() -> std::sync::MutexGuard<'static, BTreeMap<usize, usize>> {
    LOCKED_PAGES.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Lock the pages under a region, counting references per page.
///
/// # Safety
///
/// `ptr` must point to a live allocation of at least `len` bytes.
unsafe fn lock_region(ptr: *const u8, len: usize) -> bool {
    let page = page_size();
    let pages = pages_of(ptr, len);
    let mut counts = locked_pages();

    let mut fresh = Vec::new();
    for &start in pages.iter().filter(|p| !counts.contains_key(p)) {
        if !mlock(start as *const u8, page) {
            for &done in &fresh {
                munlock(done as *const u8, page);
            }
            return false;
        }
        fresh.push(start);
    }

    for start in pages {
        *counts.entry(start).or_insert(0) += 1;
    }
    true
}

/// Release one reference on each page under a region.
///
/// # Safety
///
/// Must pair with a successful [`lock_region`] on the same region.
unsafe fn unlock_region(ptr: *const u8, len: usize) {
    let page = page_size();
    let mut counts = locked_pages();
    for start in pages_of(ptr, len) {
        let Some(count) = counts.get_mut(&start) else {
            continue;
        };
        *count -= 1;
        if *count == 0 {
            counts.remove(&start);
            munlock(start as *const u8, page);
        }
    }
}

/// Lock a memory region so the OS never swaps it out.
///
/// # Safety
///
/// `ptr` must point to a live allocation of at least `len` bytes.
unsafe fn mlock(ptr: *const u8, len: usize) -> bool {
    #[cfg(unix)]
    {
        unix::mlock_impl(ptr, len)
    }

    #[cfg(not(unix))]
    {
        let _ = (ptr, len);
        false
    }
}

/// # Safety
///
/// `ptr` and `len` must cover pages previously locked with [`mlock`].
unsafe fn munlock(ptr: *const u8, len: usize) -> bool {
    #[cfg(unix)]
    {
        unix::munlock_impl(ptr, len)
    }

    #[cfg(not(unix))]
    {
        let _ = (ptr, len);
        true
    }
}

#[cfg(unix)]
mod unix {
    pub fn disable_core_dumps_impl() -> bool {
        // SAFETY: setrlimit with RLIMIT_CORE=0 is a standard POSIX operation
        unsafe {
            let rlim = libc::rlimit {
                rlim_cur: 0,
                rlim_max: 0,
            };
            if libc::setrlimit(libc::RLIMIT_CORE, &rlim) != 0 {
                log::warn!(
                    "failed to disable core dumps: {}",
                    std::io::Error::last_os_error()
                );
                return false;
            }
        }
        true
    }

    pub fn page_size() -> usize {
        // SAFETY: sysconf has no preconditions
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            4096
        }
    }

    pub unsafe fn mlock_impl(ptr: *const u8, len: usize) -> bool {
        libc::mlock(ptr as *const libc::c_void, len) == 0
    }

    pub unsafe fn munlock_impl(ptr: *const u8, len: usize) -> bool {
        libc::munlock(ptr as *const libc::c_void, len) == 0
    }
}

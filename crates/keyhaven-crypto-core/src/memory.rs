//! Zeroizing containers for key material and decrypted plaintext.
//!
//! - [`SecretBuffer`]: variable-length, used for KDF output and decrypted blobs
//! - [`SecretBytes`]: fixed-length, used for the resident vault key
//!
//! Both are wiped on drop, never print their content, and ask the OS to
//! keep their pages out of swap where `mlock` is available.

use crate::error::CryptoError;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

// ---------------------------------------------------------------------------
// Page locking
// ---------------------------------------------------------------------------

/// Best-effort `mlock` guard; `munlock`s on drop if the lock was taken.
struct PageLock {
    ptr: *const u8,
    len: usize,
    locked: bool,
}

// SAFETY: the pointer is only handed to mlock/munlock and never dereferenced.
unsafe impl Send for PageLock {}
unsafe impl Sync for PageLock {}

impl PageLock {
    const fn none() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
            locked: false,
        }
    }

    fn acquire(ptr: *const u8, len: usize) -> Self {
        Self {
            ptr,
            len,
            locked: platform::try_mlock(ptr, len),
        }
    }
}

impl Drop for PageLock {
    fn drop(&mut self) {
        if self.locked {
            platform::try_munlock(self.ptr, self.len);
        }
    }
}

// ---------------------------------------------------------------------------
// SecretBuffer
// ---------------------------------------------------------------------------

/// Sensitive bytes of any length: KDF output, decrypted payloads.
pub struct SecretBuffer {
    inner: SecretSlice<u8>,
    _lock: PageLock,
}

impl SecretBuffer {
    /// Copy `data` into a locked allocation that is wiped on drop.
    /// Wiping the caller's own copy stays the caller's job.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if the allocation cannot be made.
    pub fn new(data: &[u8]) -> Result<Self, CryptoError> {
        let inner = SecretSlice::from(data.to_vec());
        let view = inner.expose_secret();
        let lock = PageLock::acquire(view.as_ptr(), view.len());
        Ok(Self { inner, _lock: lock })
    }

    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.expose().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBuffer[{} bytes, redacted]", self.len())
    }
}

// ---------------------------------------------------------------------------
// SecretBytes<N>
// ---------------------------------------------------------------------------

/// Fixed-size secret such as the resident vault key. Wiped on drop.
///
/// The page lock covers the address the value was built at. A later move
/// leaves it pointing at the old page, which `munlock` tolerates.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes<const N: usize> {
    bytes: [u8; N],
    #[zeroize(skip)]
    lock: PageLock,
}

impl<const N: usize> SecretBytes<N> {
    #[must_use]
    pub fn new(data: [u8; N]) -> Self {
        let mut secret = Self {
            bytes: data,
            lock: PageLock::none(),
        };
        secret.lock = PageLock::acquire(secret.bytes.as_ptr(), N);
        secret
    }

    /// `N` bytes from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if the entropy source fails.
    pub fn random() -> Result<Self, CryptoError> {
        let mut fill = Zeroizing::new([0u8; N]);
        OsRng
            .try_fill_bytes(&mut fill[..])
            .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
        Ok(Self::new(*fill))
    }

    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyMaterial` unless `data` is exactly
    /// `N` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, CryptoError> {
        let array: Zeroizing<[u8; N]> = Zeroizing::new(data.try_into().map_err(|_| {
            CryptoError::InvalidKeyMaterial(format!("need {N} bytes, have {}", data.len()))
        })?);
        Ok(Self::new(*array))
    }

    #[must_use]
    pub const fn expose(&self) -> &[u8; N] {
        &self.bytes
    }
}

impl<const N: usize> Clone for SecretBytes<N> {
    fn clone(&self) -> Self {
        Self::new(self.bytes)
    }
}

impl<const N: usize> fmt::Debug for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>[redacted]")
    }
}

// ---------------------------------------------------------------------------
// Platform glue
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod platform {
    pub(super) fn try_mlock(ptr: *const u8, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        // SAFETY: mlock only inspects the address range; an invalid range
        // yields ENOMEM, which we treat as "not locked".
        unsafe { libc::mlock(ptr.cast(), len) == 0 }
    }

    pub(super) fn try_munlock(ptr: *const u8, len: usize) {
        if len == 0 {
            return;
        }
        // SAFETY: see `try_mlock`; failure is ignored.
        unsafe {
            libc::munlock(ptr.cast(), len);
        }
    }
}

#[cfg(not(unix))]
mod platform {
    pub(super) fn try_mlock(_ptr: *const u8, _len: usize) -> bool {
        false
    }

    pub(super) fn try_munlock(_ptr: *const u8, _len: usize) {}
}

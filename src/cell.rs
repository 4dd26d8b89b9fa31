//! State shared between interrupt handlers and the main loop.
//!
//! Every value here is at most one word and has a single writer per
//! direction, so no lock is taken on the data path. Cortex-M0 has no atomic
//! read-modify-write, so the few read-and-clear sequences run inside a
//! critical section.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicBool, Ordering, compiler_fence};

use crate::ConfigError;

/// One byte of memory that a DMA channel reads from or writes to.
///
/// While a transfer on the owning channel is in flight the DMA owns the cell;
/// software only touches it between transfers.
#[repr(transparent)]
pub struct ByteCell(UnsafeCell<u8>);

// SAFETY: Accesses are single volatile byte reads/writes. Ownership between
// the DMA and software is handed over through the channel enable bit and the
// completion flags.
unsafe impl Sync for ByteCell {}

impl ByteCell {
    /// Creates a cell holding `value`.
    pub const fn new(value: u8) -> Self {
        ByteCell(UnsafeCell::new(value))
    }

    /// Reads the cell.
    #[inline]
    pub fn read(&self) -> u8 {
        // Make sure the read is not hoisted above a preceding flag check.
        compiler_fence(Ordering::SeqCst);
        // SAFETY: The pointer comes from our own cell, so it is valid.
        unsafe { self.0.get().read_volatile() }
    }

    /// Writes the cell.
    #[inline]
    pub fn write(&self, value: u8) {
        // SAFETY: The pointer comes from our own cell, so it is valid.
        unsafe { self.0.get().write_volatile(value) };
        // Make sure the write lands before the channel is enabled.
        compiler_fence(Ordering::SeqCst);
    }

    /// Memory address programmed into the DMA channel.
    #[inline]
    pub fn address(&self) -> u32 {
        self.0.get().expose_provenance() as u32
    }
}

/// A boolean set by one context and consumed by another.
pub struct Flag(AtomicBool);

impl Flag {
    /// Creates a flag with the given initial value.
    pub const fn new(value: bool) -> Self {
        Flag(AtomicBool::new(value))
    }

    /// Raises the flag.
    #[inline]
    pub fn set(&self) {
        // Release: everything written before (byte cells, channel state) is
        // visible to whoever observes the flag.
        self.0.store(true, Ordering::Release);
    }

    /// Lowers the flag.
    #[inline]
    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    /// Returns `true` if the flag is raised.
    #[inline]
    pub fn is_set(&self) -> bool {
        // Acquire: synchronizes with the Release store in `set`.
        self.0.load(Ordering::Acquire)
    }

    /// Lowers the flag and returns whether it was raised.
    #[inline]
    pub fn take(&self) -> bool {
        critical_section::with(|_| {
            let was_set = self.0.load(Ordering::Acquire);
            if was_set {
                self.0.store(false, Ordering::Relaxed);
            }
            was_set
        })
    }
}

impl core::fmt::Debug for Flag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Flag").field(&self.is_set()).finish()
    }
}

/// Spins until `done` returns `true`.
///
/// There is no scheduler to yield to, and an interrupt handler is what makes
/// `done` true, so the caller must not be running at or above that handler's
/// priority.
#[inline]
pub fn spin_until(mut done: impl FnMut() -> bool) {
    while !done() {
        core::hint::spin_loop();
    }
}

/// A `static` slot that is written once at startup and read from interrupt
/// handlers afterwards.
pub struct Shared<T> {
    value: UnsafeCell<MaybeUninit<T>>,
    initialized: AtomicBool,
    claimed: AtomicBool,
}

// SAFETY: The value is written exactly once, guarded by `claimed` inside a
// critical section, and only handed out as `&T` after the Release store of
// `initialized`. `T: Sync` makes sharing those references sound.
unsafe impl<T: Sync> Sync for Shared<T> {}

impl<T> Shared<T> {
    /// Creates an empty slot.
    pub const fn new() -> Self {
        Shared {
            value: UnsafeCell::new(MaybeUninit::uninit()),
            initialized: AtomicBool::new(false),
            claimed: AtomicBool::new(false),
        }
    }

    /// Stores `value` and returns a reference to it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyInitialized`] if the slot was already
    /// filled; `value` is dropped in that case.
    pub fn init(&self, value: T) -> Result<&T, ConfigError> {
        let first = critical_section::with(|_| {
            let claimed = self.claimed.load(Ordering::Relaxed);
            self.claimed.store(true, Ordering::Relaxed);
            !claimed
        });
        if !first {
            return Err(ConfigError::AlreadyInitialized);
        }

        // SAFETY: `claimed` guarantees this is the only writer, and no reader
        // looks at `value` before `initialized` is set.
        let value = unsafe { (*self.value.get()).write(value) };
        // Release: ensures the write to `value` is visible before `initialized` becomes true.
        self.initialized.store(true, Ordering::Release);
        Ok(value)
    }

    /// Returns the value if [`Shared::init`] has completed.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // Acquire: synchronizes with the Release store in `init`.
        if self.initialized.load(Ordering::Acquire) {
            // SAFETY: `initialized` is only set after the value was written,
            // and it is never written again.
            Some(unsafe { (*self.value.get()).assume_init_ref() })
        } else {
            None
        }
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flag_take_clears() {
        let f = Flag::new(false);
        assert!(!f.take());
        f.set();
        assert!(f.is_set());
        assert!(f.take());
        assert!(!f.is_set());
        assert!(!f.take());
    }

    #[test]
    fn byte_cell_roundtrip_and_address() {
        let c = ByteCell::new(0);
        c.write(0xa5);
        assert_eq!(c.read(), 0xa5);
        assert_eq!(c.address(), (&raw const c).expose_provenance() as u32);
    }

    #[test]
    fn shared_initializes_once() {
        static SLOT: Shared<u32> = Shared::new();
        assert!(SLOT.get().is_none());
        assert_eq!(SLOT.init(7).copied(), Ok(7));
        assert_eq!(SLOT.init(8), Err(ConfigError::AlreadyInitialized));
        assert_eq!(SLOT.get(), Some(&7));
    }

    #[test]
    fn spin_until_returns_once_done() {
        let mut polls = 0;
        spin_until(|| {
            polls += 1;
            polls == 3
        });
        assert_eq!(polls, 3);
    }
}

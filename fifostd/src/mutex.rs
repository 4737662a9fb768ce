use core::{
    cell::UnsafeCell,
    fmt,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};

/// Spin-lock mutex that is only ever taken with interrupts masked.
///
/// Every acquisition happens inside [`critical_section::with`], so an interrupt
/// handler on the same core can never preempt a holder and then spin on the lock
/// forever. The spin itself only matters when another core holds the lock.
///
/// Locks must be held for a handful of instructions at most, and must not be
/// re-entered: calling [`IrqMutex::with`] on a mutex from inside its own closure
/// spins forever.
pub struct IrqMutex<T: ?Sized> {
    lock: AtomicBool,
    data: UnsafeCell<T>,
}

impl<T> IrqMutex<T> {
    /// Constructs a new mutex holding the given data.
    pub const fn new(data: T) -> Self {
        Self {
            lock: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> IrqMutex<T> {
    /// Checks if the mutex is locked.
    pub fn is_locked(&self) -> bool {
        self.lock.load(Ordering::Relaxed)
    }

    /// Runs `f` with exclusive access to the data, masking interrupts for the duration.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|_| {
            let mut guard = self.lock();
            f(&mut guard)
        })
    }

    /// Like [`IrqMutex::with`], but returns `None` instead of spinning if the lock is held.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section::with(|_| {
            let mut guard = self.try_lock()?;
            Some(f(&mut guard))
        })
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        // spin loop until lock released
        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.is_locked() {
                core::hint::spin_loop();
            }
        }

        MutexGuard {
            lock: &self.lock,
            data: self.data.get(),
        }
    }

    fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| MutexGuard {
                lock: &self.lock,
                data: self.data.get(),
            })
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for IrqMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_with(|data| f.debug_struct("IrqMutex").field("data", &&*data).finish()) {
            Some(result) => result,
            None => f.write_str("IrqMutex { <locked> }"),
        }
    }
}

struct MutexGuard<'a, T: ?Sized + 'a> {
    lock: &'a AtomicBool,
    data: *mut T,
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: the lock flag is ours until the guard drops
        unsafe { &*self.data }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the lock flag is ours until the guard drops
        unsafe { &mut *self.data }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    /// The dropping of the MutexGuard will release the lock it was created from.
    fn drop(&mut self) {
        self.lock.store(false, Ordering::Release);
    }
}

unsafe impl<T: ?Sized + Send> Sync for IrqMutex<T> {}
unsafe impl<T: ?Sized + Send> Send for IrqMutex<T> {}

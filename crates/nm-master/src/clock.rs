//! Free-block accounting between the mixing thread and the device.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

/// Counts blocks the device has handed back.
///
/// The mixing thread takes a block with `acquire`, sleeping only while none
/// are free. The device's completion callback returns blocks with `release`.
/// `power_down` wakes the mixer for good.
#[derive(Debug)]
pub struct BlockClock {
    free: AtomicUsize,
    capacity: usize,
    powered: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl BlockClock {
    /// A clock with every one of `capacity` blocks free.
    pub fn new(capacity: usize) -> Self {
        Self {
            free: AtomicUsize::new(capacity),
            capacity,
            powered: AtomicBool::new(true),
            lock: Mutex::new(()),
            wake: Condvar::new(),
        }
    }

    pub fn free_blocks(&self) -> usize {
        self.free.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_powered(&self) -> bool {
        self.powered.load(Ordering::Acquire)
    }

    fn try_take(&self) -> bool {
        self.free
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Take one free block, waiting for the device if there is none.
    /// Returns false once the clock has been powered down.
    pub fn acquire(&self) -> bool {
        if !self.is_powered() {
            return false;
        }
        if self.try_take() {
            return true;
        }

        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if !self.is_powered() {
                return false;
            }
            if self.try_take() {
                return true;
            }
            guard = self.wake.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Hand a consumed block back. Never raises the count above capacity.
    pub fn release(&self) {
        let _ = self
            .free
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < self.capacity).then_some(n + 1));
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.wake.notify_one();
    }

    pub fn power_down(&self) {
        self.powered.store(false, Ordering::Release);
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.wake.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn acquire_counts_down() {
        let clock = BlockClock::new(2);
        assert!(clock.acquire());
        assert!(clock.acquire());
        assert_eq!(clock.free_blocks(), 0);
    }

    #[test]
    fn release_saturates_at_capacity() {
        let clock = BlockClock::new(3);
        clock.release();
        assert_eq!(clock.free_blocks(), 3);
        assert!(clock.acquire());
        clock.release();
        clock.release();
        assert_eq!(clock.free_blocks(), 3);
    }

    #[test]
    fn powered_down_clock_refuses() {
        let clock = BlockClock::new(4);
        clock.power_down();
        assert!(!clock.acquire());
        assert_eq!(clock.free_blocks(), 4);
    }

    #[test]
    fn release_wakes_waiter() {
        let clock = Arc::new(BlockClock::new(1));
        assert!(clock.acquire());

        let waiter = {
            let clock = clock.clone();
            thread::spawn(move || clock.acquire())
        };
        thread::sleep(Duration::from_millis(20));
        clock.release();
        assert!(waiter.join().unwrap());
        assert_eq!(clock.free_blocks(), 0);
    }

    #[test]
    fn power_down_wakes_waiter() {
        let clock = Arc::new(BlockClock::new(1));
        assert!(clock.acquire());

        let waiter = {
            let clock = clock.clone();
            thread::spawn(move || clock.acquire())
        };
        thread::sleep(Duration::from_millis(20));
        clock.power_down();
        assert!(!waiter.join().unwrap());
    }

    #[test]
    fn many_releases_from_another_thread() {
        let clock = Arc::new(BlockClock::new(4));
        let releaser = {
            let clock = clock.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    clock.release();
                    thread::yield_now();
                }
            })
        };
        let mut taken = 0;
        while taken < 1000 {
            if clock.acquire() {
                taken += 1;
                clock.release();
            }
        }
        releaser.join().unwrap();
        assert!(clock.free_blocks() <= clock.capacity());
    }
}

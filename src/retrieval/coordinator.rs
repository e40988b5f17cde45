//! Single-flight guard for background index rebuilds.
//!
//! One process-wide flag behind a mutex. "Check if building" and "mark as
//! building" happen inside the same critical section, which is what prevents
//! two rebuilds from running at once.

use std::sync::Mutex;

/// Coordinator owning the in-progress flag for index rebuilds.
pub struct IndexBuildCoordinator {
    building: Mutex<bool>,
}

impl IndexBuildCoordinator {
    pub fn new() -> Self {
        Self {
            building: Mutex::new(false),
        }
    }

    /// Atomically claim the build slot.
    ///
    /// Returns `true` if the caller now owns the rebuild and must call
    /// `release()` when done, `false` if a rebuild is already running.
    pub fn try_acquire(&self) -> bool {
        let mut building = self.lock();
        if *building {
            return false;
        }
        *building = true;
        true
    }

    /// Clear the in-progress flag. Called on success and failure alike.
    pub fn release(&self) {
        *self.lock() = false;
    }

    /// Whether a rebuild is currently in flight.
    pub fn is_building(&self) -> bool {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, bool> {
        // The guarded state is a plain bool; recover it even if a holder
        // panicked so the flag can always be cleared.
        self.building
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for IndexBuildCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_starts_idle() {
        let coordinator = IndexBuildCoordinator::new();
        assert!(!coordinator.is_building());
    }

    #[test]
    fn test_acquire_release_cycle() {
        let coordinator = IndexBuildCoordinator::new();

        assert!(coordinator.try_acquire());
        assert!(coordinator.is_building());
        assert!(!coordinator.try_acquire());

        coordinator.release();
        assert!(!coordinator.is_building());
        assert!(coordinator.try_acquire());
    }

    #[test]
    fn test_only_one_thread_wins() {
        let coordinator = Arc::new(IndexBuildCoordinator::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                std::thread::spawn(move || coordinator.try_acquire())
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }
}

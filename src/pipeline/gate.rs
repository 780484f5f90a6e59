use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-permit admission gate.
///
/// `try_acquire` never blocks; the returned guard releases the permit on
/// every exit path, including panics. Clones share the same permit.
#[derive(Debug, Clone, Default)]
pub struct PermitGate {
    taken: Arc<AtomicBool>,
}

impl PermitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the permit if it is free.
    pub fn try_acquire(&self) -> Option<PermitGuard> {
        if self
            .taken
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(PermitGuard {
                taken: Arc::clone(&self.taken),
            })
        } else {
            None
        }
    }

    pub fn is_available(&self) -> bool {
        !self.taken.load(Ordering::Acquire)
    }
}

/// Releases the permit when dropped.
#[derive(Debug)]
pub struct PermitGuard {
    taken: Arc<AtomicBool>,
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        self.taken.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_succeeds_when_free() {
        let gate = PermitGate::new();
        assert!(gate.is_available());
        let guard = gate.try_acquire();
        assert!(guard.is_some());
        assert!(!gate.is_available());
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let gate = PermitGate::new();
        let _guard = gate.try_acquire().unwrap();
        assert!(gate.try_acquire().is_none());
    }

    #[test]
    fn dropping_the_guard_releases_the_permit() {
        let gate = PermitGate::new();
        drop(gate.try_acquire().unwrap());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn clones_share_one_permit() {
        let gate = PermitGate::new();
        let other = gate.clone();
        let _guard = gate.try_acquire().unwrap();
        assert!(other.try_acquire().is_none());
    }

    #[test]
    fn guard_releases_even_on_panic() {
        let gate = PermitGate::new();
        let inner = gate.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = inner.try_acquire().unwrap();
            panic!("job failed");
        });
        assert!(result.is_err());
        assert!(gate.is_available(), "permit leaked across a panic");
    }

    #[test]
    fn guard_can_cross_threads() {
        let gate = PermitGate::new();
        let guard = gate.try_acquire().unwrap();
        let handle = std::thread::spawn(move || drop(guard));
        handle.join().unwrap();
        assert!(gate.is_available());
    }
}

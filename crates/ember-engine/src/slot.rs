// SPDX-License-Identifier: CEPL-1.0
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EngineId(u64);

impl EngineId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Records which engine, if any, is live. One engine may hold a slot at a
/// time.
///
/// The application uses [`EngineSlot::global`]; tests make their own so
/// several engines can coexist in one process.
#[derive(Debug, Default)]
pub struct EngineSlot {
    // 0 == vacant
    live: AtomicU64,
}

impl EngineSlot {
    pub const fn new() -> Self {
        Self {
            live: AtomicU64::new(0),
        }
    }

    pub fn global() -> &'static EngineSlot {
        static GLOBAL: EngineSlot = EngineSlot::new();
        &GLOBAL
    }

    pub fn current(&self) -> Option<EngineId> {
        match self.live.load(Ordering::Acquire) {
            0 => None,
            id => Some(EngineId(id)),
        }
    }

    /// Takes the slot for `id`, or reports who holds it.
    pub(crate) fn claim(&self, id: EngineId) -> Result<(), EngineId> {
        self.live
            .compare_exchange(0, id.0, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(EngineId)
    }

    /// Vacates the slot only if `id` holds it.
    pub(crate) fn release(&self, id: EngineId) -> bool {
        self.live
            .compare_exchange(id.0, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive() {
        let slot = EngineSlot::new();
        let (a, b) = (EngineId::next(), EngineId::next());
        assert_eq!(slot.claim(a), Ok(()));
        assert_eq!(slot.claim(b), Err(a));
        assert_eq!(slot.current(), Some(a));
    }

    #[test]
    fn only_the_holder_releases() {
        let slot = EngineSlot::new();
        let (a, b) = (EngineId::next(), EngineId::next());
        slot.claim(a).unwrap();
        assert!(!slot.release(b));
        assert_eq!(slot.current(), Some(a));
        assert!(slot.release(a));
        assert_eq!(slot.current(), None);
        assert_eq!(slot.claim(b), Ok(()));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(EngineId::next(), EngineId::next());
    }
}

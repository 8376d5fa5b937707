//! User preference lookups consumed by the store and controller.

use std::sync::RwLock;

/// How a polygonal multi-selection is combined for the text panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombinePolicy {
    /// Wrap all rings into one multi-polygon without altering boundaries.
    #[default]
    Join,
    /// Boolean union, merging overlapping or adjacent areas.
    Union,
}

/// Synchronous preference store boundary.
pub trait Settings: Send + Sync {
    /// Whether more than one geometry may be selected at a time.
    fn multi_select(&self) -> bool;

    /// Combination policy for a polygonal multi-selection.
    fn combine_policy(&self) -> CombinePolicy;

    /// Whether the geometry list survives a reload.
    fn persist(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Prefs {
    multi_select: bool,
    combine_policy: CombinePolicy,
    persist: bool,
}

/// In-memory preferences, shared via `Arc<dyn Settings>` and mutable from
/// the settings panel (or a test) at any time.
pub struct MemorySettings {
    prefs: RwLock<Prefs>,
}

impl MemorySettings {
    #[must_use]
    pub fn new(multi_select: bool, combine_policy: CombinePolicy, persist: bool) -> Self {
        Self {
            prefs: RwLock::new(Prefs { multi_select, combine_policy, persist }),
        }
    }

    pub fn set_multi_select(&self, on: bool) {
        self.write_prefs(|p| p.multi_select = on);
    }

    pub fn set_combine_policy(&self, policy: CombinePolicy) {
        self.write_prefs(|p| p.combine_policy = policy);
    }

    pub fn set_persist(&self, on: bool) {
        self.write_prefs(|p| p.persist = on);
    }

    fn read_prefs(&self) -> Prefs {
        match self.prefs.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn write_prefs(&self, f: impl FnOnce(&mut Prefs)) {
        match self.prefs.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self::new(true, CombinePolicy::default(), false)
    }
}

impl Settings for MemorySettings {
    fn multi_select(&self) -> bool {
        self.read_prefs().multi_select
    }

    fn combine_policy(&self) -> CombinePolicy {
        self.read_prefs().combine_policy
    }

    fn persist(&self) -> bool {
        self.read_prefs().persist
    }
}

use std::collections::HashSet;

use ario_gateway_primitives::Id;
use parking_lot::Mutex;

/// Root transaction ids to prioritize during verification because they're
/// associated with a preferred ArNS name (spec §4.6 "Prioritization"). ArNS
/// name resolution itself lives outside this crate; whatever component
/// resolves preferred names to root transaction ids calls `set` to keep
/// this set current.
#[derive(Default)]
pub struct PreferredRoots {
    ids: Mutex<HashSet<Id>>,
}

impl PreferredRoots {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ids: HashSet<Id>) {
        *self.ids.lock() = ids;
    }

    #[must_use]
    pub fn contains(&self, id: &Id) -> bool {
        self.ids.lock().contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_by_default() {
        let preferred = PreferredRoots::new();
        assert!(!preferred.contains(&Id::random()));
    }

    #[test]
    fn set_replaces_the_whole_membership() {
        let preferred = PreferredRoots::new();
        let a = Id::random();
        let b = Id::random();
        preferred.set(HashSet::from([a]));
        assert!(preferred.contains(&a));
        assert!(!preferred.contains(&b));

        preferred.set(HashSet::from([b]));
        assert!(!preferred.contains(&a));
        assert!(preferred.contains(&b));
    }
}

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use crate::name::PackageName;

/// Record of `(name, version)` pairs already handled in the current
/// resolve pass.
///
/// Shared by clone. [`VisitedSet::insert`] is an atomic test-and-set, so
/// concurrent expansions racing on the same pair agree on a single winner.
#[derive(Clone, Default)]
pub struct VisitedSet(Arc<Mutex<HashMap<PackageName, HashSet<String>>>>);

impl VisitedSet {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn contains(&self, name: &PackageName, version: &str) -> bool {
        self.0
            .lock()
            .unwrap()
            .get(name)
            .is_some_and(|versions| versions.contains(version))
    }

    /// Record the pair, returning whether it was newly added.
    pub fn insert(&self, name: &PackageName, version: &str) -> bool {
        self.0
            .lock()
            .unwrap()
            .entry(name.clone())
            .or_default()
            .insert(version.to_string())
    }

    /// Forget everything, for the start of a fresh pass.
    pub fn reset(&self) {
        self.0.lock().unwrap().clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> PackageName {
        s.parse().unwrap()
    }

    #[test]
    fn insert_is_test_and_set() {
        let visited = VisitedSet::new();
        assert!(visited.insert(&name("a"), "1.0.0"));
        assert!(!visited.insert(&name("a"), "1.0.0"));
        assert!(visited.insert(&name("a"), "2.0.0"));
        assert!(visited.insert(&name("b"), "1.0.0"));
    }

    #[test]
    fn contains_tracks_exact_pairs() {
        let visited = VisitedSet::new();
        visited.insert(&name("a"), "1.0.0");
        assert!(visited.contains(&name("a"), "1.0.0"));
        assert!(!visited.contains(&name("a"), "1.0.1"));
        assert!(!visited.contains(&name("b"), "1.0.0"));
    }

    #[test]
    fn clones_share_state_until_reset() {
        let visited = VisitedSet::new();
        let other = visited.clone();
        visited.insert(&name("a"), "1.0.0");
        assert!(other.contains(&name("a"), "1.0.0"));
        other.reset();
        assert!(!visited.contains(&name("a"), "1.0.0"));
    }
}

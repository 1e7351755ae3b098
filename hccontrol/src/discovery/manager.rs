use std::collections::HashSet;

/// Locations already handed out during one discovery session.
///
/// The set only grows; a fresh registry is created for every session.
#[derive(Debug, Default)]
pub struct LocationRegistry {
    seen: HashSet<String>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        LocationRegistry {
            seen: HashSet::new(),
        }
    }

    /// Returns `true` the first time `location` is seen, `false` afterwards
    pub fn first_sighting(&mut self, location: &str) -> bool {
        if self.seen.contains(location) {
            false
        } else {
            self.seen.insert(location.to_string());
            true
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

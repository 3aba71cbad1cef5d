//! In-memory location list.

use nlloc_obs::Arrival;

use crate::hypocenter::Hypocenter;

/// One located event: its hypocenter plus the (possibly filtered)
/// arrival set used to produce it, each carrying the "save best" detail
/// fields filled in by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub event_id: u64,
    pub hypocenter: Hypocenter,
    pub arrivals: Vec<Arrival>,
    /// Posterior samples the search produced, `(x, y, z, log_likelihood)`,
    /// kept alongside the summary statistics so callers can write a
    /// scatter file without re-running the
    /// search.
    pub scatter: Vec<(f64, f64, f64, f64)>,
}

/// Append-only list of [`Location`]s. Backed by a `Vec` rather than an
/// actual linked list: append, get-by-index, and free-all with
/// insertion-order stability are all a `Vec` gives for free, without the
/// indirection a real linked list would add.
#[derive(Debug, Clone, Default)]
pub struct LocationList {
    locations: Vec<Location>,
}

impl LocationList {
    pub fn new() -> Self {
        Self { locations: Vec::new() }
    }

    /// Appends a location, returning its stable index.
    pub fn append(&mut self, location: Location) -> usize {
        self.locations.push(location);
        self.locations.len() - 1
    }

    /// Get by index.
    pub fn get(&self, index: usize) -> Option<&Location> {
        self.locations.get(index)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }

    /// Frees every location. After this call indices obtained earlier
    /// are no longer valid.
    pub fn free_all(&mut self) {
        self.locations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypocenter::Hypocenter;

    fn sample_location(event_id: u64) -> Location {
        Location { event_id, hypocenter: Hypocenter::uninitialized(), arrivals: Vec::new(), scatter: Vec::new() }
    }

    #[test]
    fn append_preserves_insertion_order() {
        let mut list = LocationList::new();
        let i0 = list.append(sample_location(1));
        let i1 = list.append(sample_location(2));
        assert_eq!(i0, 0);
        assert_eq!(i1, 1);
        assert_eq!(list.get(0).unwrap().event_id, 1);
        assert_eq!(list.get(1).unwrap().event_id, 2);
    }

    #[test]
    fn free_all_empties_the_list() {
        let mut list = LocationList::new();
        list.append(sample_location(1));
        list.free_all();
        assert!(list.is_empty());
        assert!(list.get(0).is_none());
    }
}

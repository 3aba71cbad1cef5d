//! Phase-ID equivalence classes (`LOCPHASEID`).

use std::collections::HashMap;

/// Maps a synonym phase label to its canonical travel-time-grid phase,
/// e.g. "P" <-> "p" <-> "Pn" <-> "Pg".
///
/// Built from a list of equivalence classes, each a canonical name plus
/// its synonyms; lookups are symmetric (any member maps to the class's
/// canonical name, including the canonical name itself).
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseIdTable {
    synonym_to_canonical: HashMap<String, String>,
}

impl PhaseIdTable {
    /// Builds a table from `(canonical, synonyms)` pairs, as read from
    /// `LOCPHASEID` control statements.
    pub fn new(classes: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        let mut synonym_to_canonical = HashMap::new();
        for (canonical, synonyms) in classes {
            synonym_to_canonical.insert(canonical.clone(), canonical.clone());
            for synonym in synonyms {
                synonym_to_canonical.insert(synonym, canonical.clone());
            }
        }
        Self { synonym_to_canonical }
    }

    /// Resolves `phase` to its canonical name, or returns it unchanged if
    /// it has no registered equivalence (an un-mapped phase is still a
    /// valid, simply un-aliased, travel-time-grid lookup key).
    pub fn canonical(&self, phase: &str) -> String {
        self.synonym_to_canonical
        .get(phase)
        .cloned()
        .unwrap_or_else(|| phase.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalence_resolves_synonyms_to_canonical() {
        let table = PhaseIdTable::new([(
                    "P".to_string(),
                    vec!["p".to_string(), "Pn".to_string(), "Pg".to_string()],
        )]);
        assert_eq!(table.canonical("p"), "P");
        assert_eq!(table.canonical("Pn"), "P");
        assert_eq!(table.canonical("P"), "P");
    }

    #[test]
    fn unmapped_phase_passes_through() {
        let table = PhaseIdTable::default();
        assert_eq!(table.canonical("Sg"), "Sg");
    }
}

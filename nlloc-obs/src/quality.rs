//! Onset-class to error mapping (`LOCQUAL2ERR`) and explicit per-phase
//! error precedence.

use crate::arrival::Onset;

/// `LOCQUAL2ERR`: five quality classes {0,1,2,3,4} map to seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocQual2Err {
    pub classes: [f64; 5],
}

impl Default for LocQual2Err {
    fn default() -> Self {
        // Conservative defaults broadly consistent with onset-quality
        // conventions: impulsive picks are tight, emergent/questionable
        // loosen rapidly.
        Self {
            classes: [0.01, 0.05, 0.1, 0.5, 2.0],
        }
    }
}

impl LocQual2Err {
    pub fn error_for_class(&self, class: usize) -> f64 {
        self.classes
        .get(class)
        .copied()
        .unwrap_or(*self.classes.last().unwrap())
    }

    /// Maps an [`Onset`] directly to a quality class index. Callers with
    /// an explicit numeric class (0-4) from the observation record should
    /// use [`LocQual2Err::error_for_class`] instead.
    pub fn error_for_onset(&self, onset: Onset) -> f64 {
        match onset {
            Onset::Impulsive => self.error_for_class(0),
            Onset::Emergent => self.error_for_class(2),
            Onset::Questionable => self.error_for_class(4),
        }
    }
}

/// Where an arrival's `sigma` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    QualityClass(usize),
    Explicit,
}

/// Resolves the final a-priori sigma for an arrival: an explicit
/// per-phase error always wins over the quality-class table, and is
/// never silently averaged with it.
pub fn resolve_sigma(
    table: &LocQual2Err,
    onset: Onset,
    explicit_error: Option<f64>,
) -> (f64, bool) {
    match explicit_error {
        Some(sigma) => (sigma, true),
        None => (table.error_for_onset(onset), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_error_wins_over_quality_class() {
        let table = LocQual2Err::default();
        let (sigma, explicit) = resolve_sigma(&table, Onset::Impulsive, Some(0.25));
        assert_eq!(sigma, 0.25);
        assert!(explicit);
    }

    #[test]
    fn falls_back_to_quality_class_without_explicit_error() {
        let table = LocQual2Err::default();
        let (sigma, explicit) = resolve_sigma(&table, Onset::Emergent, None);
        assert_eq!(sigma, table.error_for_class(2));
        assert!(!explicit);
    }
}

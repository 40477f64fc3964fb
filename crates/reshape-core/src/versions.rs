//! Released versions
//!
//! Maps externally meaningful version numbers to the evolution count the
//! pipeline had when each was released. The ledger is an index for callers;
//! the evolution count stamped on a record stays the authority at replay time.

use crate::error::{EvolveError, EvolveResult};
use im::OrdMap;

/// Version number to evolution count
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionLedger(OrdMap<u64, usize>);

impl VersionLedger {
    /// Empty ledger
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(OrdMap::new())
    }

    /// Ledger with `version` recorded at `evolution_count`
    ///
    /// # Errors
    /// Returns [`EvolveError::NonMonotonicVersion`] unless `version` is strictly
    /// greater than every version already released
    pub fn release(&self, version: u64, evolution_count: usize) -> EvolveResult<Self> {
        if let Some(max) = self.max_version() {
            if version <= max {
                return Err(EvolveError::NonMonotonicVersion {
                    requested: version,
                    max,
                });
            }
        }
        Ok(Self(self.0.update(version, evolution_count)))
    }

    /// Highest released version
    #[must_use]
    pub fn max_version(&self) -> Option<u64> {
        self.0.iter().map(|(version, _)| *version).max()
    }

    /// Evolution count recorded for `version`
    #[must_use]
    pub fn evolution_count_for(&self, version: u64) -> Option<usize> {
        self.0.get(&version).copied()
    }

    /// Latest version released at exactly `evolution_count`
    #[must_use]
    pub fn version_at(&self, evolution_count: usize) -> Option<u64> {
        self.0
            .iter()
            .filter(|(_, count)| **count == evolution_count)
            .map(|(version, _)| *version)
            .max()
    }

    /// `(version, evolution_count)` pairs in version order
    pub fn iter(&self) -> impl Iterator<Item = (u64, usize)> + '_ {
        self.0.iter().map(|(version, count)| (*version, *count))
    }

    /// Number of released versions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if nothing has been released
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_records_snapshot() {
        let ledger = VersionLedger::new().release(1, 2).unwrap().release(2, 5).unwrap();
        assert_eq!(ledger.evolution_count_for(1), Some(2));
        assert_eq!(ledger.evolution_count_for(2), Some(5));
        assert_eq!(ledger.evolution_count_for(3), None);
        assert_eq!(ledger.max_version(), Some(2));
    }

    #[test]
    fn release_must_increase() {
        let ledger = VersionLedger::new().release(3, 1).unwrap();

        let err = ledger.release(2, 4).unwrap_err();
        assert!(matches!(
            err,
            EvolveError::NonMonotonicVersion {
                requested: 2,
                max: 3
            }
        ));
        assert!(ledger.release(3, 4).is_err());
        assert!(ledger.release(4, 4).is_ok());
    }

    #[test]
    fn release_is_persistent() {
        let before = VersionLedger::new();
        let after = before.release(1, 0).unwrap();
        assert!(before.is_empty());
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn version_at_picks_latest_release_for_count() {
        let ledger = VersionLedger::new()
            .release(1, 3)
            .unwrap()
            .release(2, 3)
            .unwrap()
            .release(5, 7)
            .unwrap();
        assert_eq!(ledger.version_at(3), Some(2));
        assert_eq!(ledger.version_at(7), Some(5));
        assert_eq!(ledger.version_at(4), None);
        assert_eq!(ledger.iter().collect::<Vec<_>>(), vec![(1, 3), (2, 3), (5, 7)]);
    }
}

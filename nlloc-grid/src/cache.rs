//! In-memory grid cache.
//!
//! Mirrors the shape of `rinex`'s station/phase keyed lookups (e.g.
//! `BiasSource` in `ionex::mod`) generalized into an LRU-ish cache with a
//! soft cap on live grids, as the original NonLinLoc `GridMemLib`
//! (`examples/original_source/src/GridMemLib.c`) implements with a flat
//! list and an `active` flag per entry.

use std::collections::HashMap;

use crate::cascading::CascadingGrid;
use crate::desc::GridDesc;
use crate::GridError;

#[cfg(feature = "logging")]
use log::debug;

/// Cache identity: station+phase+type, keyed by the grid title.
pub type GridKey = String;

struct Entry {
    grid: CascadingGrid,
    active: bool,
    /// Monotonic insertion order, used to find the oldest inactive entry
    /// when the cache must evict.
    sequence: u64,
}

/// LRU-style cache of in-memory grids keyed by grid title.
///
/// `acquire` either returns an existing (possibly inactive) entry,
/// reuses an inactive entry whose shape is byte-identical so the buffer
/// is reused in place, evicts the oldest inactive entry to make room, or
/// falls back to an uncached, per-call allocation when the cache is full
/// of active entries.
pub struct GridCache {
    entries: HashMap<GridKey, Entry>,
    /// Soft maximum count of *live* (tracked) grids. `None`/`0` disables
    /// the cap (unbounded caching).
    max_live: usize,
    next_sequence: u64,
}

impl GridCache {
    pub fn new(max_live: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_live,
            next_sequence: 0,
        }
    }

    fn active_count(&self) -> usize {
        self.entries.values().filter(|e| e.active).count()
    }

    /// Returns a usable grid for `desc`, either by creating a new one,
    /// reusing a cached inactive one, or (when the cache is saturated
    /// with active grids) allocating outside the cache entirely.
    ///
    /// The returned grid is a clone handed to the caller; the cache keeps
    /// its own copy for later reuse/eviction bookkeeping. This matches
    /// the contract (caller gets "a usable buffer") without needing
    /// interior mutability or lifetimes tying the caller to the cache.
    pub fn acquire(&mut self, desc: &GridDesc) -> Result<CascadingGrid, GridError> {
        if let Some(entry) = self.entries.get_mut(&desc.title) {
            entry.active = true;
            #[cfg(feature = "logging")]
            debug!("grid cache hit: {}", desc.title);
            return Ok(entry.grid.clone());
        }

        if self.max_live > 0 && self.active_count() >= self.max_live {
            // Try to reuse a byte-identical inactive entry's buffer shape
            // before falling back to uncached, un-tracked allocation.
            if let Some(key) = self.find_identical_shape_inactive(desc) {
                let mut entry = self.entries.remove(&key).expect("key just found");
                entry.grid.desc.title = desc.title.clone();
                entry.active = true;
                entry.sequence = self.bump_sequence();
                let grid = entry.grid.clone();
                self.entries.insert(desc.title.clone(), entry);
                #[cfg(feature = "logging")]
                debug!("grid cache reused shape-identical buffer for {}", desc.title);
                return Ok(grid);
            }
            if let Some(key) = self.find_oldest_inactive() {
                self.entries.remove(&key);
                #[cfg(feature = "logging")]
                debug!("grid cache evicted oldest inactive entry {key}");
                return self.insert_new(desc);
            }
            #[cfg(feature = "logging")]
            debug!("grid cache full ({} active); allocating uncached", self.max_live);
            return CascadingGrid::allocate(desc.clone());
        }

        self.insert_new(desc)
    }

    /// Returns the cached grid for `desc.title`, or calls `load` on a miss
    /// and inserts its result into the cache. Unlike [`GridCache::acquire`],
    /// which always synthesizes an empty buffer via
    /// [`CascadingGrid::allocate`], this is for grids whose real content
    /// comes from disk: a cache hit skips `load` (and so the `.buf` read)
    /// entirely. Bypasses the active-count eviction policy: callers
    /// loading real data are expected to size `max_live` generously or
    /// pass `0` (unbounded).
    pub fn acquire_or_load(
        &mut self,
        desc: &GridDesc,
        load: impl FnOnce() -> Result<CascadingGrid, GridError>,
    ) -> Result<CascadingGrid, GridError> {
        if let Some(entry) = self.entries.get_mut(&desc.title) {
            entry.active = true;
            #[cfg(feature = "logging")]
            debug!("grid cache hit: {}", desc.title);
            return Ok(entry.grid.clone());
        }
        let grid = load()?;
        let sequence = self.bump_sequence();
        self.entries.insert(desc.title.clone(), Entry { grid: grid.clone(), active: true, sequence });
        #[cfg(feature = "logging")]
        debug!("grid cache loaded and inserted: {}", desc.title);
        Ok(grid)
    }

    fn insert_new(&mut self, desc: &GridDesc) -> Result<CascadingGrid, GridError> {
        let grid = CascadingGrid::allocate(desc.clone())?;
        let sequence = self.bump_sequence();
        self.entries.insert(
            desc.title.clone(),
            Entry {
                grid: grid.clone(),
                active: true,
                sequence,
            },
        );
        Ok(grid)
    }

    fn bump_sequence(&mut self) -> u64 {
        let s = self.next_sequence;
        self.next_sequence += 1;
        s
    }

    fn find_identical_shape_inactive(&self, desc: &GridDesc) -> Option<GridKey> {
        self.entries
        .iter()
        .filter(|(_, e)| !e.active && e.grid.desc.byte_size() == desc.byte_size())
        .map(|(k, _)| k.clone())
        .next()
    }

    fn find_oldest_inactive(&self) -> Option<GridKey> {
        self.entries
        .iter()
        .filter(|(_, e)| !e.active)
        .min_by_key(|(_, e)| e.sequence)
        .map(|(k, _)| k.clone())
    }

    /// Marks the grid keyed by `key` inactive; it may be reclaimed or
    /// reused by a later [`GridCache::acquire`].
    pub fn release(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.active = false;
        }
    }

    /// Number of entries currently tracked by the cache (active and
    /// inactive).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::{ElementType, GridType};
    use crate::linspace::Linspace;

    fn desc(title: &str, nx: usize) -> GridDesc {
        GridDesc {
            title: title.to_string(),
            x: Linspace::new(0.0, 1.0, nx).unwrap(),
            y: Linspace::new(0.0, 1.0, nx).unwrap(),
            z: Linspace::new(0.0, 1.0, nx).unwrap(),
            grid_type: GridType::Time3D,
            element: ElementType::Float32,
            cascade_levels: vec![],
            big_endian: false,
            station_xyz: None,
        }
    }

    #[test]
    fn reuses_same_title() {
        let mut cache = GridCache::new(0);
        let d = desc("STA.P.TIME", 4);
        cache.acquire(&d).unwrap();
        assert_eq!(cache.len(), 1);
        cache.acquire(&d).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn falls_back_to_uncached_when_full_of_active() {
        let mut cache = GridCache::new(1);
        cache.acquire(&desc("A.P.TIME", 4)).unwrap();
        // second grid: cache is full of active entries, no inactive to
        // reuse or evict -> uncached allocation, cache stays at 1 entry
        cache.acquire(&desc("B.P.TIME", 4)).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evicts_oldest_inactive_when_full() {
        let mut cache = GridCache::new(1);
        cache.acquire(&desc("A.P.TIME", 4)).unwrap();
        cache.release("A.P.TIME");
        cache.acquire(&desc("B.P.TIME", 4)).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.entries.get("B.P.TIME").is_some());
    }

    #[test]
    fn reuses_inactive_identical_shape_buffer() {
        let mut cache = GridCache::new(1);
        cache.acquire(&desc("A.P.TIME", 4)).unwrap();
        cache.release("A.P.TIME");
        let grid = cache.acquire(&desc("B.P.TIME", 4)).unwrap();
        assert_eq!(grid.desc.title, "B.P.TIME");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn acquire_or_load_skips_the_loader_on_a_cache_hit() {
        let mut cache = GridCache::new(0);
        let d = desc("STA.P.TIME", 4);
        let mut loads = 0;
        cache.acquire_or_load(&d, || { loads += 1; CascadingGrid::allocate(d.clone()) }).unwrap();
        cache.acquire_or_load(&d, || { loads += 1; CascadingGrid::allocate(d.clone()) }).unwrap();
        assert_eq!(loads, 1);
        assert_eq!(cache.len(), 1);
    }
}

//! Tile records and their cache.
//!
//! Every tile the composer asks for gets a record that moves strictly
//! `Queued -> Rendering -> Ready`, or back `Rendering -> Queued` when a
//! worker fails. Only ready tiles live in the time wheel, so only they are
//! ever evicted.

mod time_wheel;

pub use time_wheel::TimeWheel;

use crate::StoreError;
use fractaltiles_core::{CacheConfig, TileKey};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileState {
    Queued,
    Rendering,
    Ready,
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TileState::Queued => "queued",
            TileState::Rendering => "rendering",
            TileState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Per-tile entry. Only a ready record carries a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TileRecord<P> {
    Queued,
    Rendering,
    Ready(P),
}

impl<P> TileRecord<P> {
    pub fn state(&self) -> TileState {
        match self {
            TileRecord::Queued => TileState::Queued,
            TileRecord::Rendering => TileState::Rendering,
            TileRecord::Ready(_) => TileState::Ready,
        }
    }

    pub fn payload(&self) -> Option<&P> {
        match self {
            TileRecord::Ready(payload) => Some(payload),
            _ => None,
        }
    }
}

pub struct TileStore<P> {
    tiles: HashMap<TileKey, TileRecord<P>>,
    wheel: TimeWheel<TileKey>,
    policy: CacheConfig,
    disposed: bool,
}

impl<P> TileStore<P> {
    pub fn new(policy: CacheConfig) -> Self {
        Self {
            tiles: HashMap::new(),
            wheel: TimeWheel::new(),
            policy,
            disposed: false,
        }
    }

    pub fn policy(&self) -> CacheConfig {
        self.policy
    }

    /// Replace the eviction policy and evict right away, without ageing.
    pub fn set_policy(&mut self, policy: CacheConfig) -> Result<(), StoreError> {
        self.ensure_live()?;
        self.policy = policy;
        self.evict();
        Ok(())
    }

    pub fn get(&self, id: &TileKey) -> Result<Option<&TileRecord<P>>, StoreError> {
        self.ensure_live()?;
        Ok(self.tiles.get(id))
    }

    /// Create a queued record. Already queued is fine; any other state is not.
    pub fn set_queued(&mut self, id: TileKey) -> Result<(), StoreError> {
        self.ensure_live()?;
        match self.tiles.get(&id) {
            None => {
                self.tiles.insert(id, TileRecord::Queued);
                Ok(())
            }
            Some(TileRecord::Queued) => Ok(()),
            Some(record) => Err(invalid(id, "queue", record)),
        }
    }

    pub fn set_rendering(&mut self, id: TileKey) -> Result<(), StoreError> {
        self.ensure_live()?;
        let record = self.record_mut(id, "render")?;
        match record {
            TileRecord::Queued => {
                *record = TileRecord::Rendering;
                Ok(())
            }
            other => Err(invalid(id, "render", other)),
        }
    }

    /// Store the payload and make the tile the youngest in the cache.
    pub fn set_ready(&mut self, id: TileKey, payload: P) -> Result<(), StoreError> {
        self.ensure_live()?;
        let record = self.record_mut(id, "ready")?;
        if record.state() != TileState::Rendering {
            return Err(invalid(id, "ready", record));
        }

        *record = TileRecord::Ready(payload);
        self.wheel.touch(id);
        Ok(())
    }

    /// Put a tile whose worker failed back to queued.
    pub fn reset_to_queued(&mut self, id: TileKey) -> Result<(), StoreError> {
        self.ensure_live()?;
        let record = self.record_mut(id, "requeue")?;
        match record {
            TileRecord::Rendering => {
                *record = TileRecord::Queued;
                Ok(())
            }
            other => Err(invalid(id, "requeue", other)),
        }
    }

    /// Drop a queued record whose job was withdrawn. Absent is fine.
    pub fn discard_queued(&mut self, id: TileKey) -> Result<(), StoreError> {
        self.ensure_live()?;
        match self.tiles.get(&id) {
            None => Ok(()),
            Some(TileRecord::Queued) => {
                self.tiles.remove(&id);
                Ok(())
            }
            Some(record) => Err(invalid(id, "discard", record)),
        }
    }

    /// Refresh a ready tile's age. Returns false when it is not cached.
    pub fn touch(&mut self, id: TileKey) -> Result<bool, StoreError> {
        self.ensure_live()?;
        if self.wheel.contains(&id) {
            self.wheel.touch(id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Advance the cache by one tick, then evict per policy.
    pub fn prune(&mut self) -> Result<usize, StoreError> {
        self.ensure_live()?;
        self.wheel.tick();
        Ok(self.evict())
    }

    /// Forget every record.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.ensure_live()?;
        self.tiles.clear();
        self.wheel.clear();
        Ok(())
    }

    pub fn dispose(&mut self) -> Result<(), StoreError> {
        self.ensure_live()?;
        self.disposed = true;
        self.tiles.clear();
        self.wheel.clear();
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Ready tiles held in the cache.
    pub fn len(&self) -> usize {
        self.wheel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wheel.is_empty()
    }

    /// All records, whatever their state.
    pub fn record_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn age(&self, id: &TileKey) -> Option<usize> {
        self.wheel.age(id)
    }

    fn evict(&mut self) -> usize {
        let evicted = self.wheel.evict(&self.policy);
        for id in &evicted {
            self.tiles.remove(id);
        }
        evicted.len()
    }

    fn record_mut(
        &mut self,
        id: TileKey,
        operation: &'static str,
    ) -> Result<&mut TileRecord<P>, StoreError> {
        self.tiles
            .get_mut(&id)
            .ok_or(StoreError::Missing { tile: id, operation })
    }

    fn ensure_live(&self) -> Result<(), StoreError> {
        if self.disposed {
            Err(StoreError::Disposed)
        } else {
            Ok(())
        }
    }
}

fn invalid<P>(tile: TileKey, operation: &'static str, record: &TileRecord<P>) -> StoreError {
    StoreError::InvalidTransition {
        tile,
        operation,
        found: record.state(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(i: i64) -> TileKey {
        TileKey::new(3, i, 0)
    }

    fn store(min_age: usize, max_age: usize, capacity: usize) -> TileStore<&'static str> {
        TileStore::new(CacheConfig {
            min_age,
            max_age,
            capacity,
        })
    }

    fn insert_ready(store: &mut TileStore<&'static str>, id: TileKey, payload: &'static str) {
        store.set_queued(id).unwrap();
        store.set_rendering(id).unwrap();
        store.set_ready(id, payload).unwrap();
    }

    // ============================================================================
    // State machine
    // ============================================================================

    #[test]
    fn lifecycle_is_visible_after_each_step() {
        let mut store = store(5, 0, 10);
        let id = key(0);
        assert_eq!(store.get(&id).unwrap(), None);

        store.set_queued(id).unwrap();
        assert_eq!(store.get(&id).unwrap(), Some(&TileRecord::Queued));

        store.set_rendering(id).unwrap();
        assert_eq!(store.get(&id).unwrap(), Some(&TileRecord::Rendering));

        store.set_ready(id, "pixels").unwrap();
        assert_eq!(store.get(&id).unwrap(), Some(&TileRecord::Ready("pixels")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn queueing_twice_is_a_no_op() {
        let mut store = store(5, 0, 10);
        store.set_queued(key(0)).unwrap();
        store.set_queued(key(0)).unwrap();
        assert_eq!(store.record_count(), 1);
    }

    #[test]
    fn out_of_order_transitions_fail() {
        let mut store = store(5, 0, 10);
        let id = key(0);

        assert_eq!(
            store.set_rendering(id),
            Err(StoreError::Missing {
                tile: id,
                operation: "render"
            })
        );

        store.set_queued(id).unwrap();
        assert_eq!(
            store.set_ready(id, "x"),
            Err(StoreError::InvalidTransition {
                tile: id,
                operation: "ready",
                found: TileState::Queued
            })
        );
        assert!(store.reset_to_queued(id).is_err());

        store.set_rendering(id).unwrap();
        assert!(store.set_rendering(id).is_err());
        assert!(store.set_queued(id).is_err());

        store.set_ready(id, "x").unwrap();
        assert!(store.set_queued(id).is_err());
        assert!(store.set_rendering(id).is_err());
        assert!(store.reset_to_queued(id).is_err());
    }

    #[test]
    fn failed_render_goes_back_to_queued() {
        let mut store = store(5, 0, 10);
        let id = key(0);
        store.set_queued(id).unwrap();
        store.set_rendering(id).unwrap();

        store.reset_to_queued(id).unwrap();
        assert_eq!(store.get(&id).unwrap(), Some(&TileRecord::Queued));

        store.set_rendering(id).unwrap();
        store.set_ready(id, "second try").unwrap();
        assert_eq!(
            store.get(&id).unwrap().and_then(TileRecord::payload),
            Some(&"second try")
        );
    }

    #[test]
    fn discard_only_touches_queued_records() {
        let mut store = store(5, 0, 10);
        store.set_queued(key(0)).unwrap();
        store.discard_queued(key(0)).unwrap();
        assert_eq!(store.get(&key(0)).unwrap(), None);

        store.discard_queued(key(1)).unwrap();

        insert_ready(&mut store, key(2), "x");
        assert!(store.discard_queued(key(2)).is_err());
    }

    // ============================================================================
    // Eviction
    // ============================================================================

    #[test]
    fn prune_evicts_oldest_over_capacity() {
        let mut store = store(1, 0, 1);
        insert_ready(&mut store, TileKey::new(0, 0, 0), "a");
        insert_ready(&mut store, TileKey::new(0, 0, 1), "b");

        assert_eq!(store.prune().unwrap(), 1);

        assert_eq!(store.get(&TileKey::new(0, 0, 0)).unwrap(), None);
        assert_eq!(
            store.get(&TileKey::new(0, 0, 1)).unwrap(),
            Some(&TileRecord::Ready("b"))
        );
    }

    #[test]
    fn eviction_spares_recent_touches() {
        let capacity = 4;
        let n = 10;
        let mut store = store(2, 0, capacity);
        for i in 0..n {
            insert_ready(&mut store, key(i), "t");
        }

        store.prune().unwrap();
        assert_eq!(store.len(), n as usize);

        // Touched within the last tick: must survive.
        store.touch(key(0)).unwrap();
        store.prune().unwrap();

        assert_eq!(store.len(), capacity);
        assert!(store.get(&key(0)).unwrap().is_some());
        for i in 1..=6 {
            assert_eq!(store.get(&key(i)).unwrap(), None, "tile {} kept", i);
        }
        for i in 7..n {
            assert!(store.get(&key(i)).unwrap().is_some());
        }
    }

    #[test]
    fn exact_overflow_is_evicted() {
        let mut store = store(2, 0, 3);
        for i in 0..8 {
            insert_ready(&mut store, key(i), "t");
        }

        store.prune().unwrap();
        store.prune().unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.record_count(), 3);
        for i in 5..8 {
            assert!(store.get(&key(i)).unwrap().is_some());
        }
    }

    #[test]
    fn in_flight_records_are_never_evicted() {
        let mut store = store(0, 0, 0);
        store.set_queued(key(0)).unwrap();
        store.set_queued(key(1)).unwrap();
        store.set_rendering(key(1)).unwrap();

        store.prune().unwrap();
        assert_eq!(store.record_count(), 2);
    }

    #[test]
    fn set_policy_evicts_without_ageing() {
        let mut store = store(1, 0, 10);
        for i in 0..3 {
            insert_ready(&mut store, key(i), "t");
        }
        store.prune().unwrap();

        store
            .set_policy(CacheConfig {
                min_age: 1,
                max_age: 0,
                capacity: 1,
            })
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.age(&key(2)), Some(1));
    }

    #[test]
    fn hard_ttl_expires_old_tiles() {
        let mut store = store(1, 3, 100);
        insert_ready(&mut store, key(0), "old");
        store.prune().unwrap();
        assert!(store.get(&key(0)).unwrap().is_some());
        insert_ready(&mut store, key(1), "new");

        // Second prune: "old" is two ticks old, the third bucket.
        assert_eq!(store.prune().unwrap(), 1);

        assert_eq!(store.get(&key(0)).unwrap(), None);
        assert!(store.get(&key(1)).unwrap().is_some());
    }

    #[test]
    fn touch_reports_residency() {
        let mut store = store(1, 0, 10);
        insert_ready(&mut store, key(0), "t");
        store.set_queued(key(1)).unwrap();

        assert!(store.touch(key(0)).unwrap());
        assert!(!store.touch(key(1)).unwrap());
        assert!(!store.touch(key(2)).unwrap());
    }

    // ============================================================================
    // Clearing and disposal
    // ============================================================================

    #[test]
    fn clear_drops_everything() {
        let mut store = store(1, 0, 10);
        insert_ready(&mut store, key(0), "t");
        store.set_queued(key(1)).unwrap();

        store.clear().unwrap();

        assert_eq!(store.record_count(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn disposed_store_rejects_everything() {
        let mut store = store(1, 0, 10);
        store.dispose().unwrap();

        assert_eq!(store.get(&key(0)), Err(StoreError::Disposed));
        assert_eq!(store.set_queued(key(0)), Err(StoreError::Disposed));
        assert_eq!(store.prune(), Err(StoreError::Disposed));
        assert_eq!(store.dispose(), Err(StoreError::Disposed));
        assert!(store.is_disposed());
    }
}

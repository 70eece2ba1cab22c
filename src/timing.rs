//! The Timing Store: a small sorted sequence of timing points.
//!
//! Mirrors the Note Store's out-of-order protocol at a much smaller
//! scale: mutations set a dirty flag, ordered reads require a prior
//! `sort()`. Grounded in `original_source/DyCore/src/timing/timing.cpp`'s
//! `TimingManager`.

use std::sync::RwLock;

use ordered_float::OrderedFloat;

use crate::error::{lock_poisoned, CoreError, CoreResult};

/// A BPM change event. `bpm = 60000.0 / beat_length`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingPoint {
    pub time: f64,
    pub beat_length: f64,
    pub meter: i32,
}

impl TimingPoint {
    pub fn bpm(&self) -> f64 {
        60000.0 / self.beat_length
    }

    pub fn with_bpm(time: f64, bpm: f64, meter: i32) -> Self {
        Self {
            time,
            beat_length: 60000.0 / bpm,
            meter,
        }
    }
}

/// Points within this many milliseconds of a queried time are considered
/// coincident by `has_at`, mirroring `TIMING_POINT_EPSILON` in the
/// original.
const TIMING_POINT_EPSILON: f64 = 1.0;

struct Inner {
    points: Vec<TimingPoint>,
    dirty: bool,
    last_modified: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            points: Vec::new(),
            dirty: false,
            last_modified: 0,
        }
    }

    fn mark_modified(&mut self) {
        self.last_modified += 1;
    }

    fn sort_if_needed(&mut self) {
        if !self.dirty {
            return;
        }
        self.points.sort_by_key(|p| OrderedFloat(p.time));
        self.dirty = false;
    }
}

/// A sorted sequence of timing points with add/remove/shift operations.
pub struct TimingStore {
    inner: RwLock<Inner>,
}

impl Default for TimingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::new()),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.points.clear();
            inner.dirty = false;
            inner.mark_modified();
        }
    }

    pub fn add(&self, point: TimingPoint) -> CoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        inner.points.push(point);
        inner.dirty = true;
        inner.mark_modified();
        Ok(())
    }

    pub fn append(&self, points: &[TimingPoint]) -> CoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        inner.points.extend_from_slice(points);
        inner.dirty = true;
        inner.mark_modified();
        Ok(())
    }

    /// Whether a point within `TIMING_POINT_EPSILON` ms of `time` exists.
    pub fn has_at(&self, time: f64) -> CoreResult<bool> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        inner.sort_if_needed();
        let idx = inner.points.partition_point(|p| p.time < time);
        if let Some(p) = inner.points.get(idx) {
            if (p.time - time).abs() < TIMING_POINT_EPSILON {
                return Ok(true);
            }
        }
        if idx > 0 {
            if let Some(p) = inner.points.get(idx - 1) {
                if (p.time - time).abs() < TIMING_POINT_EPSILON {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Replaces the first point whose `time` exactly matches `time`.
    pub fn change_at(&self, time: f64, point: TimingPoint) -> CoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        let Some(slot) = inner.points.iter_mut().find(|p| p.time == time) else {
            return Err(CoreError::NotFound(format!("timing point at {time}")));
        };
        *slot = point;
        inner.dirty = true;
        inner.mark_modified();
        Ok(())
    }

    /// Removes every point whose `time` exactly matches `time`.
    pub fn delete_at(&self, time: f64) -> CoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        inner.points.retain(|p| p.time != time);
        inner.mark_modified();
        Ok(())
    }

    /// Shifts every point's `time` by `delta`. Order is invariant under a
    /// uniform shift, so this never dirties the store.
    pub fn shift_all(&self, delta: f64) -> CoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        for p in inner.points.iter_mut() {
            p.time += delta;
        }
        inner.mark_modified();
        Ok(())
    }

    pub fn sorted_view(&self) -> CoreResult<Vec<TimingPoint>> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        inner.sort_if_needed();
        Ok(inner.points.clone())
    }

    pub fn size(&self) -> usize {
        self.inner.read().map(|g| g.points.len()).unwrap_or(0)
    }

    pub fn at(&self, index: usize) -> CoreResult<TimingPoint> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        inner.sort_if_needed();
        inner
            .points
            .get(index)
            .copied()
            .ok_or_else(|| CoreError::OutOfRange {
                index,
                len: inner.points.len(),
            })
    }

    pub fn last_modified_timestamp(&self) -> u64 {
        self.inner.read().map(|g| g.last_modified).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tp(time: f64, bpm: f64) -> TimingPoint {
        TimingPoint::with_bpm(time, bpm, 4)
    }

    #[test]
    fn bpm_round_trips_through_beat_length() {
        let p = tp(0.0, 180.0);
        assert!((p.bpm() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn sort_orders_by_time() {
        let store = TimingStore::new();
        store.add(tp(200.0, 120.0)).unwrap();
        store.add(tp(0.0, 140.0)).unwrap();
        store.add(tp(100.0, 160.0)).unwrap();
        let view = store.sorted_view().unwrap();
        let times: Vec<f64> = view.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![0.0, 100.0, 200.0]);
    }

    #[test]
    fn has_at_respects_epsilon() {
        let store = TimingStore::new();
        store.add(tp(1000.0, 120.0)).unwrap();
        assert!(store.has_at(1000.4).unwrap());
        assert!(!store.has_at(1005.0).unwrap());
    }

    #[test]
    fn shift_all_preserves_order_without_dirtying() {
        let store = TimingStore::new();
        store.add(tp(0.0, 120.0)).unwrap();
        store.add(tp(100.0, 120.0)).unwrap();
        store.sorted_view().unwrap();
        store.shift_all(50.0).unwrap();
        let view = store.sorted_view().unwrap();
        assert_eq!(view[0].time, 50.0);
        assert_eq!(view[1].time, 150.0);
    }

    #[test]
    fn delete_at_removes_matching_points() {
        let store = TimingStore::new();
        store.add(tp(0.0, 120.0)).unwrap();
        store.add(tp(100.0, 120.0)).unwrap();
        store.delete_at(0.0).unwrap();
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn change_at_reports_missing_point() {
        let store = TimingStore::new();
        assert!(matches!(
            store.change_at(5.0, tp(5.0, 100.0)),
            Err(CoreError::NotFound(_))
        ));
    }
}

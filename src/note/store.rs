//! The Note Store: a pooled, indexed collection of note records.
//!
//! Records live in a slot arena addressed by stable slot ids; two ordered
//! views (primary, sorted by `time`; hold-only, sorted descending by
//! `last_time`) hold `Option<slot id>` entries, where `None` marks a
//! tombstone left behind by `delete`. A single `dirty` flag tracks whether
//! those views currently match the live records; ordered reads fail fast
//! with [`CoreError::OutOfOrder`] until `sort()` is called, per the
//! out-of-order protocol this store mirrors from the original engine's
//! `NotePoolManager`.

use std::collections::HashMap;
use std::sync::RwLock;

use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::error::{lock_poisoned, CoreError, CoreResult};
use crate::layout::NOTES_ARRAY_PARALLEL_SORT_THRESHOLD;
use crate::note::{generate_note_id, Note, NoteType};

struct NoteHandle {
    slot: usize,
    primary_index: usize,
    hold_index: Option<usize>,
}

struct Inner {
    slots: Vec<Option<Note>>,
    free_list: Vec<usize>,
    primary: Vec<Option<usize>>,
    hold_only: Vec<Option<usize>>,
    by_id: HashMap<String, NoteHandle>,
    dirty: bool,
    count: usize,
    last_modified: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            primary: Vec::new(),
            hold_only: Vec::new(),
            by_id: HashMap::new(),
            dirty: false,
            count: 0,
            last_modified: 0,
        }
    }

    fn mark_modified(&mut self) {
        self.last_modified += 1;
    }

    fn alloc_slot(&mut self, note: Note) -> usize {
        if let Some(slot) = self.free_list.pop() {
            self.slots[slot] = Some(note);
            slot
        } else {
            self.slots.push(Some(note));
            self.slots.len() - 1
        }
    }

    /// Inserts a note that has already been checked for id collisions.
    /// Returns `false` (no-op) if the id already exists, so the hold/sub
    /// cascade can tolerate an adversarial pre-existing sub id.
    fn insert_raw(&mut self, note: Note) -> bool {
        if self.by_id.contains_key(&note.id) {
            return false;
        }
        let id = note.id.clone();
        let is_hold = note.note_type == NoteType::Hold;
        let slot = self.alloc_slot(note);

        self.primary.push(Some(slot));
        let primary_index = self.primary.len() - 1;

        let hold_index = if is_hold {
            self.hold_only.push(Some(slot));
            Some(self.hold_only.len() - 1)
        } else {
            None
        };

        self.by_id.insert(
            id,
            NoteHandle {
                slot,
                primary_index,
                hold_index,
            },
        );
        self.dirty = true;
        self.count += 1;
        true
    }

    fn release_raw(&mut self, id: &str) -> bool {
        let Some(handle) = self.by_id.remove(id) else {
            return false;
        };
        self.primary[handle.primary_index] = None;
        if let Some(hi) = handle.hold_index {
            self.hold_only[hi] = None;
        }
        self.slots[handle.slot] = None;
        self.free_list.push(handle.slot);
        self.dirty = true;
        self.count -= 1;
        true
    }

    fn note_ref(&self, slot: usize) -> &Note {
        self.slots[slot]
            .as_ref()
            .expect("slot referenced by a live index must hold a note")
    }
}

/// A pooled, indexed collection of note records supporting create /
/// delete / mutate / snapshot with ordering invariants, incremental sort,
/// and safe parallel iteration.
pub struct NoteStore {
    inner: RwLock<Inner>,
}

impl Default for NoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::new()),
        }
    }

    pub fn exists(&self, id: &str) -> bool {
        let inner = match self.inner.read() {
            Ok(g) => g,
            Err(_) => return false,
        };
        inner.by_id.contains_key(id)
    }

    /// Inserts `note` iff its id is unused. If it is a hold note with a
    /// non-empty `sub_id`, also creates the paired sub note that
    /// terminates it (the host's own create call only ever exercises this
    /// through the higher-level `create_hold` helper, but the store
    /// enforces the invariant directly so no caller can skip it).
    pub fn create(&self, note: Note) -> CoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        if inner.by_id.contains_key(&note.id) {
            return Err(CoreError::AlreadyExists(note.id));
        }
        let sub = if note.note_type == NoteType::Hold && !note.sub_id.is_empty() {
            Some(note.make_sub(note.sub_id.clone()))
        } else {
            None
        };
        inner.insert_raw(note);
        if let Some(sub) = sub {
            if !inner.insert_raw(sub) {
                log::warn!("hold's sub id collided with an existing note, skipped");
            }
        }
        inner.mark_modified();
        Ok(())
    }

    /// Convenience over [`NoteStore::create`] that assigns a fresh random
    /// id (and, for holds, a fresh sub id) before inserting.
    pub fn create_with_generated_id(&self, mut note: Note) -> CoreResult<String> {
        note.id = generate_note_id();
        if note.note_type == NoteType::Hold {
            note.sub_id = generate_note_id();
        }
        let id = note.id.clone();
        self.create(note)?;
        Ok(id)
    }

    pub fn get(&self, id: &str) -> CoreResult<Note> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        let handle = inner
            .by_id
            .get(id)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        Ok(inner.note_ref(handle.slot).clone())
    }

    /// Overwrites the note at `id` in place. Marks the store dirty only if
    /// `time` changed, since that is the only field the ordered views
    /// depend on.
    pub fn set(&self, id: &str, note: Note) -> CoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        let slot = inner
            .by_id
            .get(id)
            .map(|h| h.slot)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        let time_changed = inner.note_ref(slot).time != note.time;
        inner.slots[slot] = Some(note);
        if time_changed {
            inner.dirty = true;
        }
        inner.mark_modified();
        Ok(())
    }

    /// Decodes a wire-format note record and applies it via [`NoteStore::set`].
    /// The decoded record's own id field is ignored in favor of `id`.
    pub fn mutate_bitwise(&self, id: &str, buf: &[u8]) -> CoreResult<()> {
        let mut decoded = crate::note::codec::decode(buf)?;
        decoded.id = id.to_string();
        self.set(id, decoded)
    }

    /// Deletes the note at `id`. Deleting a hold cascades to its paired
    /// sub note.
    pub fn delete(&self, id: &str) -> CoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        let handle = inner
            .by_id
            .get(id)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        let sub_id = inner.note_ref(handle.slot).sub_id.clone();
        inner.release_raw(id);
        if !sub_id.is_empty() {
            inner.release_raw(&sub_id);
        }
        inner.mark_modified();
        Ok(())
    }

    pub fn clear(&self) {
        let mut inner = match self.inner.write() {
            Ok(g) => g,
            Err(_) => return,
        };
        *inner = Inner::new();
        inner.mark_modified();
    }

    pub fn count(&self) -> usize {
        self.inner.read().map(|g| g.count).unwrap_or(0)
    }

    pub fn last_modified_timestamp(&self) -> u64 {
        self.inner.read().map(|g| g.last_modified).unwrap_or(0)
    }

    pub fn index_of(&self, id: &str) -> CoreResult<usize> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        if inner.dirty {
            return Err(CoreError::OutOfOrder);
        }
        inner
            .by_id
            .get(id)
            .map(|h| h.primary_index)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    pub fn at(&self, index: usize) -> CoreResult<Note> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        if inner.dirty {
            return Err(CoreError::OutOfOrder);
        }
        let slot = *inner
            .primary
            .get(index)
            .ok_or_else(|| CoreError::OutOfRange {
                index,
                len: inner.primary.len(),
            })?
            .as_ref()
            .expect("post-sort primary entries are never tombstoned");
        Ok(inner.note_ref(slot).clone())
    }

    /// Returns the half-open index window `[lo, hi)` of the primary view
    /// covering `time in [lo, hi)`.
    pub fn range_by_time(&self, lo: f64, hi: f64) -> CoreResult<(usize, usize)> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        if inner.dirty {
            return Err(CoreError::OutOfOrder);
        }
        let time_at = |i: usize| inner.note_ref(inner.primary[i].unwrap()).time;
        let low = partition_point(inner.primary.len(), |i| time_at(i) < lo);
        let high = partition_point(inner.primary.len(), |i| time_at(i) < hi);
        Ok((low, high))
    }

    /// Re-establishes both ordered views. A no-op if the store is already
    /// clean. Uses a parallel sort once the primary sequence is large
    /// enough to make the work-stealing handoff worthwhile.
    pub fn sort(&self) -> CoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        if !inner.dirty {
            return Ok(());
        }

        let slots = &inner.slots;
        let time_key = |entry: &Option<usize>| -> f64 {
            match entry {
                Some(slot) => slots[*slot].as_ref().unwrap().time,
                None => f64::INFINITY,
            }
        };
        let last_time_key = |entry: &Option<usize>| -> f64 {
            match entry {
                Some(slot) => -slots[*slot].as_ref().unwrap().last_time,
                None => f64::INFINITY,
            }
        };

        let use_parallel = inner.primary.len() >= NOTES_ARRAY_PARALLEL_SORT_THRESHOLD
            && crate::executor::hardware_threads() > 1;

        if use_parallel {
            let primary = &mut inner.primary;
            let hold_only = &mut inner.hold_only;
            rayon::join(
                || primary.par_sort_by_key(|e| OrderedFloat(time_key(e))),
                || hold_only.par_sort_by_key(|e| OrderedFloat(last_time_key(e))),
            );
        } else {
            inner.primary.sort_by_key(|e| OrderedFloat(time_key(e)));
            inner
                .hold_only
                .sort_by_key(|e| OrderedFloat(last_time_key(e)));
        }

        let tombstone_start = inner.primary.iter().filter(|e| e.is_some()).count();
        inner.primary.truncate(tombstone_start);
        let hold_tombstone_start = inner.hold_only.iter().filter(|e| e.is_some()).count();
        inner.hold_only.truncate(hold_tombstone_start);

        for (i, entry) in inner.primary.clone().into_iter().enumerate() {
            let slot = entry.unwrap();
            let id = inner.note_ref(slot).id.clone();
            if let Some(handle) = inner.by_id.get_mut(&id) {
                handle.primary_index = i;
            }
        }
        for (i, entry) in inner.hold_only.clone().into_iter().enumerate() {
            let slot = entry.unwrap();
            let id = inner.note_ref(slot).id.clone();
            if let Some(handle) = inner.by_id.get_mut(&id) {
                handle.hold_index = Some(i);
            }
        }

        inner.dirty = false;
        inner.mark_modified();
        Ok(())
    }

    /// Returns a snapshot of the hold-only view (descending `last_time`),
    /// for scanning candidates that span an entire viewport window. Like
    /// [`NoteStore::at`], requires the store to be clean.
    pub fn hold_view(&self) -> CoreResult<Vec<Note>> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        if inner.dirty {
            return Err(CoreError::OutOfOrder);
        }
        Ok(inner
            .hold_only
            .iter()
            .map(|entry| inner.note_ref(entry.unwrap()).clone())
            .collect())
    }

    /// Returns an owned copy of every live note, optionally excluding sub
    /// notes (the default import/export view).
    pub fn snapshot(&self, exclude_sub: bool) -> Vec<Note> {
        let inner = match self.inner.read() {
            Ok(g) => g,
            Err(_) => return Vec::new(),
        };
        inner
            .slots
            .iter()
            .flatten()
            .filter(|n| !(exclude_sub && n.is_sub()))
            .cloned()
            .collect()
    }

    /// Invokes `visitor` once per live note under the store's write lock.
    /// The visitor may mutate notes in place; it must not call back into
    /// the store (that would deadlock on the same write lock).
    pub fn for_each(&self, mut visitor: impl FnMut(&mut Note)) -> CoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        let any_time_touched = std::cell::Cell::new(false);
        for note in inner.slots.iter_mut().flatten() {
            let before = note.time;
            visitor(note);
            if note.time != before {
                any_time_touched.set(true);
            }
        }
        if any_time_touched.get() {
            inner.dirty = true;
        }
        inner.mark_modified();
        Ok(())
    }

    /// Clones a stable snapshot of live notes under lock, releases the
    /// lock, then fans `visitor` out across the shared work-stealing pool.
    /// Concurrent mutations issued after the snapshot is taken are not
    /// visible to this call.
    pub fn for_each_parallel(&self, visitor: impl Fn(&Note) + Sync) -> CoreResult<()> {
        let snapshot = self.snapshot(false);
        crate::executor::global_pool().install(|| {
            snapshot.par_iter().for_each(|note| visitor(note));
        });
        Ok(())
    }
}

/// Smallest `i` in `0..len` such that `pred(i)` is false, given `pred` is
/// true on a prefix and false afterward (standard partition-point binary
/// search, used instead of slice::partition_point because the predicate
/// is index-keyed rather than element-keyed).
fn partition_point(len: usize, pred: impl Fn(usize) -> bool) -> usize {
    let mut lo = 0usize;
    let mut hi = len;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::NoteSide;

    fn tap(id: &str, time: f64) -> Note {
        Note {
            side: NoteSide::Center,
            note_type: NoteType::Tap,
            time,
            width: 1.0,
            position: 2.5,
            last_time: 0.0,
            begin_time: time,
            id: id.to_string(),
            sub_id: String::new(),
        }
    }

    fn hold(id: &str, sub_id: &str, time: f64, last_time: f64) -> Note {
        Note {
            side: NoteSide::Center,
            note_type: NoteType::Hold,
            time,
            width: 1.0,
            position: 2.5,
            last_time,
            begin_time: time,
            id: id.to_string(),
            sub_id: sub_id.to_string(),
        }
    }

    #[test]
    fn s1_crud_smoke() {
        let store = NoteStore::new();
        store
            .create(tap("AAAAAAAAA", 100.0))
            .expect("create succeeds");
        assert_eq!(store.count(), 1);
        assert!(store.exists("AAAAAAAAA"));
        store.sort().unwrap();
        assert_eq!(store.at(0).unwrap().time, 100.0);
        store.delete("AAAAAAAAA").unwrap();
        assert_eq!(store.count(), 0);
        assert!(!store.exists("AAAAAAAAA"));
    }

    #[test]
    fn s2_hold_pairing() {
        let store = NoteStore::new();
        store
            .create(hold("HHHHHHHHH", "SSSSSSSSS", 1000.0, 500.0))
            .unwrap();

        let with_sub = store.snapshot(false);
        let without_sub = store.snapshot(true);
        assert_eq!(without_sub.len(), 1);
        assert_eq!(with_sub.len(), 2);

        let sub = store.get("SSSSSSSSS").unwrap();
        assert_eq!(sub.note_type, NoteType::Sub);
        assert_eq!(sub.time, 1500.0);
        assert_eq!(sub.begin_time, 1000.0);
    }

    #[test]
    fn hold_delete_cascades_to_sub() {
        let store = NoteStore::new();
        store
            .create(hold("HHHHHHHHH", "SSSSSSSSS", 1000.0, 500.0))
            .unwrap();
        store.delete("HHHHHHHHH").unwrap();
        assert!(!store.exists("HHHHHHHHH"));
        assert!(!store.exists("SSSSSSSSS"));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn s3_range_query() {
        let store = NoteStore::new();
        for (i, t) in [10.0, 20.0, 30.0, 40.0, 50.0].into_iter().enumerate() {
            store.create(tap(&format!("N{i:08}"), t)).unwrap();
        }
        store.sort().unwrap();
        let (lo, hi) = store.range_by_time(15.0, 45.0).unwrap();
        let times: Vec<f64> = (lo..hi).map(|i| store.at(i).unwrap().time).collect();
        assert_eq!(times, vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn ordered_reads_fail_while_dirty() {
        let store = NoteStore::new();
        store.create(tap("AAAAAAAAA", 1.0)).unwrap();
        assert!(matches!(store.index_of("AAAAAAAAA"), Err(CoreError::OutOfOrder)));
        assert!(matches!(store.at(0), Err(CoreError::OutOfOrder)));
        assert!(matches!(
            store.range_by_time(0.0, 10.0),
            Err(CoreError::OutOfOrder)
        ));
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let store = NoteStore::new();
        store.create(tap("AAAAAAAAA", 1.0)).unwrap();
        assert!(matches!(
            store.create(tap("AAAAAAAAA", 2.0)),
            Err(CoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn s5_parallel_sort_correctness() {
        let store = NoteStore::new();
        let mut rng_state: u64 = 0x2545F4914F6CDD1D;
        let mut next = move || {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 7;
            rng_state ^= rng_state << 17;
            (rng_state % 1_000_000) as f64
        };
        for i in 0..20_000 {
            let t = next();
            store.create(tap(&format!("N{i:08}"), t)).unwrap();
        }
        store.sort().unwrap();
        assert_eq!(store.count(), 20_000);
        for i in 0..store.count() - 1 {
            assert!(store.at(i).unwrap().time <= store.at(i + 1).unwrap().time);
        }

        let visited = std::sync::Mutex::new(std::collections::HashSet::new());
        store
            .for_each_parallel(|note| {
                visited.lock().unwrap().insert(note.id.clone());
            })
            .unwrap();
        assert_eq!(visited.into_inner().unwrap().len(), 20_000);
    }

    #[test]
    fn snapshot_isolation_ignores_inserts_after_the_call_begins() {
        let store = NoteStore::new();
        store.create(tap("AAAAAAAAA", 1.0)).unwrap();
        let snapshot = store.snapshot(false);
        store.create(tap("BBBBBBBBB", 2.0)).unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn sort_is_idempotent() {
        let store = NoteStore::new();
        for (i, t) in [5.0, 3.0, 4.0, 1.0, 2.0].into_iter().enumerate() {
            store.create(tap(&format!("N{i:08}"), t)).unwrap();
        }
        store.sort().unwrap();
        let first: Vec<f64> = (0..5).map(|i| store.at(i).unwrap().time).collect();
        store.sort().unwrap();
        let second: Vec<f64> = (0..5).map(|i| store.at(i).unwrap().time).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn mutate_bitwise_round_trips_through_codec() {
        let store = NoteStore::new();
        store.create(tap("AAAAAAAAA", 1.0)).unwrap();
        let mut note = store.get("AAAAAAAAA").unwrap();
        note.time = 42.0;
        let mut buf = vec![0u8; crate::note::codec::encoded_len(&note)];
        crate::note::codec::encode(&note, &mut buf).unwrap();
        store.mutate_bitwise("AAAAAAAAA", &buf).unwrap();
        assert_eq!(store.get("AAAAAAAAA").unwrap().time, 42.0);
    }
}

//! The Activation Engine: given current time and scroll speed, computes
//! the three windows of notes relevant to rendering right now.
//!
//! Grounded in `original_source/DyCore/src/note/activation.cpp`'s
//! `NoteActivationManager`, the revision that already separates
//! `activeHolds` and `lastingHolds` from `activeNotes`.

use std::sync::RwLock;

use ordered_float::OrderedFloat;

use crate::error::{lock_poisoned, CoreResult};
use crate::layout::LayoutConstants;
use crate::note::{NoteSide, NoteStore, NoteType};

/// `(time, id)` pairs in ascending time order, deduplicated by id.
pub type ActiveList = Vec<(f64, String)>;

struct State {
    current_time: f64,
    speed: f64,
    wide: (f64, f64),
    narrow: (f64, f64),
    active_notes: ActiveList,
    active_holds: ActiveList,
    lasting_holds: ActiveList,
}

impl State {
    fn new() -> Self {
        Self {
            current_time: 0.0,
            speed: 1.0,
            wide: (0.0, 0.0),
            narrow: (0.0, 0.0),
            active_notes: Vec::new(),
            active_holds: Vec::new(),
            lasting_holds: Vec::new(),
        }
    }
}

pub struct ActivationEngine {
    layout: LayoutConstants,
    state: RwLock<State>,
}

impl ActivationEngine {
    pub fn new(layout: LayoutConstants) -> Self {
        Self {
            layout,
            state: RwLock::new(State::new()),
        }
    }

    /// Derives the wide and narrow viewport windows from `(current_time,
    /// speed)` and the layout constants. Does not touch the active lists
    /// themselves; call [`ActivationEngine::recalculate`] to refresh them.
    pub fn set_range(&self, current_time: f64, speed: f64) -> CoreResult<()> {
        let mut state = self.state.write().map_err(|_| lock_poisoned())?;
        state.current_time = current_time;
        state.speed = speed;

        let l = &self.layout;
        let wide_span = (l.activation_ahead_pixels
            + (l.base_res_h - l.judge_line_below_from_bottom)
                .max(l.base_res_w / 2.0 - l.judge_line_side_from_edge))
            / speed;
        let narrow_span = (l.base_res_h - l.judge_line_below_from_bottom)
            .min(l.base_res_w / 2.0 - l.judge_line_side_from_edge)
            / speed;

        state.wide = (current_time, current_time + wide_span);
        state.narrow = (current_time, current_time + narrow_span);
        Ok(())
    }

    /// Rebuilds `active_notes`, `active_holds`, and `lasting_holds` from
    /// the note store's current contents. Sorts `store` first.
    pub fn recalculate(&self, store: &NoteStore) -> CoreResult<()> {
        store.sort()?;

        let mut state = self.state.write().map_err(|_| lock_poisoned())?;
        state.active_notes.clear();
        state.active_holds.clear();
        state.lasting_holds.clear();

        let (wide_lo, wide_hi) = state.wide;
        let (narrow_lo, narrow_hi) = state.narrow;
        let current_time = state.current_time;
        let speed = state.speed;
        let side_limit = wide_lo + (self.layout.base_res_w / 2.0 - self.layout.judge_line_side_from_edge) / speed;

        let (lo, hi) = store.range_by_time(wide_lo, wide_hi)?;
        for i in lo..hi {
            let note = store.at(i)?;
            if note.side != NoteSide::Center && note.time > side_limit {
                continue;
            }
            match note.note_type {
                NoteType::Tap | NoteType::Chain | NoteType::Hold => {
                    state.active_notes.push((note.time, note.id.clone()));
                    if note.note_type == NoteType::Hold {
                        state.active_holds.push((note.time, note.id));
                    }
                }
                NoteType::Sub => {
                    state
                        .active_notes
                        .push((note.begin_time, note.id.clone()));
                    state
                        .active_holds
                        .push((note.begin_time, note.id.clone()));
                    if note.begin_time < current_time {
                        state.lasting_holds.push((note.begin_time, note.id));
                    }
                }
            }
        }

        for note in store.hold_view()? {
            if note.last_time < narrow_hi - narrow_lo {
                break;
            }
            if note.time <= narrow_lo && note.time + note.last_time > narrow_hi {
                state.active_notes.push((note.time, note.id.clone()));
                state.active_holds.push((note.time, note.id.clone()));
                state.lasting_holds.push((note.time, note.id));
            }
        }

        dedup_and_sort(&mut state.active_notes);
        dedup_and_sort(&mut state.active_holds);
        dedup_and_sort(&mut state.lasting_holds);
        Ok(())
    }

    pub fn active_notes(&self) -> ActiveList {
        self.state
            .read()
            .map(|s| s.active_notes.clone())
            .unwrap_or_default()
    }

    pub fn active_holds(&self) -> ActiveList {
        self.state
            .read()
            .map(|s| s.active_holds.clone())
            .unwrap_or_default()
    }

    pub fn lasting_holds(&self) -> ActiveList {
        self.state
            .read()
            .map(|s| s.lasting_holds.clone())
            .unwrap_or_default()
    }
}

fn dedup_and_sort(list: &mut ActiveList) {
    list.sort_by_key(|(time, id)| (OrderedFloat(*time), id.clone()));
    list.dedup();
    list.sort_by_key(|(time, _)| OrderedFloat(*time));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Note;

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
    fn s4_wide_window_picks_up_upcoming_notes() {
        let store = NoteStore::new();
        store.create(tap("AAAAAAAAA", 100.0)).unwrap();
        store.create(tap("BBBBBBBBB", 100_000.0)).unwrap();

        let engine = ActivationEngine::new(LayoutConstants::default());
        engine.set_range(0.0, 1.0).unwrap();
        engine.recalculate(&store).unwrap();

        let ids: Vec<String> = engine.active_notes().into_iter().map(|(_, id)| id).collect();
        assert!(ids.contains(&"AAAAAAAAA".to_string()));
        assert!(!ids.contains(&"BBBBBBBBB".to_string()));
    }

    #[test]
    fn lasting_hold_spans_the_viewport() {
        let store = NoteStore::new();
        store
            .create(hold("HHHHHHHHH", "SSSSSSSSS", -5000.0, 20_000.0))
            .unwrap();

        let engine = ActivationEngine::new(LayoutConstants::default());
        engine.set_range(0.0, 1.0).unwrap();
        engine.recalculate(&store).unwrap();

        let lasting = engine.lasting_holds();
        assert!(lasting.iter().any(|(_, id)| id == "HHHHHHHHH"));
        let holds = engine.active_holds();
        assert!(holds.iter().any(|(_, id)| id == "HHHHHHHHH"));
    }

    #[test]
    fn active_lists_are_deduplicated_and_time_sorted() {
        let store = NoteStore::new();
        store.create(tap("AAAAAAAAA", 50.0)).unwrap();
        store.create(tap("BBBBBBBBB", 10.0)).unwrap();

        let engine = ActivationEngine::new(LayoutConstants::default());
        engine.set_range(0.0, 1.0).unwrap();
        engine.recalculate(&store).unwrap();

        let notes = engine.active_notes();
        let times: Vec<f64> = notes.iter().map(|(t, _)| *t).collect();
        let mut sorted = times.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(times, sorted);
    }
}

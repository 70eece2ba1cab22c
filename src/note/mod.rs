//! Note records and the identity/id-generation rules around them.

pub mod codec;
pub mod store;

use rand::distr::{Alphanumeric, SampleString};

use crate::layout::NOTE_ID_LENGTH;

pub use store::NoteStore;

/// Which judgement lane a note belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum NoteSide {
    Center = 0,
    Left = 1,
    Right = 2,
}

impl NoteSide {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(NoteSide::Center),
            1 => Some(NoteSide::Left),
            2 => Some(NoteSide::Right),
            _ => None,
        }
    }
}

/// The four note kinds. `Sub` notes only ever exist to terminate a hold
/// and are never returned from user-facing snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum NoteType {
    Tap = 0,
    Chain = 1,
    Hold = 2,
    Sub = 3,
}

impl NoteType {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(NoteType::Tap),
            1 => Some(NoteType::Chain),
            2 => Some(NoteType::Hold),
            3 => Some(NoteType::Sub),
            _ => None,
        }
    }
}

/// A point event in chart time on one of three judgement lanes.
///
/// `id` is the primary identity; `(side, type, time, width, position)`
/// describe where and how it is drawn. Hold notes carry `sub_id`, the id
/// of the paired `Sub` note that marks where the hold ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub side: NoteSide,
    pub note_type: NoteType,
    pub time: f64,
    pub width: f64,
    pub position: f64,
    pub last_time: f64,
    pub begin_time: f64,
    pub id: String,
    pub sub_id: String,
}

impl Note {
    pub fn is_hold(&self) -> bool {
        self.note_type == NoteType::Hold
    }

    pub fn is_sub(&self) -> bool {
        self.note_type == NoteType::Sub
    }

    /// The paired sub note for a hold: same side/width/position, `time`
    /// equal to the hold's end time, zero duration, `begin_time` equal to
    /// the hold's start.
    pub fn make_sub(&self, sub_id: String) -> Note {
        Note {
            side: self.side,
            note_type: NoteType::Sub,
            time: self.time + self.last_time,
            width: self.width,
            position: self.position,
            last_time: 0.0,
            begin_time: self.time,
            id: sub_id,
            sub_id: String::new(),
        }
    }
}

/// Generates a random opaque identifier of [`NOTE_ID_LENGTH`] characters.
pub fn generate_note_id() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), NOTE_ID_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_have_fixed_length() {
        let id = generate_note_id();
        assert_eq!(id.len(), NOTE_ID_LENGTH);
    }

    #[test]
    fn make_sub_mirrors_hold_geometry() {
        let hold = Note {
            side: NoteSide::Left,
            note_type: NoteType::Hold,
            time: 1000.0,
            width: 1.5,
            position: 2.5,
            last_time: 500.0,
            begin_time: 1000.0,
            id: "HHHHHHHHH".to_string(),
            sub_id: "SSSSSSSSS".to_string(),
        };
        let sub = hold.make_sub("SSSSSSSSS".to_string());
        assert_eq!(sub.note_type, NoteType::Sub);
        assert_eq!(sub.time, 1500.0);
        assert_eq!(sub.begin_time, 1000.0);
        assert_eq!(sub.last_time, 0.0);
        assert_eq!(sub.side, hold.side);
        assert_eq!(sub.width, hold.width);
        assert_eq!(sub.position, hold.position);
    }
}

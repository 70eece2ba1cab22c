//! Wire encoding of a [`Note`] record: the fixed field order from the
//! external interface contract —
//! `side, type, time, width, position, last_time, begin_time, id, sub_id`.

use crate::bitio::{Reader, Writer};
use crate::error::{CoreError, CoreResult};
use crate::note::{Note, NoteSide, NoteType};

/// Size of a note record once all variable-length fields (the two ids)
/// are accounted for.
pub fn encoded_len(note: &Note) -> usize {
    4 + 4 + 8 * 5 + (note.id.len() + 1) + (note.sub_id.len() + 1)
}

pub fn encode(note: &Note, buf: &mut [u8]) -> CoreResult<usize> {
    let mut w = Writer::new(buf);
    w.write_i32(note.side as i32)?;
    w.write_i32(note.note_type as i32)?;
    w.write_f64(note.time)?;
    w.write_f64(note.width)?;
    w.write_f64(note.position)?;
    w.write_f64(note.last_time)?;
    w.write_f64(note.begin_time)?;
    w.write_cstring(&note.id)?;
    w.write_cstring(&note.sub_id)?;
    Ok(w.written())
}

pub fn decode(buf: &[u8]) -> CoreResult<Note> {
    let mut r = Reader::new(buf);
    let side = NoteSide::from_i32(r.read_i32()?)
        .ok_or_else(|| CoreError::DecodeError("invalid side".to_string()))?;
    let note_type = NoteType::from_i32(r.read_i32()?)
        .ok_or_else(|| CoreError::DecodeError("invalid type".to_string()))?;
    let time = r.read_f64()?;
    let width = r.read_f64()?;
    let position = r.read_f64()?;
    let last_time = r.read_f64()?;
    let begin_time = r.read_f64()?;
    let id = r.read_cstring()?;
    let sub_id = r.read_cstring()?;
    Ok(Note {
        side,
        note_type,
        time,
        width,
        position,
        last_time,
        begin_time,
        id,
        sub_id,
    })
}

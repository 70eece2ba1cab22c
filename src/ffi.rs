//! The host-facing facade: one `Core` bundling every component, with
//! thin wrappers that move data across the `&mut [u8]` boundary using
//! the wire formats from [`crate::bitio`] and [`crate::external`].
//!
//! Grounded in `original_source/src/note/noteExport.cpp` and its
//! sibling `timingAPI.cpp`/`renderAPI.cpp`: one call per CRUD/read-out
//! operation, buffers supplied by the caller, no allocation crossing the
//! boundary.

use crate::activation::ActivationEngine;
use crate::bitio::Writer;
use crate::emission::{EmissionPipeline, Pass};
use crate::error::CoreResult;
use crate::layout::LayoutConstants;
use crate::note::{codec, NoteStore};
use crate::sprite::SpriteCatalog;
use crate::timing::TimingStore;

/// Every stateful component, constructed together so a host only needs
/// one handle.
pub struct Core {
    pub notes: NoteStore,
    pub timing: TimingStore,
    pub activation: ActivationEngine,
    pub sprites: SpriteCatalog,
    pub emission: EmissionPipeline,
}

impl Core {
    pub fn new(layout: LayoutConstants) -> Self {
        Self {
            notes: NoteStore::new(),
            timing: TimingStore::new(),
            activation: ActivationEngine::new(layout),
            sprites: SpriteCatalog::new(),
            emission: EmissionPipeline::new(layout),
        }
    }

    /// Decodes a wire-format note record and inserts it.
    pub fn insert_note_bitwise(&self, buf: &[u8]) -> CoreResult<()> {
        let note = codec::decode(buf)?;
        self.notes.create(note)
    }

    /// Writes the note at `id` in wire format into `buf`.
    pub fn get_note_bitwise(&self, id: &str, buf: &mut [u8]) -> CoreResult<usize> {
        let note = self.notes.get(id)?;
        codec::encode(&note, buf)
    }

    /// Writes the note at ordered index `index` in wire format into `buf`.
    pub fn get_note_at_index_bitwise(&self, index: usize, buf: &mut [u8]) -> CoreResult<usize> {
        let note = self.notes.at(index)?;
        codec::encode(&note, buf)
    }

    /// Re-runs `set_range` + `recalculate` for the current note store
    /// state.
    pub fn recalculate_activation(&self, now: f64, speed: f64) -> CoreResult<()> {
        self.activation.set_range(now, speed)?;
        self.activation.recalculate(&self.notes)
    }

    /// Writes the active-notes buffer: `i32 count` then `count` cstrings
    /// (the ids), in ascending-time order.
    pub fn write_active_notes(&self, buf: &mut [u8]) -> CoreResult<usize> {
        write_id_list(&self.activation.active_notes(), buf)
    }

    /// Writes the lasting-holds buffer in the same format as
    /// [`Core::write_active_notes`].
    pub fn write_lasting_holds(&self, buf: &mut [u8]) -> CoreResult<usize> {
        write_id_list(&self.activation.lasting_holds(), buf)
    }

    /// Upper bound in bytes for [`Core::write_active_notes`] /
    /// [`Core::write_lasting_holds`], including the leading `i32` count
    /// field both writers emit.
    pub fn active_list_bitwrite_bound(&self) -> usize {
        4 + (crate::layout::NOTE_ID_LENGTH + 1) * self.activation.active_notes().len()
    }

    pub fn render_pass(&mut self, pass: u8, now: f64, speed: f64, buf: &mut [u8]) -> CoreResult<usize> {
        let pass = Pass::from_u8(pass)?;
        self.emission.render(pass, &self.notes, &self.activation, &self.sprites, now, speed, buf)
    }

    pub fn vertex_buffer_bound(&self) -> CoreResult<usize> {
        self.emission.vertex_buffer_bound(&self.activation, &self.sprites)
    }
}

fn write_id_list(list: &[(f64, String)], buf: &mut [u8]) -> CoreResult<usize> {
    let mut w = Writer::new(buf);
    w.write_i32(list.len() as i32)?;
    for (_, id) in list {
        w.write_cstring(id)?;
    }
    Ok(w.written())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{Note, NoteSide, NoteType};
    use crate::sprite::{DrawSetting, Sprite};

    fn populate_sprites(sprites: &SpriteCatalog) {
        for name in ["sprNote", "sprChain", "sprHoldEdge", "sprHold", "sprHoldGrey"] {
            sprites
                .insert(Sprite::new(name, (32.0, 32.0), (0.0, 0.0), (0.1, 0.1), 0.0, 0.0, 0.0, DrawSetting::Normal))
                .unwrap();
        }
    }

    #[test]
    fn round_trips_a_note_through_the_facade() {
        let core = Core::new(LayoutConstants::default());
        let note = Note {
            side: NoteSide::Center,
            note_type: NoteType::Tap,
            time: 10.0,
            width: 1.0,
            position: 2.5,
            last_time: 0.0,
            begin_time: 10.0,
            id: "AAAAAAAAA".to_string(),
            sub_id: String::new(),
        };
        let mut buf = vec![0u8; codec::encoded_len(&note)];
        codec::encode(&note, &mut buf).unwrap();
        core.insert_note_bitwise(&buf).unwrap();

        let mut out = vec![0u8; 256];
        let written = core.get_note_bitwise("AAAAAAAAA", &mut out).unwrap();
        let decoded = codec::decode(&out[..written]).unwrap();
        assert_eq!(decoded.id, "AAAAAAAAA");
    }

    #[test]
    fn renders_a_full_frame_through_the_facade() {
        let mut core = Core::new(LayoutConstants::default());
        populate_sprites(&core.sprites);
        core.notes
            .create(Note {
                side: NoteSide::Center,
                note_type: NoteType::Tap,
                time: 100.0,
                width: 1.0,
                position: 2.5,
                last_time: 0.0,
                begin_time: 100.0,
                id: "AAAAAAAAA".to_string(),
                sub_id: String::new(),
            })
            .unwrap();

        core.recalculate_activation(0.0, 1.0).unwrap();
        let bound = core.vertex_buffer_bound().unwrap();
        let mut buf = vec![0u8; bound];
        let written = core.render_pass(2, 0.0, 1.0, &mut buf).unwrap();
        assert!(written > 0);

        let mut active_buf = vec![0u8; core.active_list_bitwrite_bound()];
        let written = core.write_active_notes(&mut active_buf).unwrap();
        assert!(written > 0);
    }
}

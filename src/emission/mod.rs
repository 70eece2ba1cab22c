//! The Emission Pipeline: turns the Activation Engine's active lists
//! into packed vertex bytes across three independent render passes.
//!
//! Grounded in `original_source/DyCore/src/render/render.cpp`
//! (`render_active_notes`, `get_vertex_buffer_bound`).

pub mod draw;
pub mod geometry;

use rayon::prelude::*;

use crate::activation::ActivationEngine;
use crate::error::{CoreError, CoreResult};
use crate::layout::{LayoutConstants, MULTITHREAD_RENDERING_THRESHOLD};
use crate::note::{Note, NoteSide, NoteStore, NoteType};
use crate::sprite::SpriteCatalog;
use draw::{draw_sprite, Pivot, Vertex};

const SPRITE_TAP: &str = "sprNote";
const SPRITE_CHAIN: &str = "sprChain";
const SPRITE_HOLD_EDGE: &str = "sprHoldEdge";
const SPRITE_HOLD_BAR: &str = "sprHold";
const SPRITE_HOLD_BG: &str = "sprHoldGrey";

/// Which render pass is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    LastingHoldBackgrounds = 0,
    HoldBars = 1,
    EdgesTapsChains = 2,
}

impl Pass {
    pub fn from_u8(v: u8) -> CoreResult<Self> {
        match v {
            0 => Ok(Pass::LastingHoldBackgrounds),
            1 => Ok(Pass::HoldBars),
            2 => Ok(Pass::EdgesTapsChains),
            other => Err(CoreError::Invalid(format!("unknown render pass {other}"))),
        }
    }
}

/// Render-pass selector for hold geometry: distinguishes the three ways
/// a hold's bar/edge rectangle gets drawn.
#[derive(Clone, Copy, PartialEq, Eq)]
enum HoldRenderType {
    AdditionBg,
    Bg,
    Edge,
}

/// `max((side == Center ? width*300 : width*150) - 30 + sprite.padding_lr,
/// sprite.size.x)`, shared by `render_normal` and `render_hold` so both
/// draw at the same note width for a given sprite.
fn note_pixel_width(note: &Note, sprite: &crate::sprite::Sprite) -> f64 {
    let width_term = match note.side {
        NoteSide::Center => note.width * 300.0,
        _ => note.width * 150.0,
    };
    (width_term - 30.0 + sprite.padding_lr).max(sprite.size.0)
}

fn vertices_to_bytes(vertices: &[Vertex], buf: &mut [u8]) -> CoreResult<usize> {
    let bytes = bytemuck::cast_slice(vertices);
    if bytes.len() > buf.len() {
        return Err(CoreError::BufferTooSmall {
            required: bytes.len(),
            available: buf.len(),
        });
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}

/// Writes packed vertex bytes for one render pass at a time. Takes
/// `&mut self` so two pass-2 invocations on the same pipeline can never
/// overlap (concurrent callers must use separate pipeline instances).
pub struct EmissionPipeline {
    layout: LayoutConstants,
}

impl EmissionPipeline {
    pub fn new(layout: LayoutConstants) -> Self {
        Self { layout }
    }

    fn render_normal(&self, note: &Note, now: f64, speed: f64, sprites: &SpriteCatalog) -> CoreResult<Vec<Vertex>> {
        let sprite_name = if note.note_type == NoteType::Tap { SPRITE_TAP } else { SPRITE_CHAIN };
        let sprite = sprites.get(sprite_name)?;
        let pos = geometry::note_pos(note.side, note.time, note.position, now, speed, &self.layout);
        let alpha = geometry::note_alpha(note.side, pos, &self.layout);
        let rotation = geometry::note_rotation(note.side);

        let size = (note_pixel_width(note, &sprite), sprite.size.1);

        let mut out = Vec::new();
        draw_sprite(&mut out, &sprite, Pivot::Center, pos, size, rotation, [255, 255, 255, (alpha * 255.0) as u8]);
        Ok(out)
    }

    fn render_hold(
        &self,
        note: &Note,
        now: f64,
        speed: f64,
        sprites: &SpriteCatalog,
        render_type: HoldRenderType,
    ) -> CoreResult<Vec<Vertex>> {
        let edge_sprite = sprites.get(SPRITE_HOLD_EDGE)?;
        let bar_sprite = sprites.get(SPRITE_HOLD_BAR)?;
        let bg_sprite = sprites.get(SPRITE_HOLD_BG)?;
        let tile_h = bar_sprite.size.1;

        let mut position = geometry::note_pos(note.side, note.time, note.position, now, speed, &self.layout);
        let alpha = geometry::note_alpha(note.side, position, &self.layout);
        let rotation = geometry::note_rotation(note.side);

        let mut edge_length = (speed * (note.time + note.last_time - note.time.max(now))
            + edge_sprite.padding_bottom
            + edge_sprite.padding_top)
            .max(0.0);
        if edge_length < edge_sprite.size.1 && note.time < now {
            return Ok(Vec::new());
        }
        edge_length = edge_length.max(edge_sprite.size.1);
        let mut bar_length = edge_length - edge_sprite.padding_top - edge_sprite.padding_bottom;

        let is_vertical = note.side == NoteSide::Center;
        let screen_dim = if is_vertical { self.layout.base_res_h } else { self.layout.base_res_w };

        let max_length_threshold = screen_dim + 2.0 * tile_h;
        if bar_length > max_length_threshold {
            let excess = ((bar_length - max_length_threshold) / tile_h).floor() * tile_h;
            bar_length -= excess;
        }
        edge_length = (bar_length + edge_sprite.padding_top + edge_sprite.padding_bottom)
            .min(screen_dim + 3.0 * tile_h);

        match note.side {
            NoteSide::Center => position.1 = position.1.min(self.layout.base_res_h - self.layout.judge_line_below_from_bottom),
            NoteSide::Left => position.0 = position.0.max(self.layout.judge_line_side_from_edge),
            NoteSide::Right => position.0 = position.0.min(self.layout.base_res_w - self.layout.judge_line_side_from_edge),
        }

        let pixel_width = note_pixel_width(note, &edge_sprite);

        let mut out = Vec::new();
        match render_type {
            HoldRenderType::AdditionBg | HoldRenderType::Bg => {
                if bar_length > 0.0 {
                    let size = (pixel_width - edge_sprite.padding_lr, bar_length);
                    if note.side == NoteSide::Center {
                        position.1 -= size.1;
                    } else {
                        position.0 += size.1 * if note.side == NoteSide::Left { 1.0 } else { -1.0 };
                    }
                    let color_alpha = (alpha * 255.0) as u8;
                    if render_type == HoldRenderType::Bg {
                        draw_sprite(&mut out, &bar_sprite, Pivot::TopCenter, position, size, rotation, [255, 255, 255, color_alpha]);
                    } else {
                        let dimmed = (alpha * 255.0 * self.layout.hold_bg_lightness) as u8;
                        draw_sprite(&mut out, &bg_sprite, Pivot::TopCenter, position, size, rotation, [0, 255, 0, dimmed]);
                    }
                }
            }
            HoldRenderType::Edge => {
                if edge_length > 0.0 {
                    let size = (pixel_width, edge_length);
                    if note.side == NoteSide::Center {
                        position.1 += edge_sprite.padding_bottom;
                    } else {
                        position.0 += edge_sprite.padding_bottom * if note.side == NoteSide::Left { -1.0 } else { 1.0 };
                    }
                    draw_sprite(&mut out, &edge_sprite, Pivot::BottomCenter, position, size, rotation, [255, 255, 255, (alpha * 255.0) as u8]);
                }
            }
        }
        Ok(out)
    }

    /// Statically computable upper bound on bytes any single call to
    /// [`EmissionPipeline::render`] may write, across all three passes.
    pub fn vertex_buffer_bound(&self, activation: &ActivationEngine, sprites: &SpriteCatalog) -> CoreResult<usize> {
        let active_notes = activation.active_notes();
        let active_holds = activation.active_holds();
        let lasting_holds = activation.lasting_holds();

        let bg_bytes = sprites.get(SPRITE_HOLD_BG)?.max_bytes(&self.layout);
        let bar_bytes = sprites.get(SPRITE_HOLD_BAR)?.max_bytes(&self.layout);
        let edge_bytes = sprites.get(SPRITE_HOLD_EDGE)?.max_bytes(&self.layout);
        let tap_bytes = sprites.get(SPRITE_TAP)?.max_bytes(&self.layout).max(sprites.get(SPRITE_CHAIN)?.max_bytes(&self.layout));

        let mut bound = lasting_holds.len() * bg_bytes;
        bound += active_holds.len() * bar_bytes;
        bound += active_holds.len() * edge_bytes;
        bound += active_notes.len().saturating_sub(active_holds.len()) * tap_bytes;
        bound += 1024 * crate::layout::BYTES_PER_QUAD;
        Ok(bound)
    }

    /// Renders one pass into `buf`, returning the number of bytes
    /// written. Passes are independent; callers invoke 0, 1, 2 in order
    /// into separate regions of the same buffer.
    pub fn render(
        &mut self,
        pass: Pass,
        store: &NoteStore,
        activation: &ActivationEngine,
        sprites: &SpriteCatalog,
        now: f64,
        speed: f64,
        buf: &mut [u8],
    ) -> CoreResult<usize> {
        match pass {
            Pass::LastingHoldBackgrounds => {
                let mut out = Vec::new();
                for (_, id) in activation.lasting_holds() {
                    if let Ok(note) = store.get(&id) {
                        match self.render_hold(&note, now, speed, sprites, HoldRenderType::AdditionBg) {
                            Ok(v) => out.extend(v),
                            Err(e) => log::warn!("emission pass 0 dropped note {id}: {e}"),
                        }
                    }
                }
                vertices_to_bytes(&out, buf)
            }
            Pass::HoldBars => {
                let mut out = Vec::new();
                for (_, id) in activation.active_holds() {
                    if let Ok(note) = store.get(&id) {
                        match self.render_hold(&note, now, speed, sprites, HoldRenderType::Bg) {
                            Ok(v) => out.extend(v),
                            Err(e) => log::warn!("emission pass 1 dropped note {id}: {e}"),
                        }
                    }
                }
                vertices_to_bytes(&out, buf)
            }
            Pass::EdgesTapsChains => self.render_pass_2(store, activation, sprites, now, speed, buf),
        }
    }

    fn render_pass_2(
        &self,
        store: &NoteStore,
        activation: &ActivationEngine,
        sprites: &SpriteCatalog,
        now: f64,
        speed: f64,
        buf: &mut [u8],
    ) -> CoreResult<usize> {
        let active_notes = activation.active_notes();
        let active_holds = activation.active_holds();
        let threads = crate::executor::hardware_threads();
        let multithread = active_notes.len() > MULTITHREAD_RENDERING_THRESHOLD && threads > 1;

        let edges = self.render_hold_edges(store, &active_holds, now, speed, sprites, multithread, threads);
        let taps = self.render_plain_notes(store, &active_notes, NoteType::Tap, now, speed, sprites, multithread, threads);
        let chains = self.render_plain_notes(store, &active_notes, NoteType::Chain, now, speed, sprites, multithread, threads);

        let mut out = edges;
        out.extend(taps);
        out.extend(chains);
        vertices_to_bytes(&out, buf)
    }

    fn render_hold_edges(
        &self,
        store: &NoteStore,
        list: &[(f64, String)],
        now: f64,
        speed: f64,
        sprites: &SpriteCatalog,
        multithread: bool,
        threads: usize,
    ) -> Vec<Vertex> {
        let render_one = |id: &str| -> Vec<Vertex> {
            match store.get(id).ok().filter(|n| n.note_type == NoteType::Hold) {
                Some(note) => self
                    .render_hold(&note, now, speed, sprites, HoldRenderType::Edge)
                    .unwrap_or_else(|e| {
                        log::warn!("emission pass 2 dropped hold edge {id}: {e}");
                        Vec::new()
                    }),
                None => Vec::new(),
            }
        };
        self.dispatch(list, threads, multithread, render_one)
    }

    fn render_plain_notes(
        &self,
        store: &NoteStore,
        list: &[(f64, String)],
        want_type: NoteType,
        now: f64,
        speed: f64,
        sprites: &SpriteCatalog,
        multithread: bool,
        threads: usize,
    ) -> Vec<Vertex> {
        let render_one = |id: &str| -> Vec<Vertex> {
            match store.get(id).ok().filter(|n| n.note_type == want_type) {
                Some(note) => self.render_normal(&note, now, speed, sprites).unwrap_or_else(|e| {
                    log::warn!("emission pass 2 dropped note {id}: {e}");
                    Vec::new()
                }),
                None => Vec::new(),
            }
        };
        self.dispatch(list, threads, multithread, render_one)
    }

    /// Partitions `list` into `threads` contiguous blocks and renders
    /// each through `render_one`, in parallel when `multithread`,
    /// concatenating results in ascending block (== time) order.
    fn dispatch(
        &self,
        list: &[(f64, String)],
        threads: usize,
        multithread: bool,
        render_one: impl Fn(&str) -> Vec<Vertex> + Sync,
    ) -> Vec<Vertex> {
        if list.is_empty() {
            return Vec::new();
        }
        if !multithread {
            return list.iter().flat_map(|(_, id)| render_one(id)).collect();
        }

        let block_size = list.len().div_ceil(threads).max(1);
        let blocks: Vec<&[(f64, String)]> = list.chunks(block_size).collect();
        crate::executor::global_pool().install(|| {
            blocks
                .par_iter()
                .map(|block| block.iter().flat_map(|(_, id)| render_one(id)).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        })
        .into_iter()
        .flatten()
        .collect()
    }
}

//! Layout constants: the core's "wire" to its renderer.
//!
//! These are treated as host-tunable data (see [`crate::config`]) but the
//! defaults here reproduce the original fixed values exactly.

/// A fixed identifier length for generated note/sub ids.
pub const NOTE_ID_LENGTH: usize = 9;

/// Primary sequence size at which the note store switches to a parallel
/// sort.
pub const NOTES_ARRAY_PARALLEL_SORT_THRESHOLD: usize = 10_000;

/// Active-note count at which pass 2 of the emission pipeline fans out
/// across worker threads.
pub const MULTITHREAD_RENDERING_THRESHOLD: usize = 10_000;

/// Bytes per emitted quad: 6 vertices * 20 bytes/vertex.
pub const BYTES_PER_QUAD: usize = 120;

/// Resolution and judgement-line geometry the activation/emission math is
/// defined in terms of.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConstants {
    pub base_res_w: f64,
    pub base_res_h: f64,
    pub judge_line_below_from_bottom: f64,
    pub judge_line_side_from_edge: f64,
    pub activation_ahead_pixels: f64,
    pub hold_bg_lightness: f64,
}

impl Default for LayoutConstants {
    fn default() -> Self {
        Self {
            base_res_w: 1920.0,
            base_res_h: 1080.0,
            judge_line_below_from_bottom: 200.0,
            judge_line_side_from_edge: 250.0,
            activation_ahead_pixels: 100.0,
            hold_bg_lightness: 0.3,
        }
    }
}

//! Pure geometric transforms shared by every draw routine in the
//! Emission Pipeline.
//!
//! Grounded in `original_source/DyCore/src/render/render.cpp`
//! (`pos_to_horzPos`, `time_to_vertPos`, `get_note_pos`, `get_note_alpha`,
//! `get_note_rotation`).

use crate::layout::LayoutConstants;
use crate::note::NoteSide;

/// Maps a lane position to the on-axis screen coordinate. Centre-side
/// notes use a 300px-per-unit scale around the horizontal midline; L/R
/// side notes use 150px-per-unit around the vertical midline.
pub fn pos_to_horizontal(pos: f64, side: NoteSide, layout: &LayoutConstants) -> f64 {
    match side {
        NoteSide::Center => layout.base_res_w / 2.0 + (pos - 2.5) * 300.0,
        _ => layout.base_res_h / 2.0 + (2.5 - pos) * 150.0,
    }
}

/// Maps `(time, side)` to the off-axis screen coordinate, moving toward
/// the judgement line as `time` approaches `now`.
pub fn time_to_vertical(
    time: f64,
    now: f64,
    speed: f64,
    side: NoteSide,
    layout: &LayoutConstants,
) -> f64 {
    match side {
        NoteSide::Center => {
            layout.base_res_h - layout.judge_line_below_from_bottom - (time - now) * speed
        }
        NoteSide::Left | NoteSide::Right => {
            let direction = if side == NoteSide::Left { -1.0 } else { 1.0 };
            layout.base_res_w / 2.0
                + direction * (layout.base_res_w / 2.0 - speed * (time - now) - layout.judge_line_side_from_edge)
        }
    }
}

/// Full screen position of a note given its `(side, time, position)`.
pub fn note_pos(
    side: NoteSide,
    time: f64,
    position: f64,
    now: f64,
    speed: f64,
    layout: &LayoutConstants,
) -> (f64, f64) {
    if side == NoteSide::Center {
        (
            pos_to_horizontal(position, side, layout),
            time_to_vertical(time, now, speed, side, layout),
        )
    } else {
        (
            time_to_vertical(time, now, speed, side, layout),
            pos_to_horizontal(position, side, layout),
        )
    }
}

/// L/R notes fade linearly with distance from the centreline, clamped to
/// `[0.25, 1.0]`; centre notes are always fully opaque.
pub fn note_alpha(side: NoteSide, pos: (f64, f64), layout: &LayoutConstants) -> f64 {
    if side == NoteSide::Center {
        1.0
    } else {
        let t = (pos.0 - layout.base_res_w / 2.0).abs() / (0.3 * layout.base_res_w);
        (0.25 + t * (1.0 - 0.25)).clamp(0.25, 1.0)
    }
}

/// Rotation in degrees applied about the sprite's own centre.
pub fn note_rotation(side: NoteSide) -> f64 {
    match side {
        NoteSide::Center => 0.0,
        NoteSide::Left => 270.0,
        NoteSide::Right => 90.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_alpha_is_always_opaque() {
        let layout = LayoutConstants::default();
        assert_eq!(note_alpha(NoteSide::Center, (0.0, 0.0), &layout), 1.0);
    }

    #[test]
    fn side_alpha_clamps_to_quarter_minimum() {
        let layout = LayoutConstants::default();
        let pos = (layout.base_res_w / 2.0, 0.0);
        assert_eq!(note_alpha(NoteSide::Left, pos, &layout), 0.25);
    }

    #[test]
    fn rotation_matches_side() {
        assert_eq!(note_rotation(NoteSide::Center), 0.0);
        assert_eq!(note_rotation(NoteSide::Left), 270.0);
        assert_eq!(note_rotation(NoteSide::Right), 90.0);
    }
}

//! Vertex layout and the per-draw-setting quad expansion grammar.
//!
//! Grounded in `original_source/DyCore/src/render/render.cpp`
//! (`draw_sprite`) and the vertex layout implied by the external
//! interface's binary contract (6 vertices per quad, 20 bytes each).

use bytemuck::{Pod, Zeroable};

use crate::sprite::{DrawSetting, Sprite};

/// One GPU vertex: `position.xy, uv.xy, color.rgba` packed to 20 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [u8; 4],
}

/// Where `position` anchors the sprite's rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pivot {
    Center,
    BottomCenter,
    TopCenter,
}

fn rotate_about(p: (f64, f64), center: (f64, f64), rotation_deg: f64) -> (f64, f64) {
    let angle = -rotation_deg.to_radians();
    let (s, c) = angle.sin_cos();
    let (dx, dy) = (p.0 - center.0, p.1 - center.1);
    (dx * c - dy * s + center.0, dx * s + dy * c + center.1)
}

fn vertex(pos: (f64, f64), uv: (f64, f64), color: [u8; 4]) -> Vertex {
    Vertex {
        position: [pos.0 as f32, pos.1 as f32],
        uv: [uv.0 as f32, uv.1 as f32],
        color,
    }
}

/// Appends one quad (two triangles, `(p0,p1,p2)(p1,p2,p3)`) to `out`.
fn push_quad(
    out: &mut Vec<Vertex>,
    p0: (f64, f64),
    p1: (f64, f64),
    p2: (f64, f64),
    p3: (f64, f64),
    uv0: (f64, f64),
    uv1: (f64, f64),
    uv2: (f64, f64),
    uv3: (f64, f64),
    color: [u8; 4],
) {
    out.push(vertex(p0, uv0, color));
    out.push(vertex(p1, uv1, color));
    out.push(vertex(p2, uv2, color));
    out.push(vertex(p1, uv1, color));
    out.push(vertex(p2, uv2, color));
    out.push(vertex(p3, uv3, color));
}

/// Expands `sprite` into quads covering `position`-anchored `size`,
/// rotated `rotation_deg` about its own centre, following the sprite's
/// own draw setting (Normal / Seg3 / Seg5 / Slice9 / RepeatVertical).
pub fn draw_sprite(
    out: &mut Vec<Vertex>,
    sprite: &Sprite,
    pivot: Pivot,
    position: (f64, f64),
    size: (f64, f64),
    rotation_deg: f64,
    color: [u8; 4],
) {
    let half = (size.0 / 2.0, size.1 / 2.0);
    let (left_up, right_down) = match pivot {
        Pivot::Center => (
            (position.0 - half.0, position.1 - half.1),
            (position.0 + half.0, position.1 + half.1),
        ),
        Pivot::BottomCenter => (
            (position.0 - half.0, position.1 - size.1),
            (position.0 + half.0, position.1),
        ),
        Pivot::TopCenter => (
            (position.0 - half.0, position.1),
            (position.0 + half.0, position.1 + size.1),
        ),
    };
    let left_down = (left_up.0, right_down.1);
    let right_up = (right_down.0, left_up.1);
    let rot = |p: (f64, f64)| rotate_about(p, position, rotation_deg);

    match sprite.draw_setting {
        DrawSetting::RepeatVertical => {
            let mut y = 0.0;
            while y < size.1 {
                let remaining = size.1 - y;
                let quad_h = remaining.min(sprite.size.1);

                let tl = (left_up.0, left_up.1 + y);
                let tr = (right_up.0, right_up.1 + y);
                let bl = (left_up.0, left_up.1 + y + quad_h);
                let br = (right_up.0, right_up.1 + y + quad_h);

                let uv_tl = sprite.map_uv((0.0, 0.0));
                let uv_tr = sprite.map_uv((1.0, 0.0));
                let uv_bl = sprite.map_uv((0.0, quad_h / sprite.size.1));
                let uv_br = sprite.map_uv((1.0, quad_h / sprite.size.1));

                push_quad(out, rot(tl), rot(tr), rot(bl), rot(br), uv_tl, uv_tr, uv_bl, uv_br, color);
                y += quad_h;
            }
        }
        DrawSetting::Normal => {
            push_quad(
                out,
                rot(left_up),
                rot(right_up),
                rot(left_down),
                rot(right_down),
                sprite.map_uv((0.0, 0.0)),
                sprite.map_uv((1.0, 0.0)),
                sprite.map_uv((0.0, 1.0)),
                sprite.map_uv((1.0, 1.0)),
                color,
            );
        }
        DrawSetting::Seg3 { seg0, seg2 } => {
            let seg1_uv_w = sprite.size.0 - seg0 - seg2;
            let seg1_screen_w = size.0 - seg0 - seg2;

            push_quad(
                out,
                rot(left_up),
                rot((left_up.0 + seg0, left_up.1)),
                rot(left_down),
                rot((left_down.0 + seg0, left_down.1)),
                sprite.pos_to_uv((0.0, 0.0)),
                sprite.pos_to_uv((seg0, 0.0)),
                sprite.pos_to_uv((0.0, sprite.size.1)),
                sprite.pos_to_uv((seg0, sprite.size.1)),
                color,
            );
            push_quad(
                out,
                rot((left_up.0 + seg0, left_up.1)),
                rot((left_up.0 + seg0 + seg1_screen_w, left_up.1)),
                rot((left_down.0 + seg0, left_down.1)),
                rot((left_down.0 + seg0 + seg1_screen_w, left_down.1)),
                sprite.pos_to_uv((seg0, 0.0)),
                sprite.pos_to_uv((seg0 + seg1_uv_w, 0.0)),
                sprite.pos_to_uv((seg0, sprite.size.1)),
                sprite.pos_to_uv((seg0 + seg1_uv_w, sprite.size.1)),
                color,
            );
            push_quad(
                out,
                rot((right_up.0 - seg2, right_up.1)),
                rot(right_up),
                rot((right_down.0 - seg2, right_down.1)),
                rot(right_down),
                sprite.pos_to_uv((sprite.size.0 - seg2, 0.0)),
                sprite.pos_to_uv((sprite.size.0, 0.0)),
                sprite.pos_to_uv((sprite.size.0 - seg2, sprite.size.1)),
                sprite.pos_to_uv((sprite.size.0, sprite.size.1)),
                color,
            );
        }
        DrawSetting::Seg5 { seg0, seg2, seg4 } => {
            let seg13_uv_w = sprite.size.0 - seg0 - seg2 - seg4;
            let seg13_screen_w = size.0 - seg0 - seg2 - seg4;
            let seg1_uv_w = seg13_uv_w / 2.0;
            let seg3_uv_w = seg13_uv_w / 2.0;
            let seg1_screen_w = seg13_screen_w / 2.0;
            let seg3_screen_w = seg13_screen_w / 2.0;

            let segs = [seg0, seg1_screen_w, seg2, seg3_screen_w, seg4];
            let uv_segs = [seg0, seg1_uv_w, seg2, seg3_uv_w, seg4];
            let mut x = left_up.0;
            let mut uv_x = 0.0;
            for (w, uv_w) in segs.iter().zip(uv_segs.iter()) {
                push_quad(
                    out,
                    rot((x, left_up.1)),
                    rot((x + w, left_up.1)),
                    rot((x, left_down.1)),
                    rot((x + w, left_down.1)),
                    sprite.pos_to_uv((uv_x, 0.0)),
                    sprite.pos_to_uv((uv_x + uv_w, 0.0)),
                    sprite.pos_to_uv((uv_x, sprite.size.1)),
                    sprite.pos_to_uv((uv_x + uv_w, sprite.size.1)),
                    color,
                );
                x += w;
                uv_x += uv_w;
            }
        }
        DrawSetting::Slice9 { left, right, top, bottom } => {
            let x_coords = [left_up.0, left_up.0 + left, right_up.0 - right, right_up.0];
            let y_coords = [left_up.1, left_up.1 + top, left_down.1 - bottom, left_down.1];
            let uv_x_coords = [0.0, left, sprite.size.0 - right, sprite.size.0];
            let uv_y_coords = [0.0, top, sprite.size.1 - bottom, sprite.size.1];

            for i in 0..3 {
                for j in 0..3 {
                    if i == 1 && j == 1 {
                        continue;
                    }
                    push_quad(
                        out,
                        rot((x_coords[j], y_coords[i])),
                        rot((x_coords[j + 1], y_coords[i])),
                        rot((x_coords[j], y_coords[i + 1])),
                        rot((x_coords[j + 1], y_coords[i + 1])),
                        sprite.pos_to_uv((uv_x_coords[j], uv_y_coords[i])),
                        sprite.pos_to_uv((uv_x_coords[j + 1], uv_y_coords[i])),
                        sprite.pos_to_uv((uv_x_coords[j], uv_y_coords[i + 1])),
                        sprite.pos_to_uv((uv_x_coords[j + 1], uv_y_coords[i + 1])),
                        color,
                    );
                }
            }
        }
    }
}

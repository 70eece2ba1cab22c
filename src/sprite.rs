//! The Sprite Catalog: immutable-after-population sprite descriptors and
//! the pure UV/geometry helpers the Emission Pipeline draws from.
//!
//! Grounded in `original_source/DyCore/src/render/render.h`'s
//! `SpriteData`/`SpriteManager` and the `get_sprite_max_bytes` cost
//! table.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use serde::Deserialize;

use crate::config::load_toml;
use crate::error::{lock_poisoned, CoreError, CoreResult};
use crate::layout::{LayoutConstants, BYTES_PER_QUAD};

/// How a sprite's rectangle is expanded into one or more quads.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind")]
pub enum DrawSetting {
    Normal,
    Seg3 { seg0: f64, seg2: f64 },
    Seg5 { seg0: f64, seg2: f64, seg4: f64 },
    Slice9 { left: f64, right: f64, top: f64, bottom: f64 },
    RepeatVertical,
}

/// A named rectangle in a texture atlas plus its draw grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub name: String,
    pub size: (f64, f64),
    pub uv0: (f64, f64),
    pub uv1: (f64, f64),
    pub padding_lr: f64,
    pub padding_top: f64,
    pub padding_bottom: f64,
    pub draw_setting: DrawSetting,
    uv_size: (f64, f64),
    uv_center: (f64, f64),
    uv_ratio: (f64, f64),
    uv_ratio_inv: (f64, f64),
}

impl Sprite {
    pub fn new(
        name: impl Into<String>,
        size: (f64, f64),
        uv0: (f64, f64),
        uv1: (f64, f64),
        padding_lr: f64,
        padding_top: f64,
        padding_bottom: f64,
        draw_setting: DrawSetting,
    ) -> Self {
        let uv_size = (uv1.0 - uv0.0, uv1.1 - uv0.1);
        let uv_center = ((uv0.0 + uv1.0) / 2.0, (uv0.1 + uv1.1) / 2.0);
        let uv_ratio = (uv_size.0 / size.0, uv_size.1 / size.1);
        let uv_ratio_inv = (size.0 / uv_size.0, size.1 / uv_size.1);
        Self {
            name: name.into(),
            size,
            uv0,
            uv1,
            padding_lr,
            padding_top,
            padding_bottom,
            draw_setting,
            uv_size,
            uv_center,
            uv_ratio,
            uv_ratio_inv,
        }
    }

    /// Maps a sprite-local pixel position to a UV coordinate.
    pub fn pos_to_uv(&self, pos: (f64, f64)) -> (f64, f64) {
        (
            pos.0 * self.uv_ratio.0 + self.uv0.0,
            pos.1 * self.uv_ratio.1 + self.uv0.1,
        )
    }

    /// Inverse of [`Sprite::pos_to_uv`].
    pub fn uv_to_pos(&self, uv: (f64, f64)) -> (f64, f64) {
        (
            (uv.0 - self.uv0.0) * self.uv_ratio_inv.0,
            (uv.1 - self.uv0.1) * self.uv_ratio_inv.1,
        )
    }

    /// Maps a `[0,1]^2` fraction of the sprite's own rect to a UV coordinate.
    pub fn map_uv(&self, uv: (f64, f64)) -> (f64, f64) {
        (
            uv.0 * self.uv_size.0 + self.uv0.0,
            uv.1 * self.uv_size.1 + self.uv0.1,
        )
    }

    pub fn center(&self) -> (f64, f64) {
        self.uv_center
    }

    /// Statically computable upper bound on quads this sprite may emit
    /// in a single draw call.
    pub fn max_quads(&self, layout: &LayoutConstants) -> usize {
        match self.draw_setting {
            DrawSetting::Normal => 1,
            DrawSetting::Seg3 { .. } => 3,
            DrawSetting::Seg5 { .. } => 5,
            DrawSetting::Slice9 { .. } => 9,
            DrawSetting::RepeatVertical => {
                let tile_h = self.size.1.max(1.0);
                let max_len = layout.base_res_w.max(layout.base_res_h) + 3.0 * tile_h;
                (max_len / tile_h).ceil() as usize
            }
        }
    }

    pub fn max_bytes(&self, layout: &LayoutConstants) -> usize {
        self.max_quads(layout) * BYTES_PER_QUAD
    }
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: String,
    size: (f64, f64),
    uv0: (f64, f64),
    uv1: (f64, f64),
    #[serde(default)]
    padding_lr: f64,
    #[serde(default)]
    padding_top: f64,
    #[serde(default)]
    padding_bottom: f64,
    draw_setting: DrawSetting,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "sprite")]
    sprites: Vec<ManifestEntry>,
}

/// A name-keyed set of sprite descriptors, read-only once populated.
pub struct SpriteCatalog {
    sprites: RwLock<HashMap<String, Sprite>>,
}

impl Default for SpriteCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SpriteCatalog {
    pub fn new() -> Self {
        Self {
            sprites: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, sprite: Sprite) -> CoreResult<()> {
        let mut sprites = self.sprites.write().map_err(|_| lock_poisoned())?;
        sprites.insert(sprite.name.clone(), sprite);
        Ok(())
    }

    pub fn get(&self, name: &str) -> CoreResult<Sprite> {
        let sprites = self.sprites.read().map_err(|_| lock_poisoned())?;
        sprites
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(name.to_string()))
    }

    /// Bulk-populates the catalog from a TOML atlas manifest, the same
    /// `load_toml` idiom used for layout configuration.
    pub fn load_manifest(&self, path: &Path) -> CoreResult<()> {
        let manifest: Manifest = load_toml(path)?;
        for entry in manifest.sprites {
            self.insert(Sprite::new(
                entry.name,
                entry.size,
                entry.uv0,
                entry.uv1,
                entry.padding_lr,
                entry.padding_top,
                entry.padding_bottom,
                entry.draw_setting,
            ))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uv_round_trip() {
        let sprite = Sprite::new(
            "sprNote",
            (64.0, 64.0),
            (0.0, 0.0),
            (0.5, 0.5),
            0.0,
            0.0,
            0.0,
            DrawSetting::Normal,
        );
        let pos = (10.0, 20.0);
        let uv = sprite.pos_to_uv(pos);
        let back = sprite.uv_to_pos(uv);
        assert!((back.0 - pos.0).abs() < 1e-9);
        assert!((back.1 - pos.1).abs() < 1e-9);
    }

    #[test]
    fn max_quads_matches_table() {
        let layout = LayoutConstants::default();
        let normal = Sprite::new("a", (10.0, 10.0), (0.0, 0.0), (1.0, 1.0), 0.0, 0.0, 0.0, DrawSetting::Normal);
        assert_eq!(normal.max_quads(&layout), 1);

        let slice9 = Sprite::new(
            "b",
            (10.0, 10.0),
            (0.0, 0.0),
            (1.0, 1.0),
            0.0,
            0.0,
            0.0,
            DrawSetting::Slice9 { left: 1.0, right: 1.0, top: 1.0, bottom: 1.0 },
        );
        assert_eq!(slice9.max_quads(&layout), 9);
    }

    #[test]
    fn catalog_lookup_returns_not_found_for_missing_sprite() {
        let catalog = SpriteCatalog::new();
        assert!(matches!(catalog.get("missing"), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn catalog_returns_a_copy_not_a_reference() {
        let catalog = SpriteCatalog::new();
        catalog
            .insert(Sprite::new(
                "sprNote",
                (64.0, 64.0),
                (0.0, 0.0),
                (1.0, 1.0),
                0.0,
                0.0,
                0.0,
                DrawSetting::Normal,
            ))
            .unwrap();
        let a = catalog.get("sprNote").unwrap();
        let b = catalog.get("sprNote").unwrap();
        assert_eq!(a, b);
    }
}

//! TOML configuration loading, following the same `load_toml` idiom the
//! host uses for its skin manifests.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::layout::LayoutConstants;

/// Serializable form of [`LayoutConstants`]; every field is optional so a
/// host config can override only what it needs to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub base_res_w: Option<f64>,
    pub base_res_h: Option<f64>,
    pub judge_line_below_from_bottom: Option<f64>,
    pub judge_line_side_from_edge: Option<f64>,
    pub activation_ahead_pixels: Option<f64>,
    pub hold_bg_lightness: Option<f64>,
}

impl LayoutConfig {
    /// Applies any fields present in this config over the compiled-in
    /// defaults.
    pub fn resolve(&self) -> LayoutConstants {
        let defaults = LayoutConstants::default();
        LayoutConstants {
            base_res_w: self.base_res_w.unwrap_or(defaults.base_res_w),
            base_res_h: self.base_res_h.unwrap_or(defaults.base_res_h),
            judge_line_below_from_bottom: self
                .judge_line_below_from_bottom
                .unwrap_or(defaults.judge_line_below_from_bottom),
            judge_line_side_from_edge: self
                .judge_line_side_from_edge
                .unwrap_or(defaults.judge_line_side_from_edge),
            activation_ahead_pixels: self
                .activation_ahead_pixels
                .unwrap_or(defaults.activation_ahead_pixels),
            hold_bg_lightness: self
                .hold_bg_lightness
                .unwrap_or(defaults.hold_bg_lightness),
        }
    }
}

/// Loads a TOML document into `T`, mapping both I/O and parse failures to
/// [`CoreError::Invalid`].
pub fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> CoreResult<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| CoreError::Invalid(format!("reading {path:?}: {e}")))?;
    toml::from_str(&content).map_err(|e| CoreError::Invalid(format!("parsing {path:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_falls_back_to_defaults() {
        let cfg = LayoutConfig::default();
        let resolved = cfg.resolve();
        assert_eq!(resolved, LayoutConstants::default());
    }

    #[test]
    fn resolve_overrides_only_given_fields() {
        let cfg = LayoutConfig {
            base_res_w: Some(2560.0),
            ..Default::default()
        };
        let resolved = cfg.resolve();
        assert_eq!(resolved.base_res_w, 2560.0);
        assert_eq!(resolved.base_res_h, LayoutConstants::default().base_res_h);
    }
}

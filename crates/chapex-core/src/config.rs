use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::annotate::Domain;
use crate::error::ChapexError;

/// Thresholds for matching captions to drawings, in page units (points).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FigureOptions {
    /// Drawings narrower or shorter than this are treated as decoration.
    pub min_drawing_size: f32,
    /// Largest gap allowed between a drawing's bottom and the caption's top.
    pub max_caption_distance: f32,
    /// How far a drawing may reach below the caption's top edge.
    pub caption_top_tolerance: f32,
    /// Horizontal margin around the caption within which drawings still count.
    pub horizontal_slack: f32,
    /// Render scale relative to 72 dpi.
    pub render_scale: f32,
    /// Number of following text blocks kept as figure context.
    pub max_local_text: usize,
}

impl Default for FigureOptions {
    fn default() -> Self {
        FigureOptions {
            min_drawing_size: 50.0,
            max_caption_distance: 700.0,
            caption_top_tolerance: 5.0,
            horizontal_slack: 80.0,
            render_scale: 3.0,
            max_local_text: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractOptions {
    pub domain: Domain,
    pub figures: FigureOptions,
}

/// Load extraction options from a JSON file. Missing fields take their defaults.
pub fn load_options(path: &Path) -> Result<ExtractOptions, ChapexError> {
    let content = std::fs::read_to_string(path).map_err(|e| ChapexError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let options: ExtractOptions =
        serde_json::from_str(&content).map_err(|e| ChapexError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_options(&options)?;
    Ok(options)
}

pub fn validate_options(options: &ExtractOptions) -> Result<(), ChapexError> {
    let f = &options.figures;
    if !(f.render_scale > 0.0) {
        return Err(ChapexError::ConfigInvalid(format!(
            "renderScale must be positive, got {}",
            f.render_scale
        )));
    }
    for (name, value) in [
        ("minDrawingSize", f.min_drawing_size),
        ("maxCaptionDistance", f.max_caption_distance),
        ("captionTopTolerance", f.caption_top_tolerance),
        ("horizontalSlack", f.horizontal_slack),
    ] {
        if !(value >= 0.0) {
            return Err(ChapexError::ConfigInvalid(format!(
                "{name} must not be negative, got {value}"
            )));
        }
    }
    if f.max_local_text == 0 {
        return Err(ChapexError::ConfigInvalid(
            "maxLocalText must be at least 1".into(),
        ));
    }
    Ok(())
}

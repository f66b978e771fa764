//! Properties shared by every layer, whatever its element kind.

use serde_json::Value;
use strata_macros::Props;

use super::Props;
use crate::error::PropError;
use crate::tree::Dirty;

/// Position, size and box styling of a layer.
#[derive(Debug, Clone, Default, PartialEq, Props)]
pub struct CommonProps {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    pub background_color: Option<String>,
    pub border: Option<String>,
    pub opacity: Option<f64>,
    pub box_shadow: Option<String>,
    pub filter: Option<String>,
    pub transform: Option<String>,
}

impl CommonProps {
    /// Apply a common property, translating a change into dirty flags.
    pub fn apply(&mut self, name: &str, value: &Value) -> Option<Result<Dirty, PropError>> {
        let result = self.set_prop(name, value)?;
        Some(result.map(|changed| if changed { dirty_for(name) } else { Dirty::empty() }))
    }

    /// `(left, top, width, height)`.
    pub fn rect(&self) -> (f64, f64, f64, f64) {
        (self.left, self.top, self.width, self.height)
    }
}

fn dirty_for(name: &str) -> Dirty {
    match name {
        "top" | "left" | "width" | "height" | "transform" => Dirty::GEOMETRY,
        _ => Dirty::STYLE,
    }
}
